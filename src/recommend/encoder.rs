use crate::config::{EncoderConfig, EncoderKind};
use crate::error::{AppError, Result};
use crate::recommend::candle::CandleEncoder;
use fxhash::hash64;
use rayon::prelude::*;
use std::sync::Arc;

/// Maps free text to fixed-length, unit-norm vectors.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector, so persisted indexes stay valid across restarts.
pub trait TextEncoder: Send + Sync {
    /// Encode one text
    fn encode(&self, text: &str) -> Result<Vec<f32>>;

    /// Encode many texts, preserving input order
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Length of every vector this encoder produces
    fn dimension(&self) -> usize;

    /// Identity recorded in persisted indexes; vectors from encoders with
    /// different ids are not comparable
    fn model_id(&self) -> String;
}

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;
const TRIGRAM_WEIGHT: f32 = 0.25;

/// Feature-hashing text embedder.
///
/// Lower-cased word unigrams and bigrams, plus character trigrams of each
/// word when enabled, are FxHash-ed into signed buckets and the result is
/// L2-normalized. Text without any word characters encodes to zeros.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
    char_ngrams: bool,
}

impl HashingEncoder {
    pub fn new(dimension: usize, char_ngrams: bool) -> Result<Self> {
        if dimension == 0 {
            return Err(AppError::Configuration(
                "Embedding dimension must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            dimension,
            char_ngrams,
        })
    }

    fn add_feature(&self, embedding: &mut [f32], feature: &str, weight: f32) {
        // FxHash mixes toward the high bits
        let hash = hash64(feature.as_bytes());
        let index = ((hash >> 32) % self.dimension as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        embedding[index] += sign * weight;
    }
}

impl TextEncoder for HashingEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = vec![0.0f32; self.dimension];
        let tokens: Vec<String> = tokenize(text).map(|t| t.to_lowercase()).collect();

        if tokens.is_empty() {
            return Ok(embedding);
        }

        for token in &tokens {
            self.add_feature(&mut embedding, &format!("w:{}", token), UNIGRAM_WEIGHT);

            if self.char_ngrams {
                let padded: Vec<char> = format!("#{}#", token).chars().collect();
                for window in padded.windows(3) {
                    let trigram: String = window.iter().collect();
                    self.add_feature(&mut embedding, &format!("c:{}", trigram), TRIGRAM_WEIGHT);
                }
            }
        }

        for pair in tokens.windows(2) {
            self.add_feature(
                &mut embedding,
                &format!("b:{} {}", pair[0], pair[1]),
                BIGRAM_WEIGHT,
            );
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> String {
        format!(
            "hashing-fx-v2-d{}{}",
            self.dimension,
            if self.char_ngrams { "-c3" } else { "" }
        )
    }
}

/// Construct the configured encoder.
///
/// Fails when the candle model files are missing or unreadable, which leaves
/// the recommender Unavailable.
pub fn load_encoder(config: &EncoderConfig) -> Result<Arc<dyn TextEncoder>> {
    let encoder: Arc<dyn TextEncoder> = match config.kind {
        EncoderKind::Hashing => Arc::new(HashingEncoder::new(config.dimension, config.char_ngrams)?),
        EncoderKind::Candle => {
            let encoder = CandleEncoder::load(&config.model_dir, config.max_tokens)?;
            if encoder.dimension() != config.dimension {
                return Err(AppError::Configuration(format!(
                    "Encoder model at {} produces {}-d vectors, configured dimension is {}",
                    config.model_dir.display(),
                    encoder.dimension(),
                    config.dimension
                )));
            }
            Arc::new(encoder)
        }
    };

    tracing::info!(
        encoder = %encoder.model_id(),
        dimension = encoder.dimension(),
        "Text encoder loaded"
    );
    Ok(encoder)
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
}

/// Scale to unit length; near-zero vectors become all zeros
pub(crate) fn l2_normalize(embedding: &mut [f32]) {
    let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        embedding.fill(0.0);
        return;
    }
    for value in embedding.iter_mut() {
        *value /= norm;
    }
}
