use crate::error::{AppError, Result};
use crate::recommend::encoder::{l2_normalize, TextEncoder};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

const BATCH_CHUNK_SIZE: usize = 16;
const REQUIRED_FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];

/// Model files of a sentence-transformer directory
#[derive(Debug, Clone)]
struct ModelFiles {
    root: PathBuf,
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn from_root(root: &Path) -> Self {
        Self {
            config: root.join("config.json"),
            tokenizer: root.join("tokenizer.json"),
            weights: root.join("model.safetensors"),
            root: root.to_path_buf(),
        }
    }

    fn missing(&self) -> Vec<&'static str> {
        REQUIRED_FILES
            .iter()
            .copied()
            .filter(|name| !self.root.join(name).is_file())
            .collect()
    }
}

/// BERT-style sentence encoder (all-MiniLM-L6-v2 and relatives) on CPU.
///
/// Token embeddings are mean-pooled over the attention mask and
/// L2-normalized. Weights are read from a local directory; nothing is
/// downloaded.
pub struct CandleEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
    max_tokens: usize,
    model_name: String,
}

impl std::fmt::Debug for CandleEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleEncoder")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl CandleEncoder {
    /// Load weights, config and tokenizer from `model_dir`
    pub fn load(model_dir: &Path, max_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            return Err(AppError::Configuration(
                "Encoder max_tokens must be greater than zero".to_string(),
            ));
        }

        let files = ModelFiles::from_root(model_dir);
        let missing = files.missing();
        if !missing.is_empty() {
            return Err(AppError::Configuration(format!(
                "Encoder model files missing from {}: {}",
                files.root.display(),
                missing.join(", ")
            )));
        }

        let config_json = std::fs::read_to_string(&files.config)?;
        let config: BertConfig = serde_json::from_str(&config_json)
            .map_err(|e| AppError::Configuration(format!("Invalid encoder config.json: {}", e)))?;
        let dimension = config.hidden_size;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| AppError::Encoder(format!("Failed to load tokenizer: {}", e)))?;

        let device = Device::Cpu;
        // SAFETY: the weights file is not modified while the model is alive
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                std::slice::from_ref(&files.weights),
                DTYPE,
                &device,
            )?
        };
        let model = BertModel::load(vb, &config)?;

        let model_name = model_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sentence-encoder".to_string());

        tracing::info!(
            model = %model_name,
            model_dir = %files.root.display(),
            dimension,
            "Candle sentence encoder loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
            max_tokens,
            model_name,
        })
    }

    fn embed_chunk(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| AppError::Encoder(format!("Tokenization failed: {}", e)))?;
        let pad_id = self
            .tokenizer
            .get_padding()
            .map(|params| params.pad_id)
            .unwrap_or(0);

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len().min(self.max_tokens))
            .max()
            .unwrap_or(0);
        if max_len == 0 {
            return Ok(vec![vec![0.0; self.dimension]; texts.len()]);
        }

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention = Vec::with_capacity(texts.len() * max_len);
        for encoding in &encodings {
            let len = encoding.get_ids().len().min(max_len);
            input_ids.extend_from_slice(&encoding.get_ids()[..len]);
            attention.extend_from_slice(&encoding.get_attention_mask()[..len]);
            input_ids.extend(std::iter::repeat(pad_id).take(max_len - len));
            attention.extend(std::iter::repeat(0u32).take(max_len - len));
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(input_ids, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(attention, shape, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = mean_pool(&hidden, &attention_mask)?.to_dtype(DType::F32)?;

        let mut rows = pooled.to_vec2::<f32>()?;
        for row in &mut rows {
            if row.len() != self.dimension {
                return Err(AppError::Encoder(format!(
                    "Expected {} dimensions from encoder, got {}",
                    self.dimension,
                    row.len()
                )));
            }
            l2_normalize(row);
        }
        Ok(rows)
    }
}

impl TextEncoder for CandleEncoder {
    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut rows = self.encode_batch(&[text.to_string()])?;
        Ok(rows.pop().unwrap_or_else(|| vec![0.0; self.dimension]))
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut outputs = vec![vec![0.0; self.dimension]; texts.len()];

        // Blank texts stay zero vectors, matching the hashing encoder
        let active: Vec<(usize, &str)> = texts
            .iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(i, text)| (i, text.as_str()))
            .collect();

        for chunk in active.chunks(BATCH_CHUNK_SIZE) {
            let inputs: Vec<&str> = chunk.iter().map(|(_, text)| *text).collect();
            for ((position, _), embedding) in chunk.iter().zip(self.embed_chunk(&inputs)?) {
                outputs[*position] = embedding;
            }
        }

        Ok(outputs)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> String {
        format!(
            "candle-{}-d{}-t{}",
            self.model_name, self.dimension, self.max_tokens
        )
    }
}

fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, seq, width) = hidden.dims3()?;
    let mask = attention_mask.to_dtype(hidden.dtype())?;
    let expanded = mask.unsqueeze(2)?.broadcast_as((batch, seq, width))?;
    let summed = (hidden * expanded)?.sum(1)?;
    let counts = mask.sum(1)?.unsqueeze(1)?;
    Ok(summed.broadcast_div(&counts)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_files_are_named() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();

        let err = CandleEncoder::load(dir.path(), 256).unwrap_err();
        match err {
            AppError::Configuration(message) => {
                assert!(message.contains("tokenizer.json"));
                assert!(message.contains("model.safetensors"));
                assert!(!message.contains("config.json"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        for name in REQUIRED_FILES {
            std::fs::write(dir.path().join(name), "not json").unwrap();
        }

        let err = CandleEncoder::load(dir.path(), 256).unwrap_err();
        assert!(matches!(err, AppError::Configuration(ref m) if m.contains("config.json")));
    }

    #[test]
    fn test_zero_token_budget_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            CandleEncoder::load(dir.path(), 0),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_mean_pool_ignores_padding() {
        let device = Device::Cpu;
        let hidden = Tensor::from_vec(
            vec![1.0f32, 2.0, 3.0, 4.0, 100.0, 100.0],
            (1, 3, 2),
            &device,
        )
        .unwrap();
        let mask = Tensor::from_vec(vec![1u32, 1, 0], (1, 3), &device).unwrap();

        let pooled = mean_pool(&hidden, &mask).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(pooled, vec![vec![2.0, 3.0]]);
    }
}
