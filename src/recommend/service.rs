use crate::artifacts::ArtifactStore;
use crate::config::{Config, EncoderConfig, RecommendationConfig};
use crate::error::{AppError, Result};
use crate::lifecycle::{ArtifactModel, ModelLifecycle};
use crate::metrics;
use crate::recommend::artifact::{ResolutionModel, INDEX_ARTIFACT, METADATA_ARTIFACT};
use crate::recommend::encoder::load_encoder;
use crate::recommend::knowledge_base::{load_knowledge_base, ResolutionRecord};
use crate::recommend::models::{
    round_score, MatchQuality, Recommendation, RecommendationRequest, RecommendationResponse,
    RecommendationStatus,
};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use validator::Validate;

/// Lifecycle and metrics label for the recommender
pub const RECOMMENDATION_MODEL: &str = "resolution_recommender";

/// Loads or builds the resolution index from the artifact store
pub struct ResolutionSource {
    store: Arc<dyn ArtifactStore>,
    encoder: EncoderConfig,
    knowledge_base_path: Option<PathBuf>,
}

impl ResolutionSource {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        encoder: EncoderConfig,
        knowledge_base_path: Option<PathBuf>,
    ) -> Self {
        Self {
            store,
            encoder,
            knowledge_base_path,
        }
    }
}

#[async_trait]
impl ArtifactModel<ResolutionModel> for ResolutionSource {
    async fn load(&self) -> Result<Option<ResolutionModel>> {
        let index = self.store.load_optional(INDEX_ARTIFACT).await?;
        let metadata = self.store.load_optional(METADATA_ARTIFACT).await?;

        let (index, metadata) = match (index, metadata) {
            (Some(index), Some(metadata)) => (index, metadata),
            (None, None) => return Ok(None),
            (index, _) => {
                warn!(
                    index_present = index.is_some(),
                    "Resolution artifacts incomplete, treating as absent"
                );
                return Ok(None);
            }
        };

        let encoder_config = self.encoder.clone();
        let model = tokio::task::spawn_blocking(move || {
            let encoder = load_encoder(&encoder_config)?;
            ResolutionModel::from_artifacts(&index, &metadata, encoder)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Resolution load task failed: {}", e)))??;

        info!(
            build_id = %model.build_id(),
            records = model.len(),
            "Loaded persisted resolution index"
        );
        Ok(Some(model))
    }

    async fn build(&self) -> Result<ResolutionModel> {
        let encoder_config = self.encoder.clone();
        let knowledge_base_path = self.knowledge_base_path.clone();

        let (model, artifacts) = tokio::task::spawn_blocking(move || {
            let records = load_knowledge_base(knowledge_base_path.as_deref())?;
            let encoder = load_encoder(&encoder_config)?;
            let model = ResolutionModel::build(encoder, records)?;
            let artifacts = model.to_artifacts()?;
            Ok::<_, AppError>((model, artifacts))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Resolution build task failed: {}", e)))??;

        // A model that could not be persisted still serves; the next start rebuilds
        match self.store.save_group(&artifacts).await {
            Ok(()) => info!(
                build_id = %model.build_id(),
                records = model.len(),
                backend = self.store.backend_name(),
                "Resolution index persisted"
            ),
            Err(e) => warn!(error = %e, "Failed to persist resolution index"),
        }

        Ok(model)
    }
}

/// Recommends past resolutions for a new ticket description
pub struct RecommendationService {
    config: RecommendationConfig,
    request_timeout: Duration,
    init_wait: Duration,
    source: ResolutionSource,
    lifecycle: ModelLifecycle<ResolutionModel>,
}

impl RecommendationService {
    pub fn new(config: &Config, store: Arc<dyn ArtifactStore>) -> Self {
        let source = ResolutionSource::new(
            store,
            config.encoder.clone(),
            config.recommendation.knowledge_base_path.clone(),
        );

        Self {
            config: config.recommendation.clone(),
            request_timeout: Duration::from_millis(config.inference.request_timeout_ms),
            init_wait: Duration::from_millis(config.inference.init_wait_ms),
            source,
            lifecycle: ModelLifecycle::new(RECOMMENDATION_MODEL, config.inference.init_mode),
        }
    }

    pub fn lifecycle(&self) -> &ModelLifecycle<ResolutionModel> {
        &self.lifecycle
    }

    /// Load or build the index; a no-op once settled
    pub async fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize(&self.source).await.map(|_| ())
    }

    /// Recommend up to `top_n` resolutions for `description`
    pub async fn recommend(
        &self,
        description: &str,
        category: Option<&str>,
        top_n: usize,
    ) -> Result<RecommendationResponse> {
        let started = Instant::now();
        let result = self.recommend_inner(description, category, top_n).await;

        let outcome = match &result {
            Ok(response) if response.is_fallback() => "fallback",
            Ok(_) => "success",
            Err(AppError::Validation(_)) => "invalid",
            Err(AppError::ServiceUnavailable(_)) => "unavailable",
            Err(AppError::Timeout(_)) => "timeout",
            Err(_) => "error",
        };
        metrics::record_query(RECOMMENDATION_MODEL, outcome, started.elapsed());

        result
    }

    /// Validate and answer a recommendation request
    pub async fn recommend_resolution(
        &self,
        request: RecommendationRequest,
    ) -> Result<RecommendationResponse> {
        request.validate()?;
        let top_n = request.top_n.unwrap_or(self.config.default_top_n);
        self.recommend(&request.description, request.category.as_deref(), top_n)
            .await
    }

    async fn recommend_inner(
        &self,
        description: &str,
        category: Option<&str>,
        top_n: usize,
    ) -> Result<RecommendationResponse> {
        let min_chars = self.config.min_description_chars;
        if description.trim().chars().count() < min_chars {
            return Err(AppError::Validation(format!(
                "Description must be at least {} characters",
                min_chars
            )));
        }
        if top_n == 0 {
            return Err(AppError::Validation(
                "top_n must be at least 1".to_string(),
            ));
        }

        let model = self.lifecycle.acquire(&self.source, self.init_wait).await?;

        let search = {
            let model = Arc::clone(&model);
            let description = description.to_string();
            let category = category.map(str::to_string);
            let min_candidates = self.config.min_candidates;
            let scale = self.config.distance_scale;
            tokio::task::spawn_blocking(move || {
                model.similar(&description, category.as_deref(), top_n, min_candidates, scale)
            })
        };

        let recommendations = match tokio::time::timeout(self.request_timeout, search).await {
            Ok(joined) => joined.map_err(|e| {
                AppError::Internal(format!("Recommendation task failed: {}", e))
            })??,
            Err(_) => {
                return Err(AppError::Timeout(format!(
                    "recommendation exceeded {} ms",
                    self.request_timeout.as_millis()
                )))
            }
        };

        if recommendations.is_empty() {
            debug!(category = ?category, "No similar resolutions survived filtering, using fallback");
            metrics::RECOMMENDATION_FALLBACKS_TOTAL.inc();
            return Ok(fallback_recommendations(model.records(), top_n, &self.config));
        }

        Ok(RecommendationResponse {
            recommendations,
            match_quality: MatchQuality::Similarity,
        })
    }

    /// Rebuild the index from the knowledge base and swap it in
    pub async fn rebuild(&self) -> Result<RecommendationStatus> {
        self.lifecycle.rebuild(&self.source).await?;
        Ok(self.status())
    }

    /// Clear an Unavailable recommender
    pub async fn reset(&self) -> bool {
        self.lifecycle.reset().await
    }

    pub fn status(&self) -> RecommendationStatus {
        let current = self.lifecycle.current();
        RecommendationStatus {
            lifecycle: self.lifecycle.status(),
            records: current.as_ref().map(|m| m.len()),
            encoder_id: current.as_ref().map(|m| m.encoder_id()),
            build_id: current.as_ref().map(|m| m.build_id()),
        }
    }
}

/// Random low-confidence picks from the whole knowledge base
fn fallback_recommendations(
    records: &[ResolutionRecord],
    top_n: usize,
    config: &RecommendationConfig,
) -> RecommendationResponse {
    let mut rng = rand::thread_rng();
    let count = top_n.min(records.len());
    let chosen: Vec<&ResolutionRecord> = records.choose_multiple(&mut rng, count).collect();

    let low = config.fallback_score_min.min(config.fallback_score_max);
    let high = config.fallback_score_min.max(config.fallback_score_max);

    let recommendations = chosen
        .into_iter()
        .map(|record| {
            let score = if low < high {
                rng.gen_range(low..=high)
            } else {
                low
            };
            Recommendation {
                resolution_id: record.id.clone(),
                text: record.text.clone(),
                similarity_score: round_score(score.clamp(0.0, 1.0)),
                category: record.category.clone(),
                match_quality: MatchQuality::Fallback,
            }
        })
        .collect();

    RecommendationResponse {
        recommendations,
        match_quality: MatchQuality::Fallback,
    }
}
