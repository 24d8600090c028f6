use crate::artifacts::{create_artifact_store, ArtifactStore};
use crate::config::{Config, InitMode};
use crate::error::Result;
use crate::ml::{RiskService, RiskStatus};
use crate::recommend::{RecommendationService, RecommendationStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Status of both models, as printed by the `status` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStatus {
    pub init_mode: InitMode,
    pub artifact_backend: String,
    pub recommendation: RecommendationStatus,
    pub risk: RiskStatus,
}

/// Owns the artifact store and both inference services.
///
/// The services share the store but have independent lifecycles, so one
/// model failing to initialize leaves the other serving.
pub struct InferenceRuntime {
    mode: InitMode,
    store: Arc<dyn ArtifactStore>,
    recommendations: Arc<RecommendationService>,
    risk: Arc<RiskService>,
}

impl InferenceRuntime {
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = create_artifact_store(&config.artifacts)?;
        Self::with_store(config, store)
    }

    /// Wire the services over an existing store
    pub fn with_store(config: &Config, store: Arc<dyn ArtifactStore>) -> Result<Self> {
        let recommendations = Arc::new(RecommendationService::new(config, Arc::clone(&store)));
        let risk = Arc::new(RiskService::new(config, Arc::clone(&store))?);

        info!(
            backend = store.backend_name(),
            init_mode = ?config.inference.init_mode,
            "Inference runtime created"
        );

        Ok(Self {
            mode: config.inference.init_mode,
            store,
            recommendations,
            risk,
        })
    }

    /// In eager mode, start initializing both models in the background.
    /// Lazy mode returns no handles; the first query initializes.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        if self.mode != InitMode::Eager {
            info!("Lazy initialization; models load on first query");
            return Vec::new();
        }

        let recommendations = Arc::clone(&self.recommendations);
        let recommend_task = tokio::spawn(async move {
            if let Err(e) = recommendations.initialize().await {
                error!(error = %e, "Resolution recommender failed to initialize");
            }
        });

        let risk = Arc::clone(&self.risk);
        let risk_task = tokio::spawn(async move {
            if let Err(e) = risk.initialize().await {
                error!(error = %e, "SLA risk model failed to initialize");
            }
        });

        vec![recommend_task, risk_task]
    }

    /// Initialize both models and wait; errors are reported per model
    pub async fn warm_up(&self) -> (Result<()>, Result<()>) {
        futures::join!(self.recommendations.initialize(), self.risk.initialize())
    }

    pub fn recommendations(&self) -> &Arc<RecommendationService> {
        &self.recommendations
    }

    pub fn risk(&self) -> &Arc<RiskService> {
        &self.risk
    }

    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            init_mode: self.mode,
            artifact_backend: self.store.backend_name().to_string(),
            recommendation: self.recommendations.status(),
            risk: self.risk.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::InMemoryArtifactStore;
    use crate::lifecycle::LifecyclePhase;

    fn config(mode: InitMode) -> Config {
        let mut config = Config::default();
        config.inference.init_mode = mode;
        config.sla.synthetic_samples = 400;
        config
    }

    #[tokio::test]
    async fn test_eager_start_initializes_both() {
        let runtime =
            InferenceRuntime::with_store(&config(InitMode::Eager), Arc::new(InMemoryArtifactStore::new()))
                .unwrap();

        for handle in runtime.start() {
            handle.await.unwrap();
        }

        let status = runtime.status();
        assert_eq!(status.recommendation.lifecycle.phase, LifecyclePhase::Ready);
        assert_eq!(status.risk.lifecycle.phase, LifecyclePhase::Ready);
        assert_eq!(status.artifact_backend, "memory");
    }

    #[tokio::test]
    async fn test_lazy_start_spawns_nothing() {
        let runtime =
            InferenceRuntime::with_store(&config(InitMode::Lazy), Arc::new(InMemoryArtifactStore::new()))
                .unwrap();

        assert!(runtime.start().is_empty());
        assert_eq!(
            runtime.status().risk.lifecycle.phase,
            LifecyclePhase::Uninitialized
        );
    }

    #[test]
    fn test_invalid_sla_policy_rejected() {
        let mut config = config(InitMode::Lazy);
        config.sla.low_hours = -1.0;
        assert!(
            InferenceRuntime::with_store(&config, Arc::new(InMemoryArtifactStore::new())).is_err()
        );
    }
}
