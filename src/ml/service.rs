use crate::artifacts::ArtifactStore;
use crate::config::{Config, SlaConfig};
use crate::error::{AppError, Result};
use crate::lifecycle::{ArtifactModel, ModelLifecycle};
use crate::metrics;
use crate::ml::models::{ModelMetadata, RiskPrediction, RiskRequest, RiskStatus};
use crate::ml::risk_model::RiskModel;
use crate::ml::sla::{Priority, SlaPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use validator::Validate;

/// Lifecycle and metrics label for the risk model
pub const RISK_MODEL: &str = "sla_risk_model";

/// Artifact name of the persisted risk model
pub const RISK_ARTIFACT: &str = "sla_risk_model.bin";

/// Loads or trains the risk model from the artifact store
pub struct RiskSource {
    store: Arc<dyn ArtifactStore>,
    policy: Arc<SlaPolicy>,
    config: SlaConfig,
}

impl RiskSource {
    pub fn new(store: Arc<dyn ArtifactStore>, policy: Arc<SlaPolicy>, config: SlaConfig) -> Self {
        Self {
            store,
            policy,
            config,
        }
    }
}

#[async_trait]
impl ArtifactModel<RiskModel> for RiskSource {
    async fn load(&self) -> Result<Option<RiskModel>> {
        let Some(bytes) = self.store.load_optional(RISK_ARTIFACT).await? else {
            return Ok(None);
        };

        let policy = Arc::clone(&self.policy);
        let config = self.config.clone();
        let model = tokio::task::spawn_blocking(move || {
            RiskModel::from_artifact(&bytes, policy, &config)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Risk model load task failed: {}", e)))??;

        info!(
            build_id = %model.build_id(),
            sla_version = model.policy().version(),
            "Loaded persisted SLA risk model"
        );
        Ok(Some(model))
    }

    async fn build(&self) -> Result<RiskModel> {
        let policy = Arc::clone(&self.policy);
        let config = self.config.clone();

        let (model, bytes) = tokio::task::spawn_blocking(move || {
            let model = RiskModel::train(policy, &config)?;
            let bytes = model.to_artifact()?.to_bytes()?;
            Ok::<_, AppError>((model, bytes))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Risk model training task failed: {}", e)))??;

        match self.store.save(RISK_ARTIFACT, &bytes).await {
            Ok(()) => info!(
                build_id = %model.build_id(),
                backend = self.store.backend_name(),
                "SLA risk model persisted"
            ),
            Err(e) => warn!(error = %e, "Failed to persist SLA risk model"),
        }

        Ok(model)
    }
}

/// Scores open tickets for SLA breach risk
pub struct RiskService {
    policy: Arc<SlaPolicy>,
    init_wait: Duration,
    source: RiskSource,
    lifecycle: ModelLifecycle<RiskModel>,
}

impl RiskService {
    pub fn new(config: &Config, store: Arc<dyn ArtifactStore>) -> Result<Self> {
        let policy = Arc::new(SlaPolicy::from_config(&config.sla)?);

        Ok(Self {
            source: RiskSource::new(store, Arc::clone(&policy), config.sla.clone()),
            policy,
            init_wait: Duration::from_millis(config.inference.init_wait_ms),
            lifecycle: ModelLifecycle::new(RISK_MODEL, config.inference.init_mode),
        })
    }

    /// The SLA table shared by training and breach projection
    pub fn policy(&self) -> Arc<SlaPolicy> {
        Arc::clone(&self.policy)
    }

    pub fn lifecycle(&self) -> &ModelLifecycle<RiskModel> {
        &self.lifecycle
    }

    /// Load or train the model; a no-op once settled
    pub async fn initialize(&self) -> Result<()> {
        self.lifecycle.initialize(&self.source).await.map(|_| ())
    }

    pub async fn predict_risk(
        &self,
        priority: Priority,
        category: &str,
        open_time_hours: f64,
    ) -> Result<RiskPrediction> {
        self.predict_risk_at(priority, category, open_time_hours, Utc::now())
            .await
    }

    /// Score a ticket with an explicit clock
    pub async fn predict_risk_at(
        &self,
        priority: Priority,
        category: &str,
        open_time_hours: f64,
        now: DateTime<Utc>,
    ) -> Result<RiskPrediction> {
        let started = Instant::now();
        let result = self
            .predict_inner(priority, category, open_time_hours, now)
            .await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(AppError::Validation(_)) => "invalid",
            Err(AppError::ServiceUnavailable(_)) => "unavailable",
            Err(_) => "error",
        };
        metrics::record_query(RISK_MODEL, outcome, started.elapsed());

        result
    }

    /// Validate and answer a raw risk request
    pub async fn predict_sla_risk(&self, request: RiskRequest) -> Result<RiskPrediction> {
        request.validate()?;
        let priority = Priority::parse(&request.priority)?;
        self.predict_risk(priority, &request.category, request.open_time_hours)
            .await
    }

    async fn predict_inner(
        &self,
        priority: Priority,
        category: &str,
        open_time_hours: f64,
        now: DateTime<Utc>,
    ) -> Result<RiskPrediction> {
        if !open_time_hours.is_finite() || open_time_hours < 0.0 {
            return Err(AppError::Validation(format!(
                "open_time_hours must be a non-negative number, got {}",
                open_time_hours
            )));
        }

        let model = self.lifecycle.acquire(&self.source, self.init_wait).await?;
        model.predict(priority, category, open_time_hours, now)
    }

    /// Breach projection without touching the model
    pub fn project_breach_time(
        &self,
        priority: Priority,
        open_time_hours: f64,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.policy.project_breach_time(priority, open_time_hours, now)
    }

    /// Metadata of the serving model, if one is ready
    pub fn model_info(&self) -> Option<ModelMetadata> {
        self.lifecycle.current().map(|m| m.metadata().clone())
    }

    /// Retrain and swap in a new model
    pub async fn rebuild(&self) -> Result<RiskStatus> {
        self.lifecycle.rebuild(&self.source).await?;
        Ok(self.status())
    }

    /// Clear an Unavailable risk model
    pub async fn reset(&self) -> bool {
        self.lifecycle.reset().await
    }

    pub fn status(&self) -> RiskStatus {
        let current = self.lifecycle.current();
        RiskStatus {
            lifecycle: self.lifecycle.status(),
            build_id: current.as_ref().map(|m| m.build_id()),
            sla_version: self.policy.version(),
            model: current.as_ref().map(|m| m.metadata().clone()),
        }
    }
}
