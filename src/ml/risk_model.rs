use crate::config::SlaConfig;
use crate::error::{AppError, Result};
use crate::ml::classifier::{calculate_metrics, Classifier, LogisticRegressionClassifier};
use crate::ml::features::RiskFeatureEncoder;
use crate::ml::models::{ModelMetadata, RiskModelArtifact, RiskPrediction, TrainingDataset};
use crate::ml::sla::{Priority, RiskTier, SlaPolicy};
use crate::ml::training::{balance_classes, generate_synthetic_samples};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use uuid::Uuid;

/// Holdout share used for validation metrics
const VALIDATION_SPLIT: f64 = 0.2;

/// Trained SLA breach classifier bound to the policy it was trained under
#[derive(Debug, Clone)]
pub struct RiskModel {
    build_id: Uuid,
    policy: Arc<SlaPolicy>,
    encoder: RiskFeatureEncoder,
    classifier: LogisticRegressionClassifier,
}

impl RiskModel {
    /// Train on synthetic tickets labeled by `policy`
    pub fn train(policy: Arc<SlaPolicy>, config: &SlaConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.seed);

        let samples = generate_synthetic_samples(
            &policy,
            &config.categories,
            config.synthetic_samples,
            config.near_deadline_ratio,
            &mut rng,
        )?;

        let mut encoder = RiskFeatureEncoder::new();
        let hours: Vec<f64> = samples.iter().map(|s| s.open_time_hours).collect();
        encoder.fit(&config.categories, &hours)?;

        let dataset = TrainingDataset::from_samples(&encoder, &samples)?;
        let (train, holdout) = dataset.train_test_split(VALIDATION_SPLIT);
        let train = balance_classes(&train, &mut rng)?;

        let mut classifier = LogisticRegressionClassifier::new();
        let training_metrics = classifier.train(&train)?;

        if holdout.n_samples > 0 {
            let predictions = classifier.predict(&holdout.features)?;
            classifier.set_validation_metrics(calculate_metrics(&holdout.labels, &predictions));
        }

        let model = Self {
            build_id: Uuid::now_v7(),
            policy,
            encoder,
            classifier,
        };

        tracing::info!(
            build_id = %model.build_id,
            samples = dataset.n_samples,
            train_accuracy = training_metrics.accuracy,
            validation_accuracy = model
                .metadata()
                .validation_metrics
                .as_ref()
                .map(|m| m.accuracy),
            "SLA risk model trained"
        );

        Ok(model)
    }

    /// Feature layout a model trained under `config` must have
    pub fn expected_schema(config: &SlaConfig) -> Result<Vec<String>> {
        let mut encoder = RiskFeatureEncoder::new();
        encoder.fit(&config.categories, &[0.0])?;
        Ok(encoder.schema())
    }

    pub fn to_artifact(&self) -> Result<RiskModelArtifact> {
        let weights = self
            .classifier
            .weights()
            .ok_or_else(|| AppError::Internal("Risk model has no weights".to_string()))?;

        Ok(RiskModelArtifact {
            build_id: self.build_id,
            feature_schema: self.encoder.schema(),
            sla_version: self.policy.version(),
            encoder: self.encoder.clone(),
            weights: weights.to_vec(),
            intercept: self.classifier.intercept(),
            metadata: self.classifier.metadata().clone(),
        })
    }

    /// Decode and verify a persisted model against the running policy
    pub fn from_artifact(bytes: &[u8], policy: Arc<SlaPolicy>, config: &SlaConfig) -> Result<Self> {
        let artifact = RiskModelArtifact::from_bytes(bytes)?;
        artifact.verify(&Self::expected_schema(config)?, policy.version())?;

        Ok(Self {
            build_id: artifact.build_id,
            policy,
            encoder: artifact.encoder,
            classifier: LogisticRegressionClassifier::from_parts(
                artifact.weights,
                artifact.intercept,
                artifact.metadata,
            ),
        })
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub fn policy(&self) -> &Arc<SlaPolicy> {
        &self.policy
    }

    pub fn metadata(&self) -> &ModelMetadata {
        self.classifier.metadata()
    }

    /// P(breached) for one ticket
    pub fn probability(&self, priority: Priority, category: &str, open_time_hours: f64) -> Result<f64> {
        let row = self.encoder.transform(priority, category, open_time_hours)?;
        self.classifier.probability(row.view())
    }

    pub fn predict(
        &self,
        priority: Priority,
        category: &str,
        open_time_hours: f64,
        now: DateTime<Utc>,
    ) -> Result<RiskPrediction> {
        let probability = self.probability(priority, category, open_time_hours)?;
        let metadata = self.metadata();

        Ok(RiskPrediction {
            risk_score: (probability * 1000.0).round() / 1000.0,
            risk_tier: RiskTier::from_score(probability),
            predicted_breach_time: self
                .policy
                .project_breach_time(priority, open_time_hours, now),
            model_used: format!("{} v{}", metadata.name, metadata.version),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn small_config() -> SlaConfig {
        SlaConfig {
            synthetic_samples: 600,
            ..SlaConfig::default()
        }
    }

    fn trained() -> RiskModel {
        RiskModel::train(Arc::new(SlaPolicy::default()), &small_config()).unwrap()
    }

    #[test]
    fn test_training_records_metadata() {
        let model = trained();
        let metadata = model.metadata();

        assert_eq!(metadata.name, "Logistic Regression");
        assert_eq!(metadata.n_features, 4 + 6 + 1);
        assert!(metadata.validation_metrics.is_some());
        assert!(metadata.training_metrics.accuracy > 0.6);
    }

    #[test]
    fn test_risk_grows_with_open_time() {
        let model = trained();
        let early = model.probability(Priority::Low, "Bug", 1.0).unwrap();
        let late = model.probability(Priority::Low, "Bug", 60.0).unwrap();
        assert!(late > early);
    }

    #[test]
    fn test_prediction_shape() {
        let model = trained();
        let now = Utc::now();

        let overdue = model.predict(Priority::Critical, "Bug", 5.0, now).unwrap();
        assert!((0.0..=1.0).contains(&overdue.risk_score));
        assert_eq!(overdue.predicted_breach_time, None);
        assert_eq!(overdue.model_used, "Logistic Regression v1.0");

        let fresh = model.predict(Priority::Low, "Bug", 1.0, now).unwrap();
        assert_eq!(fresh.predicted_breach_time, Some(now + Duration::hours(47)));
        assert!(overdue.risk_score > fresh.risk_score);
    }

    #[test]
    fn test_artifact_round_trip_keeps_predictions() {
        let model = trained();
        let bytes = model.to_artifact().unwrap().to_bytes().unwrap();

        let restored =
            RiskModel::from_artifact(&bytes, Arc::clone(model.policy()), &small_config()).unwrap();

        assert_eq!(restored.build_id(), model.build_id());
        let a = model.probability(Priority::High, "Network", 6.0).unwrap();
        let b = restored.probability(Priority::High, "Network", 6.0).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_artifact_rejected_after_policy_change() {
        let model = trained();
        let bytes = model.to_artifact().unwrap().to_bytes().unwrap();

        let config = SlaConfig {
            policy_version: 2,
            ..small_config()
        };
        let policy = Arc::new(SlaPolicy::from_config(&config).unwrap());

        let err = RiskModel::from_artifact(&bytes, policy, &config).unwrap_err();
        assert!(matches!(err, AppError::ArtifactMismatch(_)));
    }

    #[test]
    fn test_artifact_rejected_after_category_change() {
        let model = trained();
        let bytes = model.to_artifact().unwrap().to_bytes().unwrap();

        let mut config = small_config();
        config.categories.push("Hardware".to_string());

        let err = RiskModel::from_artifact(&bytes, Arc::clone(model.policy()), &config).unwrap_err();
        assert!(err.requires_rebuild());
    }
}
