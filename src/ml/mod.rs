/// SLA breach risk scoring
///
/// - SLA policy table and breach projection
/// - Feature encoding (one-hot priority/category, scaled open time)
/// - Synthetic training data labeled by the policy
/// - Logistic regression classifier with persisted weights
/// - Lifecycle-managed risk service

pub mod classifier;
pub mod features;
pub mod models;
pub mod risk_model;
pub mod service;
pub mod sla;
pub mod training;

pub use classifier::{calculate_metrics, Classifier, LogisticRegressionClassifier};
pub use features::RiskFeatureEncoder;
pub use models::{
    ModelMetadata, ModelMetrics, ModelType, RiskModelArtifact, RiskPrediction, RiskRequest,
    RiskSample, RiskStatus, TrainingDataset,
};
pub use risk_model::RiskModel;
pub use service::{RiskService, RiskSource, RISK_ARTIFACT, RISK_MODEL};
pub use sla::{project_breach_time, Priority, RiskTier, SlaPolicy};
pub use training::{balance_classes, generate_synthetic_samples};
