use crate::error::{AppError, Result};
use crate::lifecycle::LifecycleStatus;
use crate::ml::features::RiskFeatureEncoder;
use crate::ml::sla::{Priority, RiskTier};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::Display;
use uuid::Uuid;
use validator::Validate;

/// One labeled ticket used for training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSample {
    pub priority: Priority,
    pub category: String,
    pub open_time_hours: f64,
    pub breached: bool,
}

/// Training dataset
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Labels: 1 = breached, 0 = within SLA
    pub labels: Vec<usize>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    /// Encode samples with a fitted encoder
    pub fn from_samples(encoder: &RiskFeatureEncoder, samples: &[RiskSample]) -> Result<Self> {
        let features = encoder.transform_batch(
            samples
                .iter()
                .map(|s| (s.priority, s.category.as_str(), s.open_time_hours)),
        )?;
        let labels = samples.iter().map(|s| usize::from(s.breached)).collect();

        Ok(Self {
            n_samples: features.nrows(),
            n_features: features.ncols(),
            features,
            labels,
        })
    }

    /// Split off the last `test_size` fraction as a holdout set
    pub fn train_test_split(&self, test_size: f64) -> (TrainingDataset, TrainingDataset) {
        let n_test = (self.n_samples as f64 * test_size.clamp(0.0, 1.0)) as usize;
        let n_train = self.n_samples - n_test;

        let train_features = self.features.slice(ndarray::s![..n_train, ..]).to_owned();
        let test_features = self.features.slice(ndarray::s![n_train.., ..]).to_owned();

        (
            TrainingDataset {
                features: train_features,
                labels: self.labels[..n_train].to_vec(),
                n_samples: n_train,
                n_features: self.n_features,
            },
            TrainingDataset {
                features: test_features,
                labels: self.labels[n_train..].to_vec(),
                n_samples: n_test,
                n_features: self.n_features,
            },
        )
    }

    /// Keep only the given rows, in the given order (rows may repeat)
    pub fn select(&self, rows: &[usize]) -> TrainingDataset {
        TrainingDataset {
            features: self.features.select(Axis(0), rows),
            labels: rows.iter().map(|&i| self.labels[i]).collect(),
            n_samples: rows.len(),
            n_features: self.n_features,
        }
    }

    /// Number of samples per label
    pub fn class_counts(&self) -> [usize; 2] {
        let positives = self.labels.iter().filter(|&&l| l == 1).count();
        [self.labels.len() - positives, positives]
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Precision for the breached class
    pub precision: f64,

    /// Recall for the breached class
    pub recall: f64,

    /// F1 score for the breached class
    pub f1_score: f64,

    /// Confusion matrix, rows = actual, columns = predicted
    pub confusion_matrix: [[usize; 2]; 2],

    /// Per-class metrics
    pub per_class_metrics: HashMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: [[0; 2]; 2],
            per_class_metrics: HashMap::new(),
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: DateTime<Utc>,

    /// Number of training samples (after class balancing)
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Training metrics
    pub training_metrics: ModelMetrics,

    /// Holdout metrics
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum ModelType {
    /// Logistic regression
    #[strum(serialize = "Logistic Regression")]
    LogisticRegression,
}

/// Inbound risk query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RiskRequest {
    #[validate(length(min = 1, max = 32))]
    pub priority: String,

    #[validate(length(max = 200))]
    pub category: String,

    #[validate(range(min = 0.0))]
    pub open_time_hours: f64,
}

impl RiskRequest {
    pub fn new(priority: impl Into<String>, category: impl Into<String>, open_time_hours: f64) -> Self {
        Self {
            priority: priority.into(),
            category: category.into(),
            open_time_hours,
        }
    }
}

/// Breach risk for one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    /// P(breached), rounded to 3 decimals
    pub risk_score: f64,
    /// Tier of the unrounded probability
    pub risk_tier: RiskTier,
    pub predicted_breach_time: Option<DateTime<Utc>>,
    pub model_used: String,
}

/// Persisted risk model (bincode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskModelArtifact {
    pub build_id: Uuid,
    pub feature_schema: Vec<String>,
    pub sla_version: u32,
    pub encoder: RiskFeatureEncoder,
    pub weights: Vec<f64>,
    pub intercept: f64,
    pub metadata: ModelMetadata,
}

impl RiskModelArtifact {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Check the artifact against the running feature layout and SLA policy
    pub fn verify(&self, expected_schema: &[String], sla_version: u32) -> Result<()> {
        if self.feature_schema != expected_schema {
            return Err(AppError::ArtifactMismatch(format!(
                "feature schema changed: persisted {:?}, expected {:?}",
                self.feature_schema, expected_schema
            )));
        }
        if self.encoder.schema() != self.feature_schema {
            return Err(AppError::ArtifactMismatch(
                "encoder layout disagrees with recorded feature schema".to_string(),
            ));
        }
        if self.weights.len() != self.feature_schema.len() {
            return Err(AppError::ArtifactMismatch(format!(
                "{} weights for {} features",
                self.weights.len(),
                self.feature_schema.len()
            )));
        }
        if self.sla_version != sla_version {
            return Err(AppError::ArtifactMismatch(format!(
                "trained under SLA policy v{}, running v{}",
                self.sla_version, sla_version
            )));
        }
        Ok(())
    }
}

/// Operator view of the risk model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskStatus {
    #[serde(flatten)]
    pub lifecycle: LifecycleStatus,
    pub build_id: Option<Uuid>,
    pub sla_version: u32,
    pub model: Option<ModelMetadata>,
}
