use crate::error::{AppError, Result};
use crate::ml::models::{ClassMetrics, ModelMetadata, ModelMetrics, ModelType, TrainingDataset};
use linfa::prelude::*;
use linfa::Dataset;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Decision threshold on P(breached)
pub const DECISION_THRESHOLD: f64 = 0.5;

const DEFAULT_MAX_ITERATIONS: u64 = 300;
const DEFAULT_ALPHA: f64 = 1.0;

/// Trait for binary classifiers that produce calibrated probabilities
pub trait Classifier: Send + Sync {
    /// Train the classifier
    fn train(&mut self, dataset: &TrainingDataset) -> Result<ModelMetrics>;

    /// Predict class labels (1 = positive)
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Predict the positive-class probability for each row
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>>;

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Logistic Regression Classifier
///
/// Fitted with linfa; only the weights and intercept are kept, so the model
/// serializes without the solver state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    /// Model metadata
    metadata: ModelMetadata,

    /// Weights, one per feature
    weights: Option<Array1<f64>>,

    /// Intercept
    intercept: f64,

    /// Solver iteration cap
    max_iterations: u64,

    /// L2 penalty
    alpha: f64,
}

impl LogisticRegressionClassifier {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_MAX_ITERATIONS, DEFAULT_ALPHA)
    }

    pub fn with_params(max_iterations: u64, alpha: f64) -> Self {
        let mut hyperparameters = HashMap::new();
        hyperparameters.insert("max_iterations".to_string(), max_iterations.to_string());
        hyperparameters.insert("alpha".to_string(), alpha.to_string());
        hyperparameters.insert("threshold".to_string(), DECISION_THRESHOLD.to_string());

        Self {
            metadata: ModelMetadata {
                name: ModelType::LogisticRegression.to_string(),
                version: "1.0".to_string(),
                model_type: ModelType::LogisticRegression,
                trained_at: chrono::Utc::now(),
                n_training_samples: 0,
                n_features: 0,
                training_metrics: ModelMetrics::new(),
                validation_metrics: None,
                hyperparameters,
            },
            weights: None,
            intercept: 0.0,
            max_iterations,
            alpha,
        }
    }

    /// Rebuild a trained classifier from persisted parameters
    pub fn from_parts(weights: Vec<f64>, intercept: f64, metadata: ModelMetadata) -> Self {
        Self {
            metadata,
            weights: Some(Array1::from_vec(weights)),
            intercept,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            alpha: DEFAULT_ALPHA,
        }
    }

    pub fn weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Positive-class probability for one encoded row
    pub fn probability(&self, row: ArrayView1<'_, f64>) -> Result<f64> {
        let weights = self.trained_weights()?;
        if row.len() != weights.len() {
            return Err(AppError::Internal(format!(
                "Expected {} features, got {}",
                weights.len(),
                row.len()
            )));
        }
        Ok(sigmoid(row.dot(weights) + self.intercept))
    }

    /// Attach holdout metrics computed after training
    pub fn set_validation_metrics(&mut self, metrics: ModelMetrics) {
        self.metadata.validation_metrics = Some(metrics);
    }

    fn trained_weights(&self) -> Result<&Array1<f64>> {
        self.weights
            .as_ref()
            .ok_or_else(|| AppError::Internal("Model not trained".to_string()))
    }
}

impl Default for LogisticRegressionClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn train(&mut self, dataset: &TrainingDataset) -> Result<ModelMetrics> {
        let counts = dataset.class_counts();
        if counts[0] == 0 || counts[1] == 0 {
            return Err(AppError::Training(format!(
                "Training data needs both classes, got {:?}",
                counts
            )));
        }

        let targets = Array1::from_vec(dataset.labels.clone());
        let linfa_dataset = Dataset::new(dataset.features.clone(), targets);

        let fitted = LogisticRegression::default()
            .max_iterations(self.max_iterations)
            .alpha(self.alpha)
            .fit(&linfa_dataset)
            .map_err(|e| AppError::Training(format!("Failed to train logistic regression: {}", e)))?;

        let mut weights = fitted.params().clone();
        let mut intercept = fitted.intercept();

        // linfa picks which label is "positive"; orient the parameters so
        // that the probability is always P(label == 1).
        let probabilities = fitted.predict_probabilities(&dataset.features);
        let predictions = fitted.predict(&dataset.features);
        let reference = probabilities
            .iter()
            .zip(predictions.iter())
            .find(|(p, _)| (**p - 0.5).abs() > 1e-3);

        if let Some((p, label)) = reference {
            let proba_is_for_label_one = (*p > 0.5) == (*label == 1);
            if !proba_is_for_label_one {
                weights.mapv_inplace(|w| -w);
                intercept = -intercept;
            }
        }

        self.weights = Some(weights);
        self.intercept = intercept;

        // Calculate metrics
        let predictions = self.predict(&dataset.features)?;
        let metrics = calculate_metrics(&dataset.labels, &predictions);

        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.trained_at = chrono::Utc::now();
        self.metadata.training_metrics = metrics.clone();

        Ok(metrics)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let probabilities = self.predict_proba(features)?;
        Ok(probabilities
            .iter()
            .map(|&p| usize::from(p >= DECISION_THRESHOLD))
            .collect())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.trained_weights()?;
        if features.ncols() != weights.len() {
            return Err(AppError::Internal(format!(
                "Expected {} features, got {}",
                weights.len(),
                features.ncols()
            )));
        }

        let logits = features.dot(weights) + self.intercept;
        Ok(logits.mapv(sigmoid))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn is_trained(&self) -> bool {
        self.weights.is_some()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Binary classification metrics; the headline precision, recall and F1 are
/// for the positive class
pub fn calculate_metrics(y_true: &[usize], y_pred: &[usize]) -> ModelMetrics {
    let n_samples = y_true.len();
    if n_samples == 0 {
        return ModelMetrics::new();
    }

    let mut confusion = [[0usize; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        confusion[t.min(1)][p.min(1)] += 1;
    }

    let correct = confusion[0][0] + confusion[1][1];
    let accuracy = correct as f64 / n_samples as f64;

    let mut per_class = HashMap::new();
    for class_idx in 0..2 {
        let other = 1 - class_idx;
        let tp = confusion[class_idx][class_idx];
        let fp = confusion[other][class_idx];
        let fn_count = confusion[class_idx][other];

        let precision = if tp + fp > 0 {
            tp as f64 / (tp + fp) as f64
        } else {
            0.0
        };

        let recall = if tp + fn_count > 0 {
            tp as f64 / (tp + fn_count) as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        let name = if class_idx == 1 { "breached" } else { "within_sla" };
        per_class.insert(
            name.to_string(),
            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support: tp + fn_count,
            },
        );
    }

    let positive = &per_class["breached"];
    ModelMetrics {
        accuracy,
        precision: positive.precision,
        recall: positive.recall,
        f1_score: positive.f1_score,
        confusion_matrix: confusion,
        per_class_metrics: per_class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> TrainingDataset {
        // One feature: positive when x > 0
        let xs = [-3.0, -2.5, -2.0, -1.5, -1.0, 1.0, 1.5, 2.0, 2.5, 3.0];
        let mut features = Array2::zeros((xs.len(), 1));
        for (i, x) in xs.iter().enumerate() {
            features[[i, 0]] = *x;
        }
        TrainingDataset {
            features,
            labels: xs.iter().map(|&x| usize::from(x > 0.0)).collect(),
            n_samples: xs.len(),
            n_features: 1,
        }
    }

    #[test]
    fn test_train_orients_probabilities_to_positive_label() {
        let mut classifier = LogisticRegressionClassifier::new();
        let metrics = classifier.train(&separable()).unwrap();

        assert!(classifier.is_trained());
        assert!(metrics.accuracy > 0.9);

        let proba = classifier
            .predict_proba(&array![[-3.0], [3.0]])
            .unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[1] > 0.5);
        assert!(classifier.weights().unwrap()[0] > 0.0);
    }

    #[test]
    fn test_single_class_rejected() {
        let mut dataset = separable();
        dataset.labels = vec![0; dataset.n_samples];

        let mut classifier = LogisticRegressionClassifier::new();
        assert!(matches!(
            classifier.train(&dataset),
            Err(AppError::Training(_))
        ));
    }

    #[test]
    fn test_untrained_predict_errors() {
        let classifier = LogisticRegressionClassifier::new();
        assert!(classifier.predict(&array![[1.0]]).is_err());
        assert!(!classifier.is_trained());
    }

    #[test]
    fn test_from_parts_probability() {
        let metadata = LogisticRegressionClassifier::new().metadata().clone();
        let classifier = LogisticRegressionClassifier::from_parts(vec![2.0, -1.0], 0.5, metadata);

        let p = classifier.probability(array![1.0, 0.5].view()).unwrap();
        assert!((p - sigmoid(2.0)).abs() < 1e-12);
        assert!(classifier.probability(array![1.0].view()).is_err());
    }

    #[test]
    fn test_calculate_metrics() {
        let y_true = vec![1, 1, 1, 0, 0, 0, 0, 0];
        let y_pred = vec![1, 1, 0, 1, 0, 0, 0, 0];

        let metrics = calculate_metrics(&y_true, &y_pred);

        assert_eq!(metrics.confusion_matrix, [[4, 1], [1, 2]]);
        assert!((metrics.accuracy - 0.75).abs() < 1e-12);
        assert!((metrics.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.per_class_metrics["within_sla"].support, 5);
    }
}
