use crate::error::{AppError, Result};
use crate::ml::sla::Priority;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// Name of the scaled numeric column
pub const OPEN_TIME_FEATURE: &str = "open_time_hours";

/// Encodes ticket features for the risk classifier.
///
/// Layout: one-hot priority, one-hot category, then standard-scaled
/// `open_time_hours`. Values outside the fitted vocabularies encode as an
/// all-zero block rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFeatureEncoder {
    /// Priority vocabulary, in column order
    priorities: Vec<Priority>,

    /// Category vocabulary, in column order
    categories: Vec<String>,

    /// Scaler mean
    mean: f64,

    /// Scaler standard deviation (1.0 when the data has no spread)
    std: f64,

    /// Is fitted
    is_fitted: bool,
}

impl RiskFeatureEncoder {
    pub fn new() -> Self {
        Self {
            priorities: Vec::new(),
            categories: Vec::new(),
            mean: 0.0,
            std: 1.0,
            is_fitted: false,
        }
    }

    /// Fit vocabularies from the declared values and the scaler from the data.
    /// Categories are sorted and de-duplicated so the layout is stable.
    pub fn fit(&mut self, categories: &[String], open_time_hours: &[f64]) -> Result<()> {
        if open_time_hours.is_empty() {
            return Err(AppError::Training(
                "Cannot fit feature encoder on empty data".to_string(),
            ));
        }

        let mut vocabulary: Vec<String> = categories.to_vec();
        vocabulary.sort();
        vocabulary.dedup();

        let n = open_time_hours.len() as f64;
        let mean = open_time_hours.iter().sum::<f64>() / n;
        let variance = open_time_hours
            .iter()
            .map(|h| (h - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = variance.sqrt();

        self.priorities = Priority::iter().collect();
        self.categories = vocabulary;
        self.mean = mean;
        self.std = if std > f64::EPSILON { std } else { 1.0 };
        self.is_fitted = true;

        tracing::debug!(
            n_features = self.n_features(),
            mean = self.mean,
            std = self.std,
            "Risk feature encoder fitted"
        );

        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn n_features(&self) -> usize {
        self.priorities.len() + self.categories.len() + 1
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Column names, in encoded order
    pub fn schema(&self) -> Vec<String> {
        self.priorities
            .iter()
            .map(|p| format!("priority={}", p))
            .chain(self.categories.iter().map(|c| format!("category={}", c)))
            .chain(std::iter::once(OPEN_TIME_FEATURE.to_string()))
            .collect()
    }

    /// Encode one ticket
    pub fn transform(
        &self,
        priority: Priority,
        category: &str,
        open_time_hours: f64,
    ) -> Result<Array1<f64>> {
        if !self.is_fitted {
            return Err(AppError::Internal(
                "Feature encoder not fitted".to_string(),
            ));
        }

        let mut features = Array1::zeros(self.n_features());

        if let Some(idx) = self.priorities.iter().position(|p| *p == priority) {
            features[idx] = 1.0;
        }

        let offset = self.priorities.len();
        if let Some(idx) = self.categories.iter().position(|c| c == category) {
            features[offset + idx] = 1.0;
        }

        features[self.n_features() - 1] = (open_time_hours - self.mean) / self.std;

        Ok(features)
    }

    /// Encode many tickets into a row-per-ticket matrix
    pub fn transform_batch<'a, I>(&self, rows: I) -> Result<Array2<f64>>
    where
        I: IntoIterator<Item = (Priority, &'a str, f64)>,
    {
        let rows: Vec<Array1<f64>> = rows
            .into_iter()
            .map(|(priority, category, hours)| self.transform(priority, category, hours))
            .collect::<Result<_>>()?;

        let mut matrix = Array2::zeros((rows.len(), self.n_features()));
        for (i, row) in rows.iter().enumerate() {
            matrix.row_mut(i).assign(row);
        }
        Ok(matrix)
    }
}

impl Default for RiskFeatureEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fitted() -> RiskFeatureEncoder {
        let mut encoder = RiskFeatureEncoder::new();
        encoder
            .fit(
                &["Network".to_string(), "Bug".to_string(), "Bug".to_string()],
                &[2.0, 4.0, 6.0],
            )
            .unwrap();
        encoder
    }

    #[test]
    fn test_layout_and_schema() {
        let encoder = fitted();

        assert_eq!(encoder.n_features(), 4 + 2 + 1);
        assert_eq!(
            encoder.schema(),
            vec![
                "priority=Low",
                "priority=Medium",
                "priority=High",
                "priority=Critical",
                "category=Bug",
                "category=Network",
                "open_time_hours",
            ]
        );
    }

    #[test]
    fn test_transform_one_hot_and_scaled() {
        let encoder = fitted();
        let row = encoder.transform(Priority::High, "Network", 4.0).unwrap();

        assert_eq!(row.to_vec(), vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);

        let above = encoder.transform(Priority::Low, "Bug", 6.0).unwrap();
        assert!(above[6] > 1.0);
    }

    #[test]
    fn test_unseen_category_is_zero_block() {
        let encoder = fitted();
        let row = encoder.transform(Priority::Low, "Printers", 4.0).unwrap();

        assert_eq!(row[4], 0.0);
        assert_eq!(row[5], 0.0);
        assert_eq!(row[0], 1.0);
    }

    #[test]
    fn test_unfitted_encoder_errors() {
        let encoder = RiskFeatureEncoder::new();
        assert!(encoder.transform(Priority::Low, "Bug", 1.0).is_err());
    }

    #[test]
    fn test_constant_hours_do_not_divide_by_zero() {
        let mut encoder = RiskFeatureEncoder::new();
        encoder.fit(&["Bug".to_string()], &[3.0, 3.0]).unwrap();

        let row = encoder.transform(Priority::Low, "Bug", 5.0).unwrap();
        assert_eq!(row[row.len() - 1], 2.0);
    }

    #[test]
    fn test_transform_batch_shape() {
        let encoder = fitted();
        let matrix = encoder
            .transform_batch(vec![
                (Priority::Low, "Bug", 1.0),
                (Priority::Critical, "Network", 9.0),
            ])
            .unwrap();

        assert_eq!(matrix.shape(), &[2, 7]);
        assert_eq!(matrix[[1, 3]], 1.0);
    }
}
