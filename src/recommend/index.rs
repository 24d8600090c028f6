use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// A search hit: position in the index and squared Euclidean distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour index over fixed-dimension vectors.
///
/// Brute force over every stored vector. Results are ordered by ascending
/// squared L2 distance; equal distances keep insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl SimilarityIndex {
    /// Build an index; every vector must have length `dimension`
    pub fn build(dimension: usize, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if dimension == 0 {
            return Err(AppError::Validation(
                "Index dimension must be greater than zero".to_string(),
            ));
        }

        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(AppError::Validation(format!(
                "Vector {} has dimension {}, expected {}",
                position,
                vector.len(),
                dimension
            )));
        }

        Ok(Self { dimension, vectors })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Return up to `k` nearest neighbours of `query`
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(AppError::Validation(format!(
                "Query has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        if k == 0 || self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        // sort_by is stable: ties stay in insertion order
        neighbors.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        neighbors.truncate(k);

        Ok(neighbors)
    }
}

/// Squared Euclidean distance
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Map a squared L2 distance to a similarity in [0, 1].
///
/// `scale` is a calibration constant: for unit-norm vectors the squared
/// distance of orthogonal vectors is 2, so a scale of 2 maps orthogonal to 0
/// and identical to 1. It must be re-derived when the encoder changes.
pub fn similarity_from_distance(distance: f32, scale: f32) -> f32 {
    if scale.is_nan() || scale <= 0.0 || !distance.is_finite() {
        return 0.0;
    }
    (1.0 - distance / scale).clamp(0.0, 1.0)
}
