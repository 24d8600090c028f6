use crate::error::{AppError, Result};
use crate::recommend::encoder::TextEncoder;
use crate::recommend::index::{similarity_from_distance, SimilarityIndex};
use crate::recommend::knowledge_base::{validate_records, ResolutionRecord};
use crate::recommend::models::{round_score, MatchQuality, Recommendation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

pub const INDEX_ARTIFACT: &str = "resolution_index.bin";
pub const METADATA_ARTIFACT: &str = "resolution_metadata.json";

/// Persisted vector index (bincode)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexArtifact {
    pub build_id: Uuid,
    pub encoder_id: String,
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
    pub ready_for_search: bool,
}

/// Persisted records aligned with the index vectors (JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionMetadataArtifact {
    pub build_id: Uuid,
    pub records: Vec<ResolutionRecord>,
}

/// Ready-to-query recommendation model: encoder, index and the records the
/// index positions refer to.
pub struct ResolutionModel {
    build_id: Uuid,
    encoder: Arc<dyn TextEncoder>,
    index: SimilarityIndex,
    records: Vec<ResolutionRecord>,
}

impl std::fmt::Debug for ResolutionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionModel")
            .field("build_id", &self.build_id)
            .field("encoder", &self.encoder.model_id())
            .field("records", &self.records.len())
            .finish()
    }
}

impl ResolutionModel {
    /// Encode every record and index the vectors
    pub fn build(encoder: Arc<dyn TextEncoder>, records: Vec<ResolutionRecord>) -> Result<Self> {
        validate_records(&records)?;

        let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
        let vectors = encoder.encode_batch(&texts)?;
        let index = SimilarityIndex::build(encoder.dimension(), vectors)?;

        Ok(Self {
            build_id: Uuid::now_v7(),
            encoder,
            index,
            records,
        })
    }

    /// Serialize into the index/metadata artifact pair
    pub fn to_artifacts(&self) -> Result<Vec<(&'static str, Vec<u8>)>> {
        let index = VectorIndexArtifact {
            build_id: self.build_id,
            encoder_id: self.encoder.model_id(),
            dimension: self.index.dimension(),
            vectors: self.index.vectors().to_vec(),
            ready_for_search: true,
        };
        let metadata = ResolutionMetadataArtifact {
            build_id: self.build_id,
            records: self.records.clone(),
        };

        Ok(vec![
            (INDEX_ARTIFACT, bincode::serialize(&index)?),
            (METADATA_ARTIFACT, serde_json::to_vec_pretty(&metadata)?),
        ])
    }

    /// Rehydrate from persisted artifacts, checking that both halves belong
    /// to the same build and to the running encoder
    pub fn from_artifacts(
        index_bytes: &[u8],
        metadata_bytes: &[u8],
        encoder: Arc<dyn TextEncoder>,
    ) -> Result<Self> {
        let index: VectorIndexArtifact = bincode::deserialize(index_bytes)?;
        let metadata: ResolutionMetadataArtifact = serde_json::from_slice(metadata_bytes)?;

        if index.build_id != metadata.build_id {
            return Err(AppError::ArtifactMismatch(format!(
                "index build {} does not match metadata build {}",
                index.build_id, metadata.build_id
            )));
        }
        if !index.ready_for_search {
            return Err(AppError::ArtifactMismatch(
                "index was persisted before it was searchable".to_string(),
            ));
        }
        let encoder_id = encoder.model_id();
        if index.encoder_id != encoder_id {
            return Err(AppError::ArtifactMismatch(format!(
                "index built with encoder {}, running {}",
                index.encoder_id, encoder_id
            )));
        }
        if index.dimension != encoder.dimension() {
            return Err(AppError::ArtifactMismatch(format!(
                "index dimension {} does not match encoder dimension {}",
                index.dimension,
                encoder.dimension()
            )));
        }
        if index.vectors.len() != metadata.records.len() {
            return Err(AppError::ArtifactMismatch(format!(
                "{} vectors for {} records",
                index.vectors.len(),
                metadata.records.len()
            )));
        }
        validate_records(&metadata.records)
            .map_err(|e| AppError::ArtifactMismatch(e.to_string()))?;

        let search_index = SimilarityIndex::build(index.dimension, index.vectors)
            .map_err(|e| AppError::ArtifactMismatch(e.to_string()))?;

        Ok(Self {
            build_id: index.build_id,
            encoder,
            index: search_index,
            records: metadata.records,
        })
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    pub fn encoder_id(&self) -> String {
        self.encoder.model_id()
    }

    pub fn records(&self) -> &[ResolutionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Nearest records to `description`, at most `top_n`.
    ///
    /// Over-fetches `max(2 * top_n, min_candidates)` neighbours so a category
    /// filter still has candidates to choose from. Empty when nothing
    /// survives the filter.
    pub fn similar(
        &self,
        description: &str,
        category: Option<&str>,
        top_n: usize,
        min_candidates: usize,
        distance_scale: f32,
    ) -> Result<Vec<Recommendation>> {
        let query = self.encoder.encode(description)?;
        let k = top_n.saturating_mul(2).max(min_candidates);
        let hits = self.index.search(&query, k)?;

        let mut emitted: HashSet<&str> = HashSet::with_capacity(top_n);
        let mut recommendations = Vec::with_capacity(top_n);

        for hit in hits {
            let Some(record) = self.records.get(hit.position) else {
                continue;
            };
            if emitted.contains(record.id.as_str()) {
                continue;
            }
            if let Some(filter) = category {
                if record.category.as_deref() != Some(filter) {
                    continue;
                }
            }

            emitted.insert(record.id.as_str());
            recommendations.push(Recommendation {
                resolution_id: record.id.clone(),
                text: record.text.clone(),
                similarity_score: round_score(similarity_from_distance(
                    hit.distance,
                    distance_scale,
                )),
                category: record.category.clone(),
                match_quality: MatchQuality::Similarity,
            });

            if recommendations.len() >= top_n {
                break;
            }
        }

        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::encoder::HashingEncoder;
    use crate::recommend::knowledge_base::seed_records;

    fn encoder(dimension: usize) -> Arc<dyn TextEncoder> {
        Arc::new(HashingEncoder::new(dimension, true).unwrap())
    }

    fn model() -> ResolutionModel {
        ResolutionModel::build(encoder(384), seed_records()).unwrap()
    }

    #[test]
    fn test_build_aligns_vectors_and_records() {
        let model = model();
        assert_eq!(model.len(), 15);
        assert_eq!(model.index.len(), model.records().len());
    }

    #[test]
    fn test_artifacts_round_trip() {
        let model = model();
        let artifacts = model.to_artifacts().unwrap();
        assert_eq!(artifacts[0].0, INDEX_ARTIFACT);
        assert_eq!(artifacts[1].0, METADATA_ARTIFACT);

        let restored =
            ResolutionModel::from_artifacts(&artifacts[0].1, &artifacts[1].1, encoder(384))
                .unwrap();

        assert_eq!(restored.build_id(), model.build_id());
        assert_eq!(restored.records(), model.records());
        assert_eq!(restored.index.vectors(), model.index.vectors());
    }

    #[test]
    fn test_mixed_builds_are_rejected() {
        let first = model().to_artifacts().unwrap();
        let second = model().to_artifacts().unwrap();

        let err = ResolutionModel::from_artifacts(&first[0].1, &second[1].1, encoder(384))
            .unwrap_err();
        assert!(matches!(err, AppError::ArtifactMismatch(_)));
    }

    #[test]
    fn test_encoder_change_is_rejected() {
        let artifacts = model().to_artifacts().unwrap();

        let err = ResolutionModel::from_artifacts(&artifacts[0].1, &artifacts[1].1, encoder(256))
            .unwrap_err();
        assert!(matches!(err, AppError::ArtifactMismatch(_)));
    }

    #[test]
    fn test_corrupt_index_is_serialization_error() {
        let artifacts = model().to_artifacts().unwrap();

        let err = ResolutionModel::from_artifacts(&[1, 2, 3], &artifacts[1].1, encoder(384))
            .unwrap_err();
        assert!(err.requires_rebuild());
    }

    #[test]
    fn test_similar_exact_text_scores_one() {
        let model = model();
        let hits = model
            .similar("Replace faulty RAM modules.", None, 3, 5, 2.0)
            .unwrap();

        assert_eq!(hits[0].resolution_id, "res8");
        assert_eq!(hits[0].similarity_score, 1.0);
        assert!(hits.windows(2).all(|w| w[0].similarity_score >= w[1].similarity_score));
    }

    #[test]
    fn test_similar_respects_category_filter() {
        let model = model();
        let hits = model
            .similar("reboot and check the network", Some("Network Problem"), 3, 5, 2.0)
            .unwrap();

        assert!(!hits.is_empty());
        assert!(hits
            .iter()
            .all(|h| h.category.as_deref() == Some("Network Problem")));
    }

    #[test]
    fn test_similar_unknown_category_is_empty() {
        let hits = model()
            .similar("disk is failing", Some("Nonexistent"), 3, 5, 2.0)
            .unwrap();
        assert!(hits.is_empty());
    }
}
