pub mod artifact;
pub mod candle;
pub mod encoder;
pub mod index;
pub mod knowledge_base;
pub mod models;
pub mod service;

pub use artifact::{ResolutionModel, INDEX_ARTIFACT, METADATA_ARTIFACT};
pub use candle::CandleEncoder;
pub use encoder::{load_encoder, HashingEncoder, TextEncoder};
pub use index::{similarity_from_distance, Neighbor, SimilarityIndex};
pub use knowledge_base::{load_knowledge_base, seed_records, ResolutionRecord};
pub use models::{
    MatchQuality, Recommendation, RecommendationRequest, RecommendationResponse,
    RecommendationStatus,
};
pub use service::{RecommendationService, ResolutionSource, RECOMMENDATION_MODEL};
