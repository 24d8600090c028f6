use crate::lifecycle::LifecycleStatus;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use uuid::Uuid;
use validator::Validate;

/// How a recommendation was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchQuality {
    /// Nearest neighbour of the query
    Similarity,
    /// Random low-confidence pick; nothing matched the filter
    Fallback,
}

/// One recommended resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub resolution_id: String,
    pub text: String,
    /// In [0, 1], rounded to 3 decimals
    pub similarity_score: f32,
    pub category: Option<String>,
    pub match_quality: MatchQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
    pub match_quality: MatchQuality,
}

impl RecommendationResponse {
    pub fn is_fallback(&self) -> bool {
        self.match_quality == MatchQuality::Fallback
    }
}

/// Inbound recommendation query
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecommendationRequest {
    #[validate(length(min = 1, max = 10000))]
    pub description: String,

    #[validate(length(min = 1, max = 200))]
    #[serde(default)]
    pub category: Option<String>,

    #[validate(range(min = 1, max = 100))]
    #[serde(default)]
    pub top_n: Option<usize>,
}

impl RecommendationRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            category: None,
            top_n: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = Some(top_n);
        self
    }
}

/// Operator view of the recommendation model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationStatus {
    #[serde(flatten)]
    pub lifecycle: LifecycleStatus,
    pub records: Option<usize>,
    pub encoder_id: Option<String>,
    pub build_id: Option<Uuid>,
}

/// Round a score to 3 decimal places
pub fn round_score(score: f32) -> f32 {
    (score * 1000.0).round() / 1000.0
}
