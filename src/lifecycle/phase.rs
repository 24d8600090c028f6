use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Where a model's lifecycle currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LifecyclePhase {
    /// Nothing attempted yet
    Uninitialized,
    /// Reading a persisted artifact
    Loading,
    /// Producing a new artifact from source data
    Building,
    /// Serving queries
    Ready,
    /// Initialization failed; stays here until reset
    Unavailable,
}

impl LifecyclePhase {
    /// Ready and Unavailable are the only phases a waiter can act on
    pub fn is_settled(&self) -> bool {
        matches!(self, LifecyclePhase::Ready | LifecyclePhase::Unavailable)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, LifecyclePhase::Loading | LifecyclePhase::Building)
    }

    /// Numeric encoding for the phase gauge
    pub fn as_gauge(&self) -> f64 {
        match self {
            LifecyclePhase::Uninitialized => 0.0,
            LifecyclePhase::Loading => 1.0,
            LifecyclePhase::Building => 2.0,
            LifecyclePhase::Ready => 3.0,
            LifecyclePhase::Unavailable => 4.0,
        }
    }
}

/// How the ready artifact came to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ArtifactOrigin {
    Loaded,
    Built,
}

/// Point-in-time view of a lifecycle, for operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleStatus {
    pub model: String,
    pub phase: LifecyclePhase,
    pub origin: Option<ArtifactOrigin>,
    pub ready_since: Option<DateTime<Utc>>,
    pub failure: Option<String>,
}
