//! Persisted inference models for incident tickets.
//!
//! Two query operations sit on top of lifecycle-managed artifacts:
//! resolution recommendation (text embedding plus nearest-neighbour search
//! over a knowledge base) and SLA breach risk (logistic regression plus a
//! deadline projection).

pub mod artifacts;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod ml;
pub mod recommend;
pub mod runtime;

pub use config::Config;
pub use error::{AppError, Result};
pub use runtime::{InferenceRuntime, RuntimeStatus};
