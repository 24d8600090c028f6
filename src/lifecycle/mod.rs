//! Lazily initialized, persisted model artifacts.
//!
//! Each model owns a [`ModelLifecycle`] that moves through
//! Uninitialized → Loading | Building → Ready, or → Unavailable when no
//! artifact can be produced. The artifact itself is supplied by an
//! [`ArtifactModel`] implementation.

pub mod manager;
pub mod phase;

pub use manager::{ArtifactModel, ModelLifecycle};
pub use phase::{ArtifactOrigin, LifecyclePhase, LifecycleStatus};
