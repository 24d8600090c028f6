use crate::artifacts::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore, SledArtifactStore};
use crate::config::{ArtifactBackend, ArtifactStoreConfig};
use crate::error::{AppError, Result};
use std::sync::Arc;

/// Create an artifact store based on configuration
pub fn create_artifact_store(config: &ArtifactStoreConfig) -> Result<Arc<dyn ArtifactStore>> {
    match config.backend {
        ArtifactBackend::Filesystem => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "Filesystem artifact backend requires 'path' configuration".to_string(),
                )
            })?;

            tracing::info!(path = ?path, "Initializing filesystem artifact backend");

            Ok(Arc::new(FsArtifactStore::new(path)?))
        }

        ArtifactBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration(
                    "Sled artifact backend requires 'path' configuration".to_string(),
                )
            })?;

            tracing::info!(path = ?path, "Initializing Sled artifact backend");

            Ok(Arc::new(SledArtifactStore::new(path)?))
        }

        ArtifactBackend::Memory => {
            tracing::warn!("In-memory artifact backend selected; models are rebuilt on every start");
            Ok(create_in_memory_artifact_store())
        }
    }
}

/// Create an in-memory store (for testing and development)
pub fn create_in_memory_artifact_store() -> Arc<dyn ArtifactStore> {
    Arc::new(InMemoryArtifactStore::new())
}
