use crate::error::{AppError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Durable storage for named model artifacts.
///
/// Writes are all-or-nothing per artifact: `load` never observes a partially
/// written value. `save_group` persists several artifacts that are only
/// meaningful together; backends make the group as atomic as their medium
/// allows, and readers still cross-check the members on load.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Check whether an artifact is present
    async fn exists(&self, name: &str) -> Result<bool>;

    /// Load an artifact, `AppError::ArtifactAbsent` if missing
    async fn load(&self, name: &str) -> Result<Vec<u8>>;

    /// Save (replace) a single artifact
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Save several artifacts as one unit
    async fn save_group(&self, artifacts: &[(&str, Vec<u8>)]) -> Result<()>;

    /// Remove an artifact; removing a missing artifact is not an error
    async fn remove(&self, name: &str) -> Result<()>;

    /// Short backend identifier for logs
    fn backend_name(&self) -> &'static str;

    /// Load an artifact, mapping absence to `None`
    async fn load_optional(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match self.load(name).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(AppError::ArtifactAbsent(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Reject names that could escape the store root or collide with temp files
pub(crate) fn validate_artifact_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(AppError::Storage(format!("Invalid artifact name: {:?}", name)))
    }
}

/// In-memory artifact store (for tests and ephemeral deployments)
#[derive(Clone, Default)]
pub struct InMemoryArtifactStore {
    artifacts: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored artifacts
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        validate_artifact_name(name)?;
        Ok(self.artifacts.contains_key(name))
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>> {
        validate_artifact_name(name)?;
        self.artifacts
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::ArtifactAbsent(name.to_string()))
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        validate_artifact_name(name)?;
        self.artifacts.insert(name.to_string(), bytes.to_vec());
        tracing::debug!(artifact = name, bytes = bytes.len(), "Artifact saved");
        Ok(())
    }

    async fn save_group(&self, artifacts: &[(&str, Vec<u8>)]) -> Result<()> {
        for (name, _) in artifacts {
            validate_artifact_name(name)?;
        }
        for (name, bytes) in artifacts {
            self.artifacts.insert(name.to_string(), bytes.clone());
        }
        tracing::debug!(count = artifacts.len(), "Artifact group saved");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        validate_artifact_name(name)?;
        self.artifacts.remove(name);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
