use crate::artifacts::store::{validate_artifact_name, ArtifactStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent artifact store using Sled embedded database
#[derive(Clone)]
pub struct SledArtifactStore {
    db: Arc<Db>,
    artifacts_tree: sled::Tree,
}

impl SledArtifactStore {
    /// Create a new Sled store at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref();
        let db = sled::open(&path).map_err(|e| {
            AppError::Storage(format!("Failed to open Sled database: {}", e))
        })?;

        let artifacts_tree = db.open_tree("artifacts").map_err(|e| {
            AppError::Storage(format!("Failed to open artifacts tree: {}", e))
        })?;

        tracing::info!("Initialized Sled artifact store at {:?}", path_str);

        Ok(Self {
            db: Arc::new(db),
            artifacts_tree,
        })
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await.map_err(|e| {
            AppError::Storage(format!("Failed to flush database: {}", e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactStore for SledArtifactStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        validate_artifact_name(name)?;
        self.artifacts_tree.contains_key(name.as_bytes()).map_err(|e| {
            AppError::Storage(format!("Failed to read artifact {}: {}", name, e))
        })
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>> {
        validate_artifact_name(name)?;
        let value = self.artifacts_tree.get(name.as_bytes()).map_err(|e| {
            AppError::Storage(format!("Failed to read artifact {}: {}", name, e))
        })?;

        value
            .map(|ivec| ivec.to_vec())
            .ok_or_else(|| AppError::ArtifactAbsent(name.to_string()))
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        validate_artifact_name(name)?;
        self.artifacts_tree
            .insert(name.as_bytes(), bytes)
            .map_err(|e| AppError::Storage(format!("Failed to write artifact {}: {}", name, e)))?;
        self.flush().await
    }

    async fn save_group(&self, artifacts: &[(&str, Vec<u8>)]) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (name, bytes) in artifacts {
            validate_artifact_name(name)?;
            batch.insert(name.as_bytes(), bytes.as_slice());
        }

        self.artifacts_tree
            .apply_batch(batch)
            .map_err(|e| AppError::Storage(format!("Failed to write artifact group: {}", e)))?;
        self.flush().await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        validate_artifact_name(name)?;
        self.artifacts_tree
            .remove(name.as_bytes())
            .map_err(|e| AppError::Storage(format!("Failed to remove artifact {}: {}", name, e)))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sled_store_group_and_reopen() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = SledArtifactStore::new(temp_dir.path()).unwrap();
            store
                .save_group(&[("index.bin", vec![9, 9]), ("meta.json", b"[]".to_vec())])
                .await
                .unwrap();
        }

        let store = SledArtifactStore::new(temp_dir.path()).unwrap();
        assert_eq!(store.load("index.bin").await.unwrap(), vec![9, 9]);
        assert_eq!(store.load("meta.json").await.unwrap(), b"[]".to_vec());
    }

    #[tokio::test]
    async fn test_sled_store_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledArtifactStore::new(temp_dir.path()).unwrap();

        store.save("model.bin", b"m").await.unwrap();
        store.remove("model.bin").await.unwrap();

        assert!(!store.exists("model.bin").await.unwrap());
        assert!(matches!(
            store.load("model.bin").await,
            Err(AppError::ArtifactAbsent(_))
        ));
    }
}
