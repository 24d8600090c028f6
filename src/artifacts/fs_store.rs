use crate::artifacts::store::{validate_artifact_name, ArtifactStore};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Artifact store backed by one file per artifact in a directory.
///
/// Every write goes to a temp file in the same directory, is synced, and is
/// then renamed over the target, so readers see either the old or the new
/// artifact and never a prefix of one.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| {
            AppError::Storage(format!("Failed to create artifact directory {:?}: {}", root, e))
        })?;

        tracing::info!("Initialized filesystem artifact store at {:?}", root);

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_artifact_name(name)?;
        Ok(self.root.join(name))
    }

    /// Publish a set of artifacts off the async runtime; each member lands
    /// atomically
    async fn write_group(&self, artifacts: Vec<(PathBuf, String, Vec<u8>)>) -> Result<()> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            for (target, name, bytes) in &artifacts {
                write_atomic(&root, target, name, bytes)?;
            }
            Ok::<_, AppError>(())
        })
        .await
        .map_err(|e| AppError::Internal(format!("Artifact write task failed: {}", e)))?
    }
}

fn write_atomic(root: &Path, target: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(root)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| {
        AppError::Storage(format!("Failed to publish artifact {}: {}", name, e.error))
    })?;

    tracing::debug!(artifact = name, bytes = bytes.len(), "Artifact written");
    Ok(())
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        match tokio::fs::metadata(self.path_for(name)?).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to stat artifact {}: {}",
                name, e
            ))),
        }
    }

    async fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::ArtifactAbsent(name.to_string()))
            }
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read artifact {}: {}",
                name, e
            ))),
        }
    }

    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let target = self.path_for(name)?;
        self.write_group(vec![(target, name.to_string(), bytes.to_vec())])
            .await
    }

    async fn save_group(&self, artifacts: &[(&str, Vec<u8>)]) -> Result<()> {
        let mut group = Vec::with_capacity(artifacts.len());
        for (name, bytes) in artifacts {
            group.push((self.path_for(name)?, name.to_string(), bytes.clone()));
        }
        // Each member is published atomically; a crash between members leaves
        // a mixed generation that readers detect by build id.
        self.write_group(group).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to remove artifact {}: {}",
                name, e
            ))),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        store.save("index.bin", &[1, 2, 3]).await.unwrap();

        let reopened = FsArtifactStore::new(dir.path()).unwrap();
        assert_eq!(reopened.load("index.bin").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        store.save("index.bin", b"first").await.unwrap();
        store.save("index.bin", b"second").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["index.bin".to_string()]);
        assert_eq!(store.load("index.bin").await.unwrap(), b"second".to_vec());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        assert!(!store.exists("nothing.bin").await.unwrap());
        assert!(matches!(
            store.load("nothing.bin").await,
            Err(AppError::ArtifactAbsent(_))
        ));
        assert!(store.remove("nothing.bin").await.is_ok());
    }

    #[tokio::test]
    async fn test_group_write() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        store
            .save_group(&[("a.bin", vec![1]), ("b.json", vec![2])])
            .await
            .unwrap();

        assert!(store.exists("a.bin").await.unwrap());
        assert!(store.exists("b.json").await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_saves_on_single_thread_runtime() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        let writes = (0..8u8).map(|i| {
            let store = store.clone();
            async move { store.save(&format!("part{}.bin", i), &[i; 64]).await }
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap();
        }

        for i in 0..8u8 {
            assert_eq!(store.load(&format!("part{}.bin", i)).await.unwrap(), vec![i; 64]);
        }
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        assert!(store.save("../escape.bin", b"x").await.is_err());
    }
}
