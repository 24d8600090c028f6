use tickit_inference::{
    artifacts::{
        create_artifact_store, ArtifactStore, FsArtifactStore, InMemoryArtifactStore,
        SledArtifactStore,
    },
    config::{ArtifactBackend, ArtifactStoreConfig},
    AppError,
};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

/// Test suite that runs against any ArtifactStore implementation
async fn test_store_operations(store: Arc<dyn ArtifactStore>) {
    // Absent artifacts
    assert!(!store.exists("model.bin").await.unwrap());
    assert!(matches!(
        store.load("model.bin").await,
        Err(AppError::ArtifactAbsent(_))
    ));
    assert_eq!(store.load_optional("model.bin").await.unwrap(), None);

    // Save and load
    assert_ok!(store.save("model.bin", b"first").await);
    assert!(store.exists("model.bin").await.unwrap());
    assert_eq!(store.load("model.bin").await.unwrap(), b"first".to_vec());

    // Overwrite
    store.save("model.bin", b"second").await.unwrap();
    assert_eq!(store.load("model.bin").await.unwrap(), b"second".to_vec());

    // Group save writes every member
    store
        .save_group(&[
            ("index.bin", vec![1, 2, 3]),
            ("metadata.json", b"{}".to_vec()),
        ])
        .await
        .unwrap();
    assert_eq!(store.load("index.bin").await.unwrap(), vec![1, 2, 3]);
    assert_eq!(store.load("metadata.json").await.unwrap(), b"{}".to_vec());

    // Remove
    assert_ok!(store.remove("model.bin").await);
    assert!(!store.exists("model.bin").await.unwrap());

    // Names that could escape the store are rejected by every operation
    assert_err!(store.save("../escape.bin", b"x").await);
    assert_err!(store.save("", b"x").await);
    assert_err!(store.exists("../escape.bin").await);
    assert_err!(store.load("../escape.bin").await);
    assert_err!(store.remove("../escape.bin").await);
    assert!(matches!(
        store.load("a/b.bin").await,
        Err(AppError::Storage(_))
    ));
}

#[tokio::test]
async fn test_in_memory_store() {
    test_store_operations(Arc::new(InMemoryArtifactStore::new())).await;
}

#[tokio::test]
async fn test_filesystem_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FsArtifactStore::new(dir.path()).unwrap());
    test_store_operations(store).await;

    // Only the artifacts themselves remain on disk
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["index.bin", "metadata.json"]);
}

#[tokio::test]
async fn test_sled_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SledArtifactStore::new(dir.path().join("artifacts.db")).unwrap());
    test_store_operations(store).await;
}

#[tokio::test]
async fn test_filesystem_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = FsArtifactStore::new(dir.path()).unwrap();
        store.save("model.bin", b"persisted").await.unwrap();
    }

    let reopened = FsArtifactStore::new(dir.path()).unwrap();
    assert_eq!(reopened.load("model.bin").await.unwrap(), b"persisted".to_vec());
}

#[tokio::test]
async fn test_factory_builds_configured_backend() {
    let dir = TempDir::new().unwrap();

    let fs_store = create_artifact_store(&ArtifactStoreConfig {
        backend: ArtifactBackend::Filesystem,
        path: Some(dir.path().join("fs")),
    })
    .unwrap();
    assert_eq!(fs_store.backend_name(), "filesystem");

    let sled_store = create_artifact_store(&ArtifactStoreConfig {
        backend: ArtifactBackend::Sled,
        path: Some(dir.path().join("sled")),
    })
    .unwrap();
    assert_eq!(sled_store.backend_name(), "sled");

    let memory = create_artifact_store(&ArtifactStoreConfig {
        backend: ArtifactBackend::Memory,
        path: None,
    })
    .unwrap();
    assert_eq!(memory.backend_name(), "memory");
}
