//! Lifecycle behaviour seen through the public API

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tickit_inference::{
    config::InitMode,
    lifecycle::{ArtifactModel, ArtifactOrigin, LifecyclePhase, ModelLifecycle},
    AppError, Result,
};

/// Source whose build is slow and counted
struct SlowSource {
    persisted: Option<u32>,
    builds: AtomicUsize,
    fail_build: bool,
    delay: Duration,
}

impl SlowSource {
    fn new(persisted: Option<u32>) -> Self {
        Self {
            persisted,
            builds: AtomicUsize::new(0),
            fail_build: false,
            delay: Duration::from_millis(50),
        }
    }

    fn failing() -> Self {
        Self {
            fail_build: true,
            ..Self::new(None)
        }
    }

    fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactModel<u32> for SlowSource {
    async fn load(&self) -> Result<Option<u32>> {
        Ok(self.persisted)
    }

    async fn build(&self) -> Result<u32> {
        let n = self.builds.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if self.fail_build {
            return Err(AppError::Training("no data".to_string()));
        }
        Ok(100 + n as u32)
    }
}

#[tokio::test]
async fn test_concurrent_lazy_queries_build_once() {
    let lifecycle = Arc::new(ModelLifecycle::<u32>::new("concurrent", InitMode::Lazy));
    let source = Arc::new(SlowSource::new(None));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let lifecycle = Arc::clone(&lifecycle);
            let source = Arc::clone(&source);
            tokio::spawn(async move {
                lifecycle
                    .acquire(source.as_ref(), Duration::from_secs(5))
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        assert_eq!(*result.unwrap().unwrap(), 101);
    }
    assert_eq!(source.builds(), 1);
    assert_eq!(lifecycle.status().origin, Some(ArtifactOrigin::Built));
}

#[tokio::test]
async fn test_persisted_artifact_is_loaded_not_built() {
    let lifecycle = ModelLifecycle::<u32>::new("persisted", InitMode::Eager);
    let source = SlowSource::new(Some(7));

    assert_eq!(*lifecycle.initialize(&source).await.unwrap(), 7);
    assert_eq!(source.builds(), 0);
    assert_eq!(lifecycle.status().origin, Some(ArtifactOrigin::Loaded));
}

#[tokio::test]
async fn test_query_during_eager_build_reports_initializing() {
    let lifecycle = Arc::new(ModelLifecycle::<u32>::new("eager", InitMode::Eager));
    let source = Arc::new(SlowSource {
        delay: Duration::from_millis(300),
        ..SlowSource::new(None)
    });

    let init = {
        let lifecycle = Arc::clone(&lifecycle);
        let source = Arc::clone(&source);
        tokio::spawn(async move { lifecycle.initialize(source.as_ref()).await })
    };

    let mut phases = lifecycle.subscribe();
    phases
        .wait_for(|phase| *phase == LifecyclePhase::Building)
        .await
        .unwrap();

    let err = lifecycle
        .acquire(source.as_ref(), Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ServiceUnavailable(ref m) if m.contains("initializing")));

    init.await.unwrap().unwrap();
    assert_eq!(
        *lifecycle
            .acquire(source.as_ref(), Duration::from_millis(10))
            .await
            .unwrap(),
        101
    );
}

#[tokio::test]
async fn test_failure_is_sticky_and_isolated() {
    let broken = ModelLifecycle::<u32>::new("broken", InitMode::Lazy);
    let healthy = ModelLifecycle::<u32>::new("healthy", InitMode::Lazy);
    let failing = SlowSource::failing();
    let working = SlowSource::new(None);

    assert!(broken.initialize(&failing).await.is_err());
    assert!(healthy.initialize(&working).await.is_ok());

    // No automatic retry
    let err = broken
        .acquire(&failing, Duration::from_millis(10))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ServiceUnavailable(_)));
    assert_eq!(failing.builds(), 1);
    assert!(broken.status().failure.unwrap().contains("no data"));

    assert_eq!(healthy.phase(), LifecyclePhase::Ready);
}

#[tokio::test]
async fn test_reset_allows_retry() {
    let lifecycle = ModelLifecycle::<u32>::new("retry", InitMode::Lazy);
    assert!(lifecycle.initialize(&SlowSource::failing()).await.is_err());

    assert!(lifecycle.reset().await);
    assert_eq!(lifecycle.phase(), LifecyclePhase::Uninitialized);

    let model = lifecycle
        .acquire(&SlowSource::new(None), Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(*model, 101);
    assert!(!lifecycle.reset().await);
}

#[tokio::test]
async fn test_rebuild_swaps_without_disturbing_readers() {
    let lifecycle = ModelLifecycle::<u32>::new("swap", InitMode::Lazy);
    let source = SlowSource::new(None);

    let before = lifecycle.initialize(&source).await.unwrap();
    let after = lifecycle.rebuild(&source).await.unwrap();

    assert_eq!(*before, 101);
    assert_eq!(*after, 102);
    assert_eq!(*lifecycle.current().unwrap(), 102);

    // A failed rebuild keeps serving the current artifact
    assert!(lifecycle.rebuild(&SlowSource::failing()).await.is_err());
    assert_eq!(*lifecycle.current().unwrap(), 102);
    assert_eq!(lifecycle.phase(), LifecyclePhase::Ready);
}
