use crate::config::InitMode;
use crate::error::{AppError, Result};
use crate::lifecycle::phase::{ArtifactOrigin, LifecyclePhase, LifecycleStatus};
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Source of a model artifact: a persisted copy, or a fresh build.
#[async_trait]
pub trait ArtifactModel<T>: Send + Sync {
    /// Load the persisted artifact. `Ok(None)` means nothing is persisted;
    /// any error means the persisted copy is unusable and must be rebuilt.
    async fn load(&self) -> Result<Option<T>>;

    /// Build the artifact from source data and persist it
    async fn build(&self) -> Result<T>;
}

enum Slot<T> {
    Uninitialized,
    Loading,
    Building,
    Ready {
        model: Arc<T>,
        origin: ArtifactOrigin,
        since: DateTime<Utc>,
    },
    Unavailable {
        reason: String,
    },
}

impl<T> Slot<T> {
    fn phase(&self) -> LifecyclePhase {
        match self {
            Slot::Uninitialized => LifecyclePhase::Uninitialized,
            Slot::Loading => LifecyclePhase::Loading,
            Slot::Building => LifecyclePhase::Building,
            Slot::Ready { .. } => LifecyclePhase::Ready,
            Slot::Unavailable { .. } => LifecyclePhase::Unavailable,
        }
    }
}

/// Owns one model artifact and the state machine around producing it.
///
/// Initialization is load-else-build and runs at most once at a time behind
/// an async gate. Queries take the ready artifact through a short read lock
/// and never block on initialization for longer than their own wait budget.
/// A failed initialization parks the model in `Unavailable` until an
/// operator calls [`ModelLifecycle::reset`] or [`ModelLifecycle::rebuild`].
pub struct ModelLifecycle<T> {
    name: String,
    mode: InitMode,
    slot: RwLock<Slot<T>>,
    gate: Mutex<()>,
    phase_tx: watch::Sender<LifecyclePhase>,
}

impl<T> ModelLifecycle<T> {
    pub fn new(name: impl Into<String>, mode: InitMode) -> Self {
        let name = name.into();
        let (phase_tx, _) = watch::channel(LifecyclePhase::Uninitialized);
        metrics::set_lifecycle_phase(&name, LifecyclePhase::Uninitialized);

        Self {
            name,
            mode,
            slot: RwLock::new(Slot::Uninitialized),
            gate: Mutex::new(()),
            phase_tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> InitMode {
        self.mode
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.slot.read().phase()
    }

    /// Watch phase transitions
    pub fn subscribe(&self) -> watch::Receiver<LifecyclePhase> {
        self.phase_tx.subscribe()
    }

    /// The ready artifact, if any
    pub fn current(&self) -> Option<Arc<T>> {
        match &*self.slot.read() {
            Slot::Ready { model, .. } => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub fn status(&self) -> LifecycleStatus {
        let slot = self.slot.read();
        let (origin, ready_since, failure) = match &*slot {
            Slot::Ready { origin, since, .. } => (Some(*origin), Some(*since), None),
            Slot::Unavailable { reason } => (None, None, Some(reason.clone())),
            _ => (None, None, None),
        };

        LifecycleStatus {
            model: self.name.clone(),
            phase: slot.phase(),
            origin,
            ready_since,
            failure,
        }
    }

    fn transition(&self, next: Slot<T>) {
        let phase = next.phase();
        *self.slot.write() = next;
        self.phase_tx.send_replace(phase);
        metrics::set_lifecycle_phase(&self.name, phase);
        debug!(model = %self.name, phase = %phase, "Lifecycle transition");
    }

    fn settled(&self) -> Option<Result<Arc<T>>> {
        match &*self.slot.read() {
            Slot::Ready { model, .. } => Some(Ok(Arc::clone(model))),
            Slot::Unavailable { reason } => Some(Err(self.unavailable_error(reason))),
            _ => None,
        }
    }

    fn unavailable_error(&self, reason: &str) -> AppError {
        AppError::ServiceUnavailable(format!("{} is unavailable: {}", self.name, reason))
    }

    fn initializing_error(&self) -> AppError {
        AppError::ServiceUnavailable(format!("{} is initializing", self.name))
    }
}

impl<T: Send + Sync + 'static> ModelLifecycle<T> {
    /// Run load-else-build once. Concurrent callers queue on the gate and
    /// observe the first caller's result.
    pub async fn initialize(&self, source: &dyn ArtifactModel<T>) -> Result<Arc<T>> {
        let gate = self.gate.lock().await;
        self.initialize_locked(gate, source).await
    }

    async fn initialize_locked(
        &self,
        _gate: MutexGuard<'_, ()>,
        source: &dyn ArtifactModel<T>,
    ) -> Result<Arc<T>> {
        if let Some(settled) = self.settled() {
            return settled;
        }

        let started = Instant::now();
        let mut guard = ResetOnDrop {
            lifecycle: self,
            armed: true,
        };

        self.transition(Slot::Loading);
        let loaded = match source.load().await {
            Ok(Some(model)) => Some(model),
            Ok(None) => {
                info!(model = %self.name, "No persisted artifact found");
                None
            }
            Err(e) => {
                warn!(model = %self.name, error = %e, "Persisted artifact unusable, rebuilding");
                None
            }
        };

        let (model, origin) = match loaded {
            Some(model) => (Arc::new(model), ArtifactOrigin::Loaded),
            None => {
                self.transition(Slot::Building);
                info!(model = %self.name, "🔨 Building artifact");
                match source.build().await {
                    Ok(model) => (Arc::new(model), ArtifactOrigin::Built),
                    Err(e) => {
                        guard.armed = false;
                        return Err(self.fail(e));
                    }
                }
            }
        };

        guard.armed = false;
        self.publish(Arc::clone(&model), origin, started);
        Ok(model)
    }

    /// Get the ready artifact.
    ///
    /// Unavailable fails immediately. In lazy mode the first query on an
    /// uninitialized model runs initialization itself; every other caller
    /// waits at most `wait` for a settled phase.
    pub async fn acquire(&self, source: &dyn ArtifactModel<T>, wait: Duration) -> Result<Arc<T>> {
        if let Some(settled) = self.settled() {
            return settled;
        }

        if self.mode == InitMode::Lazy && self.phase() == LifecyclePhase::Uninitialized {
            if let Ok(gate) = self.gate.try_lock() {
                debug!(model = %self.name, "Lazy initialization triggered by query");
                return self.initialize_locked(gate, source).await;
            }
        }

        self.wait_settled(wait).await
    }

    /// Wait up to `wait` for the model to become Ready or Unavailable
    pub async fn wait_settled(&self, wait: Duration) -> Result<Arc<T>> {
        let mut rx = self.phase_tx.subscribe();
        let outcome = tokio::time::timeout(wait, async move {
            rx.wait_for(|phase| phase.is_settled()).await.map(|_| ())
        })
        .await;

        match outcome {
            Ok(Ok(())) => self
                .settled()
                .unwrap_or_else(|| Err(self.initializing_error())),
            Ok(Err(_)) => Err(AppError::Internal(format!(
                "{} phase channel closed",
                self.name
            ))),
            Err(_) => Err(self.initializing_error()),
        }
    }

    /// Build a replacement artifact and swap it in.
    ///
    /// The current artifact keeps serving until the swap. If the build fails
    /// the current artifact stays; with nothing serving the model becomes
    /// Unavailable.
    pub async fn rebuild(&self, source: &dyn ArtifactModel<T>) -> Result<Arc<T>> {
        let _gate = self.gate.lock().await;
        let started = Instant::now();
        let serving = self.current();

        let mut guard = ResetOnDrop {
            lifecycle: self,
            armed: serving.is_none(),
        };
        if serving.is_none() {
            self.transition(Slot::Building);
        }

        info!(model = %self.name, serving = serving.is_some(), "🔨 Rebuilding artifact");

        match source.build().await {
            Ok(model) => {
                guard.armed = false;
                let model = Arc::new(model);
                self.publish(Arc::clone(&model), ArtifactOrigin::Built, started);
                Ok(model)
            }
            Err(e) if serving.is_some() => {
                guard.armed = false;
                warn!(model = %self.name, error = %e, "Rebuild failed, keeping current artifact");
                metrics::MODEL_INIT_FAILURES_TOTAL
                    .with_label_values(&[self.name.as_str()])
                    .inc();
                Err(e)
            }
            Err(e) => {
                guard.armed = false;
                Err(self.fail(e))
            }
        }
    }

    /// Clear an Unavailable model so the next initialization retries.
    /// Returns whether anything was reset.
    pub async fn reset(&self) -> bool {
        let _gate = self.gate.lock().await;
        let unavailable = matches!(*self.slot.read(), Slot::Unavailable { .. });
        if unavailable {
            self.transition(Slot::Uninitialized);
            info!(model = %self.name, "Model reset to uninitialized");
        }
        unavailable
    }

    fn publish(&self, model: Arc<T>, origin: ArtifactOrigin, started: Instant) {
        let elapsed = started.elapsed();
        metrics::MODEL_INIT_DURATION_SECONDS
            .with_label_values(&[self.name.as_str(), origin.to_string().as_str()])
            .observe(elapsed.as_secs_f64());

        self.transition(Slot::Ready {
            model,
            origin,
            since: Utc::now(),
        });

        info!(
            model = %self.name,
            origin = %origin,
            elapsed_ms = elapsed.as_millis() as u64,
            "✅ Model ready"
        );
    }

    fn fail(&self, cause: AppError) -> AppError {
        let reason = cause.to_string();
        error!(model = %self.name, error = %reason, "❌ Model initialization failed");
        metrics::MODEL_INIT_FAILURES_TOTAL
            .with_label_values(&[self.name.as_str()])
            .inc();

        self.transition(Slot::Unavailable {
            reason: reason.clone(),
        });
        self.unavailable_error(&reason)
    }
}

/// Puts the slot back to Uninitialized if an initialization future is
/// dropped mid-flight, so waiters are not left watching a dead Loading phase.
struct ResetOnDrop<'a, T> {
    lifecycle: &'a ModelLifecycle<T>,
    armed: bool,
}

impl<T> Drop for ResetOnDrop<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            warn!(model = %self.lifecycle.name, "Initialization abandoned");
            self.lifecycle.transition(Slot::Uninitialized);
        }
    }
}
