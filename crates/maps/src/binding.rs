use std::sync::Arc;

use parking_lot::Mutex;
use runtime::{LoadError, ReadyWait, ResourceLoader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::BindingConfig;
use crate::ops::{GeoError, GeoOps};
use crate::provider::{MountTarget, Surface, SurfaceOptions};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("mount target did not become valid within {waited_ms} ms")]
    MountTimeout { waited_ms: u64 },
    #[error(transparent)]
    Surface(#[from] GeoError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    Idle,
    AwaitingCapability,
    AwaitingMount,
    Ready,
    Failed(BindingError),
    /// The attachment point was removed.
    Detached,
}

impl BindingState {
    /// No further transitions will happen.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            BindingState::Ready | BindingState::Failed(_) | BindingState::Detached
        )
    }
}

struct Slot {
    live: bool,
    surface: Option<Surface>,
}

struct Shared {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<BindingState>,
    mount_tx: watch::Sender<Option<MountTarget>>,
}

impl Shared {
    /// Applies `f` only while the binding is live. Teardown takes the same
    /// lock, so nothing can land after it.
    fn update(&self, f: impl FnOnce(&mut Slot) -> BindingState) -> bool {
        let mut slot = self.slot.lock();
        if !slot.live {
            return false;
        }
        let state = f(&mut slot);
        debug!(?state, "binding transition");
        self.state_tx.send_replace(state);
        true
    }

    fn set_state(&self, state: BindingState) -> bool {
        self.update(|_| state)
    }
}

/// Binds one UI attachment point to one map surface.
///
/// The binding asks the loader for readiness, waits for its mount target,
/// lets layout settle and then creates exactly one surface. Removing the
/// attachment point ([`MapBinding::teardown`] or drop) cancels whatever is
/// pending for this binding only; the shared poll loop keeps running for
/// everybody else.
pub struct MapBinding {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Default for MapBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MapBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapBinding")
            .field("state", &self.state())
            .field("live", &self.is_live())
            .finish()
    }
}

impl MapBinding {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(BindingState::Idle);
        let (mount_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    live: true,
                    surface: None,
                }),
                state_tx,
                mount_tx,
            }),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.shared.slot.lock().live
    }

    pub fn state(&self) -> BindingState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<BindingState> {
        self.shared.state_tx.subscribe()
    }

    /// The surface, once the binding is [`BindingState::Ready`].
    pub fn surface(&self) -> Option<Surface> {
        self.shared.slot.lock().surface.clone()
    }

    /// Reports that the display region has been laid out and can host a
    /// surface. Ignored after teardown.
    pub fn set_mount_target(&self, target: MountTarget) {
        if self.is_live() {
            self.shared.mount_tx.send_replace(Some(target));
        }
    }

    /// Starts binding. Returns `false` unless the binding is live and idle.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn activate(
        &mut self,
        loader: &ResourceLoader,
        ops: GeoOps,
        options: SurfaceOptions,
        config: BindingConfig,
    ) -> bool {
        if self.task.is_some() || self.state() != BindingState::Idle {
            return false;
        }
        let wait = loader.ensure_ready();
        if !self.shared.set_state(BindingState::AwaitingCapability) {
            return false;
        }

        self.task = Some(tokio::spawn(bind(
            self.shared.clone(),
            self.cancel.clone(),
            wait,
            ops,
            options,
            config,
        )));
        true
    }

    /// Waits until the binding reaches a settled state.
    ///
    /// Never resolves for a binding that is never activated nor torn down.
    pub async fn settled(&self) -> BindingState {
        let mut rx = self.shared.state_tx.subscribe();
        match rx.wait_for(BindingState::is_settled).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Detaches from the UI: stops pending timers, discards any late
    /// results and releases the surface.
    pub fn teardown(&mut self) {
        {
            let mut slot = self.shared.slot.lock();
            if !slot.live {
                return;
            }
            slot.live = false;
            slot.surface = None;
            self.shared.state_tx.send_replace(BindingState::Detached);
        }
        self.cancel.cancel();
        self.task = None;
        debug!("binding detached");
    }
}

impl Drop for MapBinding {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn bind(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    wait: ReadyWait,
    ops: GeoOps,
    options: SurfaceOptions,
    config: BindingConfig,
) {
    let outcome = tokio::select! {
        _ = cancel.cancelled() => return,
        outcome = wait => outcome,
    };
    if let Err(err) = outcome {
        shared.set_state(BindingState::Failed(err.into()));
        return;
    }

    let mut mount_rx = shared.mount_tx.subscribe();
    let current = mount_rx.borrow_and_update().clone();
    let target = match current {
        Some(target) => target,
        None => {
            if !shared.set_state(BindingState::AwaitingMount) {
                return;
            }
            let arrived = async {
                mount_rx
                    .wait_for(Option::is_some)
                    .await
                    .map(|target| target.clone())
            };
            let waited = tokio::select! {
                _ = cancel.cancelled() => return,
                waited = time::timeout(config.mount_timeout(), arrived) => waited,
            };
            match waited {
                Ok(Ok(Some(target))) => target,
                Ok(_) => return,
                Err(_) => {
                    shared.set_state(BindingState::Failed(BindingError::MountTimeout {
                        waited_ms: config.mount_timeout_ms,
                    }));
                    return;
                }
            }
        }
    };

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = time::sleep(config.settle_delay()) => {}
    }

    shared.update(|slot| match ops.create_surface(&target, &options) {
        Ok(surface) => {
            slot.surface = Some(surface);
            BindingState::Ready
        }
        Err(err) => BindingState::Failed(err.into()),
    });
}
