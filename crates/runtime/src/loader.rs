use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::probe::Probe;
use crate::wait::{Outcome, ReadyWait};

/// Loader lifecycle.
///
/// Transitions only `NotStarted -> Polling -> {Ready, Failed}`. Both end
/// phases are terminal for the lifetime of the loader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    NotStarted,
    Polling,
    Ready,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Ready | Phase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("capability did not become available after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("poll loop stopped before the capability settled")]
    Abandoned,
}

/// Point-in-time view of the loader.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct LoadState {
    pub phase: Phase,
    pub attempt_count: u32,
    /// Callers currently waiting on the poll loop.
    pub pending: usize,
    /// Poll loops started over the loader's lifetime (0 or 1).
    pub loops_started: u32,
}

struct Inner {
    phase: Phase,
    attempt_count: u32,
    loops_started: u32,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

struct Shared {
    probe: Arc<dyn Probe>,
    config: LoaderConfig,
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<Phase>,
}

/// Acquires an externally provided capability at most once.
///
/// Any number of callers may ask for readiness concurrently. The first
/// request that finds the capability missing starts a single poll loop;
/// later requests join it as waiters. When the loop ends every waiter
/// receives the same outcome in one batch.
///
/// Cloning is cheap and yields a handle to the same state.
#[derive(Clone)]
pub struct ResourceLoader {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("config", &self.shared.config)
            .field("state", &self.state())
            .finish()
    }
}

impl ResourceLoader {
    pub fn new(probe: Arc<dyn Probe>, config: LoaderConfig) -> Self {
        let (phase_tx, _) = watch::channel(Phase::NotStarted);
        Self {
            shared: Arc::new(Shared {
                probe,
                config,
                inner: Mutex::new(Inner {
                    phase: Phase::NotStarted,
                    attempt_count: 0,
                    loops_started: 0,
                    waiters: Vec::new(),
                }),
                phase_tx,
            }),
        }
    }

    pub fn config(&self) -> LoaderConfig {
        self.shared.config
    }

    pub fn state(&self) -> LoadState {
        let inner = self.shared.inner.lock();
        LoadState {
            phase: inner.phase,
            attempt_count: inner.attempt_count,
            pending: inner.waiters.len(),
            loops_started: inner.loops_started,
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.inner.lock().phase
    }

    /// Phase change notifications.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.shared.phase_tx.subscribe()
    }

    /// Cheap presence check, independent of the loader's own phase.
    pub fn is_available(&self) -> bool {
        self.shared.probe.is_available()
    }

    /// Requests readiness.
    ///
    /// Settles immediately when the capability is already present (even if
    /// this loader never polled for it) or when the loader is in a terminal
    /// phase. A failed loader is never retried.
    ///
    /// # Panics
    ///
    /// Starting the poll loop spawns a task, so the first call that finds
    /// the capability missing must happen inside a Tokio runtime.
    pub fn ensure_ready(&self) -> ReadyWait {
        if self.shared.probe.is_available() {
            return ReadyWait::settled(Ok(()));
        }

        let mut inner = self.shared.inner.lock();
        let phase = inner.phase;
        match phase {
            Phase::Ready => ReadyWait::settled(Ok(())),
            Phase::Failed => ReadyWait::settled(Err(LoadError::Timeout {
                attempts: inner.attempt_count,
            })),
            Phase::Polling => {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push(tx);
                debug!(pending = inner.waiters.len(), "joined running poll loop");
                ReadyWait::pending(rx)
            }
            Phase::NotStarted => {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push(tx);
                inner.phase = Phase::Polling;
                inner.loops_started += 1;
                drop(inner);

                self.shared.phase_tx.send_replace(Phase::Polling);
                debug!(
                    interval_ms = self.shared.config.poll_interval().as_millis() as u64,
                    max_attempts = self.shared.config.max_attempts(),
                    "starting poll loop"
                );
                tokio::spawn(poll_until_settled(self.shared.clone()));
                ReadyWait::pending(rx)
            }
        }
    }
}

async fn poll_until_settled(shared: Arc<Shared>) {
    let interval = shared.config.poll_interval();
    let max_attempts = shared.config.max_attempts();

    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let available = shared.probe.is_available();

        let (phase, attempts, outcome, waiters) = {
            let mut inner = shared.inner.lock();
            inner.attempt_count += 1;
            let attempts = inner.attempt_count;

            if available {
                inner.phase = Phase::Ready;
                (
                    Phase::Ready,
                    attempts,
                    Ok(()),
                    std::mem::take(&mut inner.waiters),
                )
            } else if attempts >= max_attempts {
                inner.phase = Phase::Failed;
                (
                    Phase::Failed,
                    attempts,
                    Err(LoadError::Timeout { attempts }),
                    std::mem::take(&mut inner.waiters),
                )
            } else {
                debug!(attempt = attempts, "capability not available yet");
                continue;
            }
        };

        match &outcome {
            Ok(()) => info!(attempts, waiters = waiters.len(), "capability ready"),
            Err(err) => warn!(waiters = waiters.len(), "capability load failed: {err}"),
        }

        shared.phase_tx.send_replace(phase);
        for waiter in waiters {
            // A waiter whose receiver was dropped has lost interest.
            let _ = waiter.send(outcome.clone());
        }
        return;
    }
}

#[cfg(test)]
mod tests {
    use super::{LoadError, LoadState, Phase, ResourceLoader};
    use crate::config::LoaderConfig;
    use futures_util::FutureExt;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, Instant};

    #[derive(Default)]
    struct Flag {
        available: AtomicBool,
        probes: AtomicU32,
    }

    impl Flag {
        fn set(&self) {
            self.available.store(true, Ordering::SeqCst);
        }

        fn probes(&self) -> u32 {
            self.probes.load(Ordering::SeqCst)
        }
    }

    impl crate::probe::Probe for Flag {
        fn is_available(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.available.load(Ordering::SeqCst)
        }
    }

    fn loader_with(flag: &Arc<Flag>) -> ResourceLoader {
        ResourceLoader::new(flag.clone(), LoaderConfig::default())
    }

    fn set_after(flag: &Arc<Flag>, after: Duration) {
        let flag = flag.clone();
        tokio::spawn(async move {
            sleep(after).await;
            flag.set();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn present_capability_settles_without_polling() {
        let flag = Arc::new(Flag::default());
        flag.set();
        let loader = loader_with(&flag);

        let wait = loader.ensure_ready();
        assert!(wait.is_settled());
        assert_eq!(wait.now_or_never(), Some(Ok(())));
        assert_eq!(
            loader.state(),
            LoadState {
                phase: Phase::NotStarted,
                attempt_count: 0,
                pending: 0,
                loops_started: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_loop() {
        let flag = Arc::new(Flag::default());
        let loader = loader_with(&flag);
        set_after(&flag, Duration::from_millis(250));

        let start = Instant::now();
        let a = loader.ensure_ready();
        sleep(Duration::from_millis(10)).await;
        let b = loader.ensure_ready();
        assert_eq!(loader.state().pending, 2);

        let (ra, rb) = tokio::join!(
            async {
                let r = a.await;
                (r, Instant::now())
            },
            async {
                let r = b.await;
                (r, Instant::now())
            }
        );

        assert_eq!(ra.0, Ok(()));
        assert_eq!(rb.0, Ok(()));
        assert_eq!(ra.1, rb.1);
        assert_eq!(ra.1 - start, Duration::from_millis(300));
        assert_eq!(
            loader.state(),
            LoadState {
                phase: Phase::Ready,
                attempt_count: 3,
                pending: 0,
                loops_started: 1,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn many_waiters_receive_identical_failure() {
        let flag = Arc::new(Flag::default());
        let loader = ResourceLoader::new(
            flag.clone(),
            LoaderConfig::new(Duration::from_millis(10), 4),
        );

        let waits: Vec<_> = (0..10).map(|_| loader.ensure_ready()).collect();
        let results = futures_util::future::join_all(waits).await;

        assert!(results
            .iter()
            .all(|r| *r == Err(LoadError::Timeout { attempts: 4 })));
        assert_eq!(loader.state().loops_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_fifty_attempts() {
        let flag = Arc::new(Flag::default());
        let loader = loader_with(&flag);

        let start = Instant::now();
        let result = loader.ensure_ready().await;

        assert_eq!(result, Err(LoadError::Timeout { attempts: 50 }));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert_eq!(loader.phase(), Phase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_terminal_and_never_polls_again() {
        let flag = Arc::new(Flag::default());
        let loader = ResourceLoader::new(
            flag.clone(),
            LoaderConfig::new(Duration::from_millis(100), 3),
        );

        assert!(loader.ensure_ready().await.is_err());
        let probes = flag.probes();

        sleep(Duration::from_secs(10)).await;
        let again = loader.ensure_ready();
        assert!(again.is_settled());
        assert_eq!(again.await, Err(LoadError::Timeout { attempts: 3 }));

        // Only the synchronous presence check of the second call probed.
        assert_eq!(flag.probes(), probes + 1);
        assert_eq!(loader.state().attempt_count, 3);
        assert_eq!(loader.state().loops_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ready_phase_outlives_capability() {
        let flag = Arc::new(Flag::default());
        let loader = loader_with(&flag);
        set_after(&flag, Duration::from_millis(50));

        assert_eq!(loader.ensure_ready().await, Ok(()));
        flag.available.store(false, Ordering::SeqCst);

        let again = loader.ensure_ready();
        assert!(again.is_settled());
        assert_eq!(again.await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_waiter_does_not_stop_the_loop() {
        let flag = Arc::new(Flag::default());
        let loader = loader_with(&flag);
        set_after(&flag, Duration::from_millis(150));

        drop(loader.ensure_ready());
        let survivor = loader.ensure_ready();
        assert_eq!(survivor.await, Ok(()));
        assert_eq!(loader.state().attempt_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_each_transition() {
        let flag = Arc::new(Flag::default());
        let loader = loader_with(&flag);
        let mut phases = loader.subscribe();
        assert_eq!(*phases.borrow(), Phase::NotStarted);

        set_after(&flag, Duration::from_millis(120));
        let wait = loader.ensure_ready();

        phases.changed().await.unwrap();
        assert_eq!(*phases.borrow_and_update(), Phase::Polling);

        wait.await.unwrap();
        phases.changed().await.unwrap();
        assert_eq!(*phases.borrow_and_update(), Phase::Ready);
        assert!(Phase::Ready.is_terminal());
    }
}
