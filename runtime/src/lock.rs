//! Lifecycle lock for a store module.
//!
//! A store module is initialized when a view that needs it mounts and
//! uninitialized when the view goes away. Views mount and unmount quickly and
//! concurrently, so the two transitions have to be serialized and
//! de-duplicated. The lock is a small state machine:
//!
//! ```text
//!          initialize                 success
//!   Idle ─────────────> Initializing ─────────> Ready
//!    ^                      │ failure             │
//!    │<─────────────────────┘                     │ uninitialize
//!    │          success                           v
//!    └────────────────────────────────────── Uninitializing
//!                  (failure returns to Ready)
//! ```
//!
//! - A caller arriving while the same transition is in flight awaits that
//!   transition's outcome instead of starting a second one.
//! - A caller arriving while the opposite transition is in flight waits for
//!   it to settle, then re-evaluates.
//! - If the task driving a transition is dropped, the lock reverts to the
//!   phase it started from and waiters observe [`StateError::Cancelled`].

use crate::StateError;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// A lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// `Idle → Ready`
    Initialize,
    /// `Ready → Idle`
    Uninitialize,
}

impl Transition {
    const fn origin(self) -> Phase {
        match self {
            Self::Initialize => Phase::Idle,
            Self::Uninitialize => Phase::Ready,
        }
    }

    const fn target(self) -> Phase {
        match self {
            Self::Initialize => Phase::Ready,
            Self::Uninitialize => Phase::Idle,
        }
    }

    const fn in_flight(self) -> Phase {
        match self {
            Self::Initialize => Phase::Initializing,
            Self::Uninitialize => Phase::Uninitializing,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize => write!(f, "initialize"),
            Self::Uninitialize => write!(f, "uninitialize"),
        }
    }
}

/// Observable phase of a lifecycle lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not initialized, nothing in flight
    Idle,
    /// An initialize is running
    Initializing,
    /// Initialized, nothing in flight
    Ready,
    /// An uninitialize is running
    Uninitializing,
}

type Outcome = Option<Result<(), StateError>>;

enum Slot {
    Settled(Phase),
    InFlight {
        transition: Transition,
        settled: watch::Receiver<Outcome>,
    },
}

enum Claim<'a> {
    /// Already in the requested phase
    Done,
    /// The same transition is in flight: share its outcome
    Join(watch::Receiver<Outcome>),
    /// The opposite transition is in flight: wait, then try again
    AwaitOpposite(watch::Receiver<Outcome>),
    /// This caller drives the transition
    Run(SettleGuard<'a>),
}

/// Serializing gate for initialize/uninitialize transitions.
///
/// This is the only place that decides whether a module's subscriptions and
/// fetches are live; everything else trusts [`LifecycleLock::is_initialized`].
///
/// # Example
///
/// ```
/// use explorer_state_runtime::{LifecycleLock, Phase, StateError};
///
/// # tokio_test::block_on(async {
/// let lock = LifecycleLock::new("block");
///
/// lock.initialize(|| async { Ok(()) }).await.unwrap();
/// assert_eq!(lock.phase(), Phase::Ready);
///
/// // Already initialized: the routine is not run again
/// let second = lock
///     .initialize(|| async { Err(StateError::Config("not run".to_string())) })
///     .await;
/// assert!(second.is_ok());
///
/// lock.uninitialize(|| async { Ok(()) }).await.unwrap();
/// assert!(!lock.is_initialized());
/// # });
/// ```
pub struct LifecycleLock {
    name: &'static str,
    slot: Mutex<Slot>,
    phase: watch::Sender<Phase>,
}

impl LifecycleLock {
    /// Create an idle lock for the named module.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            name,
            slot: Mutex::new(Slot::Settled(Phase::Idle)),
            phase,
        }
    }

    /// Name of the module this lock guards.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Whether the module is initialized and no transition is in flight.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// Observe phase changes.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run `do_init` unless the module is already initialized.
    ///
    /// Concurrent callers share one execution of the routine and all observe
    /// its outcome. A pending uninitialize is allowed to settle first.
    ///
    /// # Errors
    ///
    /// Returns the routine's error (to every coalesced caller), or
    /// [`StateError::Cancelled`] if the driving task was dropped.
    pub async fn initialize<F, Fut>(&self, do_init: F) -> Result<(), StateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StateError>>,
    {
        self.transition(Transition::Initialize, do_init).await
    }

    /// Run `do_uninit` if the module is initialized.
    ///
    /// A no-op when the module was never initialized. Concurrent callers
    /// share one execution. A pending initialize is allowed to settle first.
    ///
    /// # Errors
    ///
    /// Returns the routine's error (the module then stays initialized), or
    /// [`StateError::Cancelled`] if the driving task was dropped.
    pub async fn uninitialize<F, Fut>(&self, do_uninit: F) -> Result<(), StateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StateError>>,
    {
        self.transition(Transition::Uninitialize, do_uninit).await
    }

    #[tracing::instrument(skip(self, routine), fields(module = self.name))]
    async fn transition<F, Fut>(&self, transition: Transition, routine: F) -> Result<(), StateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), StateError>>,
    {
        let guard = loop {
            match self.claim(transition) {
                Claim::Done => {
                    tracing::trace!("Already settled, nothing to do");
                    return Ok(());
                },
                Claim::Join(settled) => {
                    tracing::debug!("Joining in-flight transition");
                    return wait_settled(settled, transition).await;
                },
                Claim::AwaitOpposite(settled) => {
                    tracing::debug!("Waiting for opposite transition to settle");
                    // Its outcome belongs to its own callers; only the resulting phase matters here
                    let _ = wait_settled(settled, transition).await;
                },
                Claim::Run(guard) => break guard,
            }
        };

        tracing::info!("Transition started");
        metrics::counter!(
            crate::metrics::LIFECYCLE_TRANSITIONS_TOTAL,
            "module" => self.name,
            "transition" => transition_label(transition)
        )
        .increment(1);

        let result = routine().await;
        match &result {
            Ok(()) => tracing::info!("Transition completed"),
            Err(error) => tracing::warn!(%error, "Transition failed"),
        }

        guard.settle(result.clone());
        result
    }

    fn claim(&self, transition: Transition) -> Claim<'_> {
        let mut slot = self.lock_slot();

        match &*slot {
            Slot::InFlight {
                transition: running,
                settled,
            } => {
                return if *running == transition {
                    Claim::Join(settled.clone())
                } else {
                    Claim::AwaitOpposite(settled.clone())
                };
            },
            Slot::Settled(phase) if *phase == transition.target() => return Claim::Done,
            Slot::Settled(_) => {},
        }

        let (tx, rx) = watch::channel(None);
        *slot = Slot::InFlight {
            transition,
            settled: rx,
        };
        self.phase.send_replace(transition.in_flight());

        Claim::Run(SettleGuard {
            lock: self,
            transition,
            outcome: tx,
            settled: false,
        })
    }

    fn finish(&self, phase: Phase) {
        *self.lock_slot() = Slot::Settled(phase);
        self.phase.send_replace(phase);
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        // The slot is only touched in short synchronous sections that cannot
        // leave it half-written, so a poisoned guard is still consistent.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for LifecycleLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleLock")
            .field("name", &self.name)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Publishes a transition's outcome exactly once, also when dropped early.
struct SettleGuard<'a> {
    lock: &'a LifecycleLock,
    transition: Transition,
    outcome: watch::Sender<Outcome>,
    settled: bool,
}

impl SettleGuard<'_> {
    fn settle(mut self, result: Result<(), StateError>) {
        let phase = if result.is_ok() {
            self.transition.target()
        } else {
            self.transition.origin()
        };
        self.publish(phase, result);
    }

    fn publish(&mut self, phase: Phase, result: Result<(), StateError>) {
        self.settled = true;
        self.lock.finish(phase);
        self.outcome.send_replace(Some(result));
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!(
                module = self.lock.name,
                transition = %self.transition,
                "Transition dropped before settling, reverting"
            );
            let transition = self.transition;
            self.publish(
                transition.origin(),
                Err(StateError::Cancelled { transition }),
            );
        }
    }
}

async fn wait_settled(
    mut settled: watch::Receiver<Outcome>,
    transition: Transition,
) -> Result<(), StateError> {
    loop {
        if let Some(outcome) = settled.borrow_and_update().clone() {
            return outcome;
        }
        if settled.changed().await.is_err() {
            return settled
                .borrow()
                .clone()
                .unwrap_or(Err(StateError::Cancelled { transition }));
        }
    }
}

const fn transition_label(transition: Transition) -> &'static str {
    match transition {
        Transition::Initialize => "initialize",
        Transition::Uninitialize => "uninitialize",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn uninitialize_when_never_initialized_is_noop() {
        let lock = LifecycleLock::new("test");
        let runs = AtomicUsize::new(0);

        lock.uninitialize(|| async {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(lock.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn concurrent_initialize_runs_routine_once() {
        let lock = Arc::new(LifecycleLock::new("test"));
        let runs = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let first = {
            let (lock, runs, release) = (Arc::clone(&lock), Arc::clone(&runs), Arc::clone(&release));
            tokio::spawn(async move {
                lock.initialize(|| async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                    Ok(())
                })
                .await
            })
        };

        // Let the first caller claim the transition
        while lock.phase() != Phase::Initializing {
            tokio::task::yield_now().await;
        }

        let second = {
            let (lock, runs) = (Arc::clone(&lock), Arc::clone(&runs));
            tokio::spawn(async move {
                lock.initialize(|| async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        release.notify_one();

        assert_eq!(first.await.unwrap(), Ok(()));
        assert_eq!(second.await.unwrap(), Ok(()));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(lock.is_initialized());
    }

    #[tokio::test]
    async fn coalesced_callers_share_failure() {
        let lock = Arc::new(LifecycleLock::new("test"));
        let release = Arc::new(Notify::new());

        let first = {
            let (lock, release) = (Arc::clone(&lock), Arc::clone(&release));
            tokio::spawn(async move {
                lock.initialize(|| async {
                    release.notified().await;
                    Err(StateError::Config("boom".to_string()))
                })
                .await
            })
        };

        while lock.phase() != Phase::Initializing {
            tokio::task::yield_now().await;
        }

        let second = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move { lock.initialize(|| async { Ok(()) }).await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        release.notify_one();

        let expected = Err(StateError::Config("boom".to_string()));
        assert_eq!(first.await.unwrap(), expected);
        assert_eq!(second.await.unwrap(), expected);
        assert_eq!(lock.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn initialize_waits_for_pending_uninitialize() {
        let lock = Arc::new(LifecycleLock::new("test"));
        lock.initialize(|| async { Ok(()) }).await.unwrap();

        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let release = Arc::new(Notify::new());

        let uninit = {
            let (lock, order, release) =
                (Arc::clone(&lock), Arc::clone(&order), Arc::clone(&release));
            tokio::spawn(async move {
                lock.uninitialize(|| async {
                    order.lock().unwrap().push("uninit-start");
                    release.notified().await;
                    order.lock().unwrap().push("uninit-end");
                    Ok(())
                })
                .await
            })
        };

        while lock.phase() != Phase::Uninitializing {
            tokio::task::yield_now().await;
        }

        let init = {
            let (lock, order) = (Arc::clone(&lock), Arc::clone(&order));
            tokio::spawn(async move {
                lock.initialize(|| async {
                    order.lock().unwrap().push("init");
                    Ok(())
                })
                .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*order.lock().unwrap(), vec!["uninit-start"]);

        release.notify_one();
        uninit.await.unwrap().unwrap();
        init.await.unwrap().unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["uninit-start", "uninit-end", "init"]
        );
        assert!(lock.is_initialized());
    }

    #[tokio::test]
    async fn dropped_transition_reverts_and_cancels_waiters() {
        let lock = Arc::new(LifecycleLock::new("test"));

        let driver = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move {
                lock.initialize(|| std::future::pending::<Result<(), StateError>>())
                    .await
            })
        };

        while lock.phase() != Phase::Initializing {
            tokio::task::yield_now().await;
        }

        let waiter = {
            let lock = Arc::clone(&lock);
            tokio::spawn(async move { lock.initialize(|| async { Ok(()) }).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        driver.abort();
        let _ = driver.await;

        assert_eq!(
            waiter.await.unwrap(),
            Err(StateError::Cancelled {
                transition: Transition::Initialize
            })
        );
        assert_eq!(lock.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn failed_uninitialize_stays_initialized() {
        let lock = LifecycleLock::new("test");
        lock.initialize(|| async { Ok(()) }).await.unwrap();

        let result = lock
            .uninitialize(|| async { Err(StateError::Config("teardown".to_string())) })
            .await;

        assert!(result.is_err());
        assert!(lock.is_initialized());
    }
}
