//! # Explorer State Runtime
//!
//! Runtime for the entity state lifecycle of a chain explorer.
//!
//! This crate executes the reducers defined on top of `explorer-state-core`
//! and provides the managers every store module is built from.
//!
//! ## Core Components
//!
//! - **Store**: Observable state container that runs a reducer and executes its effects
//! - **Lifecycle Lock**: Serializes and coalesces initialize/uninitialize transitions
//! - **DataSet**: Fetch state of one keyed record with last-request-wins commits
//! - **Pagination**: Ordered, deduplicated, filterable list with live prepends
//! - **Subscription Adapter**: At most one open push subscription per module
//! - **Composition**: Uniform `initialize`/`uninitialize` over a module's managers
//!
//! ## Example
//!
//! ```ignore
//! use explorer_state_runtime::{DataSet, Pagination, PaginationConfig};
//! use explorer_state_core::KeySelector;
//!
//! let info = DataSet::new("info", move |height: u64| client.block(height));
//! let timeline = Pagination::new(
//!     "timeline",
//!     move |page, (), ()| client.blocks(page),
//!     KeySelector::new("height", |block: &Block| block.height),
//!     PaginationConfig::new(10),
//! );
//!
//! timeline.initial_fetch(()).await;
//! info.fetch(100).await;
//!
//! let state = info.snapshot().await;
//! assert!(!state.loading);
//! ```

use explorer_state_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{RwLock, watch};

/// Store module composition: uniform lifecycle over managers
pub mod composition;

/// Runtime configuration loaded from JSON defaults and the environment
pub mod config;

/// Single-record fetch manager
pub mod dataset;

/// Serializing gate for initialize/uninitialize transitions
pub mod lock;

/// Prometheus metrics for observability
pub mod metrics;

/// Paginated list manager with live prepends
pub mod pagination;

/// Push subscription ownership
pub mod subscription;

pub use composition::{Clearable, StoreModule};
pub use config::StateConfig;
pub use dataset::{DataSet, DataSetConfig};
pub use lock::{LifecycleLock, Phase, Transition};
pub use pagination::{Pagination, PaginationConfig, PaginationSnapshot};
pub use subscription::SubscriptionAdapter;

/// Error types for the runtime
pub mod error {
    use crate::lock::Transition;
    use explorer_state_core::{FetchError, SubscriptionError};
    use thiserror::Error;

    /// Errors surfaced by lifecycle operations.
    ///
    /// Fetch failures inside managers never surface here: they only flip the
    /// manager's `error` flag. This type is `Clone` so that every caller
    /// coalesced onto one lifecycle transition observes the same outcome.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StateError {
        /// A fetch the caller chose to propagate failed
        #[error("Fetch failed: {0}")]
        Fetch(#[from] FetchError),

        /// A push subscription could not be opened
        #[error("Subscription failed: {0}")]
        Subscription(#[from] SubscriptionError),

        /// The task driving a transition was dropped before it settled
        #[error("{transition} was cancelled before it settled")]
        Cancelled {
            /// The transition that was abandoned
            transition: Transition,
        },

        /// Invalid runtime configuration
        #[error("Configuration error: {0}")]
        Config(String),
    }
}

pub use error::StateError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for effects to complete.
/// An effect counts as complete once the action it produced has been reduced
/// and that action's own effects have completed as well, so waiting on the
/// handle of a fetch request returns after the result was committed or
/// discarded.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(DataSetAction::Fetch { key: 7, on_error: None }).await;
/// handle.wait().await;
/// // The fetch for key 7 has settled
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new effect handle and the tracking context feeding it
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracking context is gone, so no effect is left running
                break;
            }
        }
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements the effect counter on drop
///
/// Ensures the counter is always decremented, even if the effect panics or
/// its task is aborted.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Store module - The runtime for reducers
///
/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, DecrementGuard, Effect, EffectHandle, EffectTracking, Reducer, RwLock, watch,
    };
    use std::marker::PhantomData;

    /// The Store - observable state container for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`, mutated only by the reducer)
    /// 2. Reducer (manager logic)
    /// 3. Environment (injected collaborators)
    /// 4. Effect execution (with feedback loop)
    /// 5. Change notification (a version counter on a `watch` channel)
    ///
    /// Cloning a Store is cheap and yields another handle to the same state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    ///
    /// The reducer bound lives on the impl block, not on the struct.
    pub struct Store<S, A, E, R> {
        inner: Arc<Inner<S, E, R>>,
        _action: PhantomData<fn() -> A>,
    }

    struct Inner<S, E, R> {
        name: &'static str,
        state: RwLock<S>,
        reducer: R,
        environment: E,
        version: watch::Sender<u64>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
                _action: PhantomData,
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// # Arguments
        ///
        /// - `name`: Name used in logs and metrics (e.g. `"timeline"`)
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The reducer implementation
        /// - `environment`: Injected collaborators
        #[must_use]
        pub fn new(name: &'static str, initial_state: S, reducer: R, environment: E) -> Self {
            let (version, _) = watch::channel(0);

            Self {
                inner: Arc::new(Inner {
                    name,
                    state: RwLock::new(initial_state),
                    reducer,
                    environment,
                    version,
                }),
                _action: PhantomData,
            }
        }

        /// Name of this store
        #[must_use]
        pub fn name(&self) -> &'static str {
            self.inner.name
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Publishes a new state version to change subscribers
        /// 4. Starts the returned effects; actions they produce are fed back
        ///
        /// The reducer runs synchronously while holding the write lock, so no
        /// reader ever observes a half-applied action.
        ///
        /// # Returns
        ///
        /// An [`EffectHandle`] that can be used to wait for effect completion.
        #[tracing::instrument(skip(self, action), fields(store = self.inner.name), name = "store_send")]
        pub async fn send(&self, action: A) -> EffectHandle {
            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.inner.state.write().await;

                let start = std::time::Instant::now();
                let effects =
                    self.inner
                        .reducer
                        .reduce(&mut state, action, &self.inner.environment);
                metrics::histogram!(crate::metrics::REDUCER_DURATION, "store" => self.inner.name)
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());
                effects
            };

            self.inner.version.send_modify(|version| *version += 1);
            metrics::counter!(crate::metrics::REDUCTIONS_TOTAL, "store" => self.inner.name)
                .increment(1);

            for effect in effects {
                self.execute_effect(effect, tracking.clone());
            }

            handle
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.inner.state.read().await;
            f(&state)
        }

        /// Subscribe to state changes
        ///
        /// The receiver observes a version number that increases after every
        /// reduced action. Readers re-read state through [`Store::state`].
        #[must_use]
        pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
            self.inner.version.subscribe()
        }

        /// Execute an effect with tracking
        ///
        /// # Effect Types
        ///
        /// - `None`: No-op
        /// - `Future`: Executes async computation, sends resulting action if `Some`
        /// - `Parallel`: Executes effects concurrently
        /// - `Sequential`: Executes effects in order, waiting for each to complete
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned per effect
        fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
            match effect {
                Effect::None => {},
                Effect::Future(fut) => {
                    tracking.increment();
                    let guard = DecrementGuard(tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            let mut feedback = store.send(action).await;
                            feedback.wait().await;
                        }
                    });
                },
                Effect::Parallel(effects) => {
                    for effect in effects {
                        self.execute_effect(effect, tracking.clone());
                    }
                },
                Effect::Sequential(effects) => {
                    tracking.increment();
                    let guard = DecrementGuard(tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;

                        for effect in effects {
                            let (mut step, step_tracking) = EffectHandle::new();
                            store.execute_effect(effect, step_tracking);
                            step.wait().await;
                        }
                    });
                },
            }
        }
    }
}

pub use store::Store;
