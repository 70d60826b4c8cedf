//! DataSet manager: fetch state of a single keyed record.
//!
//! A detail view (one block, one namespace) shows a record fetched by key.
//! The view can switch keys faster than the node answers, so the manager
//! commits a result only if it answers the most recently requested key
//! (last-request-wins). Earlier results are discarded silently.
//!
//! # Example
//!
//! ```ignore
//! let info = DataSet::new("info", move |height: u64| sdk.block_info(height));
//!
//! info.fetch(100).await;
//! let state = info.snapshot().await;
//! if state.error {
//!     // show a retry affordance; retrying is a new `fetch`
//! }
//! ```

use crate::{EffectHandle, Store};
use explorer_state_core::{
    FetchError, FetchState, Fetcher, SmallVec, effect::Effect, reducer::Reducer, smallvec,
};
use futures::future::BoxFuture;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

/// Caller-supplied handler invoked with a fetch failure.
pub type ErrorHandler = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// DataSet behavior switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataSetConfig {
    /// Skip the fetch when the key equals the last completed key and the
    /// state holds data without error.
    pub cache_completed: bool,
}

impl DataSetConfig {
    /// Enable or disable the completed-key cache.
    #[must_use]
    pub const fn with_cache_completed(mut self, cache_completed: bool) -> Self {
        self.cache_completed = cache_completed;
        self
    }
}

/// State of a DataSet.
#[derive(Debug, Clone)]
pub struct DataSetState<K, T> {
    /// `{ data, loading, error }` of the record
    pub fetch: FetchState<T>,
    /// Key of the most recently requested fetch
    pub requested_key: Option<K>,
    /// Key whose result is currently committed
    pub completed_key: Option<K>,
    /// Error of the last accepted fetch, if it failed
    pub last_error: Option<FetchError>,
    request_id: u64,
}

impl<K, T> DataSetState<K, T> {
    /// Identifier of the most recent request (monotonic, survives `Clear`).
    #[must_use]
    pub const fn request_id(&self) -> u64 {
        self.request_id
    }
}

impl<K, T> Default for DataSetState<K, T> {
    fn default() -> Self {
        Self {
            fetch: FetchState::empty(),
            requested_key: None,
            completed_key: None,
            last_error: None,
            request_id: 0,
        }
    }
}

/// Inputs of the DataSet reducer.
pub enum DataSetAction<K, T> {
    /// Request the record for `key`
    Fetch {
        /// Record key
        key: K,
        /// Extra handler for a failure of this request
        on_error: Option<ErrorHandler>,
    },
    /// A fetch finished (fed back by the fetch effect)
    Settled {
        /// Request this result answers
        request_id: u64,
        /// Key that was fetched
        key: K,
        /// Outcome of the fetch
        result: Result<T, FetchError>,
        /// Handler carried over from the request
        on_error: Option<ErrorHandler>,
    },
    /// Reset to the empty state and invalidate in-flight requests
    Clear,
}

impl<K: fmt::Debug, T> fmt::Debug for DataSetAction<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { key, on_error } => f
                .debug_struct("Fetch")
                .field("key", key)
                .field("on_error", &on_error.is_some())
                .finish(),
            Self::Settled {
                request_id,
                key,
                result,
                ..
            } => f
                .debug_struct("Settled")
                .field("request_id", request_id)
                .field("key", key)
                .field("ok", &result.is_ok())
                .finish(),
            Self::Clear => write!(f, "Clear"),
        }
    }
}

/// Collaborators of the DataSet reducer.
pub struct DataSetEnvironment<K, T> {
    /// Manager name for logs and metrics
    pub name: &'static str,
    /// Remote data source
    pub fetcher: Arc<dyn Fetcher<K, T>>,
    /// Behavior switches
    pub config: DataSetConfig,
}

/// Reducer implementing fetch bookkeeping for one record.
pub struct DataSetReducer<K, T>(PhantomData<fn() -> (K, T)>);

impl<K, T> DataSetReducer<K, T> {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<K, T> Default for DataSetReducer<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Reducer for DataSetReducer<K, T>
where
    K: Clone + PartialEq + fmt::Debug + Send + 'static,
    T: Send + 'static,
{
    type State = DataSetState<K, T>;
    type Action = DataSetAction<K, T>;
    type Environment = DataSetEnvironment<K, T>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            DataSetAction::Fetch { key, on_error } => {
                let in_flight_elsewhere = state.requested_key != state.completed_key;
                if env.config.cache_completed
                    && !in_flight_elsewhere
                    && state.fetch.is_ready()
                    && state.completed_key.as_ref() == Some(&key)
                {
                    tracing::debug!(dataset = env.name, ?key, "Cache hit, skipping fetch");
                    return smallvec![Effect::None];
                }

                state.request_id += 1;
                state.requested_key = Some(key.clone());
                state.fetch.begin();

                metrics::counter!(crate::metrics::FETCHES_TOTAL, "manager" => env.name)
                    .increment(1);

                let request_id = state.request_id;
                let request = env.fetcher.fetch(key.clone());
                smallvec![Effect::future(async move {
                    let result = request.await;
                    Some(DataSetAction::Settled {
                        request_id,
                        key,
                        result,
                        on_error,
                    })
                })]
            },
            DataSetAction::Settled {
                request_id,
                key,
                result,
                on_error,
            } => {
                if request_id != state.request_id {
                    tracing::debug!(
                        dataset = env.name,
                        ?key,
                        request_id,
                        latest = state.request_id,
                        "Discarding stale result"
                    );
                    metrics::counter!(crate::metrics::STALE_DISCARDS_TOTAL, "manager" => env.name)
                        .increment(1);
                    return smallvec![Effect::None];
                }

                match result {
                    Ok(data) => {
                        state.fetch.succeed(data);
                        state.completed_key = Some(key);
                        state.last_error = None;
                        smallvec![Effect::None]
                    },
                    Err(error) => {
                        tracing::warn!(dataset = env.name, ?key, %error, "Fetch failed");
                        metrics::counter!(crate::metrics::FETCH_FAILURES_TOTAL, "manager" => env.name)
                            .increment(1);

                        state.fetch.fail();
                        state.completed_key = None;
                        state.last_error = Some(error.clone());

                        match on_error {
                            Some(handler) => smallvec![Effect::future(async move {
                                handler(&error);
                                None
                            })],
                            None => smallvec![Effect::None],
                        }
                    },
                }
            },
            DataSetAction::Clear => {
                let request_id = state.request_id;
                *state = DataSetState {
                    request_id: request_id + 1,
                    ..DataSetState::default()
                };
                smallvec![Effect::None]
            },
        }
    }
}

type DataSetStore<K, T> =
    Store<DataSetState<K, T>, DataSetAction<K, T>, DataSetEnvironment<K, T>, DataSetReducer<K, T>>;

/// Fetch-state manager for a single keyed record.
///
/// Cloning yields another handle to the same state.
pub struct DataSet<K, T> {
    store: DataSetStore<K, T>,
}

impl<K, T> Clone for DataSet<K, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<K, T> DataSet<K, T>
where
    K: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create an empty DataSet over `fetcher` with the default configuration.
    pub fn new(name: &'static str, fetcher: impl Fetcher<K, T>) -> Self {
        Self::with_config(name, fetcher, DataSetConfig::default())
    }

    /// Create an empty DataSet with an explicit configuration.
    pub fn with_config(
        name: &'static str,
        fetcher: impl Fetcher<K, T>,
        config: DataSetConfig,
    ) -> Self {
        let environment = DataSetEnvironment {
            name,
            fetcher: Arc::new(fetcher),
            config,
        };

        Self {
            store: Store::new(
                name,
                DataSetState::default(),
                DataSetReducer::new(),
                environment,
            ),
        }
    }

    /// Manager name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.store.name()
    }

    /// Fetch the record for `key` and wait until the result is committed or
    /// discarded. Failures only set the `error` flag.
    pub async fn fetch(&self, key: K) {
        self.request(key, None).await.wait().await;
    }

    /// Like [`DataSet::fetch`], additionally invoking `handler` if this
    /// request fails and its result is still current.
    pub async fn fetch_with_handler<H>(&self, key: K, handler: H)
    where
        H: Fn(&FetchError) + Send + Sync + 'static,
    {
        self.request(key, Some(Arc::new(handler))).await.wait().await;
    }

    /// Issue a fetch without waiting for it to settle.
    pub async fn request(&self, key: K, on_error: Option<ErrorHandler>) -> EffectHandle {
        self.store.send(DataSetAction::Fetch { key, on_error }).await
    }

    /// Reset to the empty state. Results still in flight are discarded.
    pub async fn clear(&self) {
        let _ = self.store.send(DataSetAction::Clear).await;
    }

    /// Current `{ data, loading, error }`.
    pub async fn snapshot(&self) -> FetchState<T> {
        self.store.state(|s| s.fetch.clone()).await
    }

    /// The committed record.
    pub async fn data(&self) -> Option<T> {
        self.store.state(|s| s.fetch.data.clone()).await
    }

    /// Whether a fetch is in flight.
    pub async fn loading(&self) -> bool {
        self.store.state(|s| s.fetch.loading).await
    }

    /// Whether the last accepted fetch failed.
    pub async fn error(&self) -> bool {
        self.store.state(|s| s.fetch.error).await
    }

    /// Error of the last accepted fetch.
    pub async fn last_error(&self) -> Option<FetchError> {
        self.store.state(|s| s.last_error.clone()).await
    }

    /// Key of the most recent request.
    pub async fn requested_key(&self) -> Option<K> {
        self.store.state(|s| s.requested_key.clone()).await
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.store.subscribe_changes()
    }
}

impl<K, T> crate::composition::Clearable for DataSet<K, T>
where
    K: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn manager_name(&self) -> &'static str {
        self.name()
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(DataSet::clear(self))
    }
}
