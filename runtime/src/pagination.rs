//! Pagination manager: an ordered, deduplicated list built from page fetches.
//!
//! The list grows by appending pages and by live-prepending pushed records.
//! Every entry is unique by the key its [`KeySelector`] reads. Filter changes
//! restart the list from page 1; there is never a list mixing results of two
//! filters.
//!
//! Page results carry the generation of the request that produced them. A
//! restart (`initial_fetch`, `set_filter`, `uninitialize`) bumps the
//! generation, so a page that arrives for an older generation is discarded.
//!
//! # Live prepends during a restart
//!
//! Records pushed while page 1 is in flight stay at the front of the list.
//! When page 1 lands its items are appended behind them, skipping keys that
//! are already present, so a pushed record always wins over the same record
//! in a page.

use crate::{EffectHandle, Store};
use explorer_state_core::{
    FetchError, FilterOption, KeySelector, Page, PageFetcher, PageInfo, SmallVec,
    effect::Effect, reducer::Reducer, smallvec,
};
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

/// Pagination settings.
#[derive(Debug, Clone)]
pub struct PaginationConfig<F> {
    /// Items requested per page (never zero)
    pub page_size: u32,
    /// Filter applied on construction and after `uninitialize`
    pub initial_filter: F,
    /// Presets selectable with `select_filter`
    pub filter_options: Vec<FilterOption<F>>,
}

impl<F: Default> PaginationConfig<F> {
    /// A configuration with the default filter and no presets.
    #[must_use]
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            initial_filter: F::default(),
            filter_options: Vec::new(),
        }
    }
}

impl<F> PaginationConfig<F> {
    /// Replace the initial filter.
    #[must_use]
    pub fn with_initial_filter(mut self, filter: F) -> Self {
        self.initial_filter = filter;
        self
    }

    /// Offer filter presets. The first preset becomes the initial filter.
    #[must_use]
    pub fn with_filter_options(mut self, options: Vec<FilterOption<F>>) -> Self
    where
        F: Clone,
    {
        if let Some(first) = options.first() {
            self.initial_filter = first.value.clone();
        }
        self.filter_options = options;
        self
    }
}

/// State of a Pagination.
#[derive(Debug, Clone)]
pub struct PaginationState<T, K, F, C> {
    items: VecDeque<T>,
    keys: HashSet<K>,
    loaded_pages: u32,
    filter: F,
    filter_index: Option<usize>,
    context: Option<C>,
    fetching: bool,
    error: bool,
    is_last_page: bool,
    generation: u64,
}

impl<T, K, F, C> PaginationState<T, K, F, C> {
    /// Empty list under `filter`.
    #[must_use]
    pub fn new(filter: F, filter_index: Option<usize>) -> Self {
        Self {
            items: VecDeque::new(),
            keys: HashSet::new(),
            loaded_pages: 0,
            filter,
            filter_index,
            context: None,
            fetching: false,
            error: false,
            is_last_page: false,
            generation: 0,
        }
    }

    /// Entries in display order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of the last page merged into the list (0 before page 1).
    #[must_use]
    pub const fn page_number(&self) -> u32 {
        self.loaded_pages
    }

    /// Current filter.
    #[must_use]
    pub const fn filter(&self) -> &F {
        &self.filter
    }

    /// Context the list was initialized with.
    #[must_use]
    pub const fn context(&self) -> Option<&C> {
        self.context.as_ref()
    }

    /// Whether a page fetch is in flight.
    #[must_use]
    pub const fn fetching(&self) -> bool {
        self.fetching
    }

    /// Whether the last page fetch failed.
    #[must_use]
    pub const fn error(&self) -> bool {
        self.error
    }

    /// Whether nothing follows the loaded pages.
    #[must_use]
    pub const fn is_last_page(&self) -> bool {
        self.is_last_page
    }

    /// Generation of the current list.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T, K, F, C> PaginationState<T, K, F, C>
where
    K: Eq + Hash,
{
    /// Restart from page 1 under the current filter.
    fn restart(&mut self) {
        self.generation += 1;
        self.loaded_pages = 0;
        self.items.clear();
        self.keys.clear();
        self.fetching = true;
        self.error = false;
        self.is_last_page = false;
    }

    /// Append page items, skipping keys already present.
    fn append(&mut self, page: Vec<T>, key: &KeySelector<T, K>) -> usize {
        let mut skipped = 0;
        for item in page {
            if self.keys.insert(key.key(&item)) {
                self.items.push_back(item);
            } else {
                skipped += 1;
            }
        }
        skipped
    }

    /// Insert at the front, removing an existing entry with the same key.
    fn prepend(&mut self, item: T, key: &KeySelector<T, K>) -> bool {
        let item_key = key.key(&item);
        let replaced = !self.keys.insert(item_key);
        if replaced {
            let item_key = key.key(&item);
            self.items.retain(|existing| key.key(existing) != item_key);
        }
        self.items.push_front(item);
        replaced
    }
}

/// Inputs of the Pagination reducer.
pub enum PaginationAction<T, F, C> {
    /// Reset to page 1 with `context` and fetch it
    InitialFetch {
        /// Value handed to every page fetch of this list
        context: C,
    },
    /// Fetch the page after the last loaded one
    FetchNextPage,
    /// Replace the filter and restart
    SetFilter {
        /// New filter
        filter: F,
    },
    /// Apply the preset at `index` and restart
    SelectFilter {
        /// Index into the configured presets
        index: usize,
    },
    /// A page fetch finished (fed back by the fetch effect)
    PageLoaded {
        /// Generation the request was issued for
        generation: u64,
        /// Requested page number
        page_number: u32,
        /// Outcome of the fetch
        result: Result<Page<T>, FetchError>,
    },
    /// Live-prepend a pushed record
    AddLatestItem {
        /// The record
        item: T,
    },
    /// Clear the list and reset paging and filter state
    Uninitialize,
}

impl<T, F: fmt::Debug, C: fmt::Debug> fmt::Debug for PaginationAction<T, F, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialFetch { context } => {
                f.debug_struct("InitialFetch").field("context", context).finish()
            },
            Self::FetchNextPage => write!(f, "FetchNextPage"),
            Self::SetFilter { filter } => f.debug_struct("SetFilter").field("filter", filter).finish(),
            Self::SelectFilter { index } => {
                f.debug_struct("SelectFilter").field("index", index).finish()
            },
            Self::PageLoaded {
                generation,
                page_number,
                result,
            } => f
                .debug_struct("PageLoaded")
                .field("generation", generation)
                .field("page_number", page_number)
                .field("items", &result.as_ref().map(|page| page.items.len()))
                .finish(),
            Self::AddLatestItem { .. } => write!(f, "AddLatestItem"),
            Self::Uninitialize => write!(f, "Uninitialize"),
        }
    }
}

/// Collaborators of the Pagination reducer.
pub struct PaginationEnvironment<T, K, F, C> {
    /// Manager name for logs and metrics
    pub name: &'static str,
    /// Remote data source
    pub fetcher: Arc<dyn PageFetcher<T, F, C>>,
    /// Deduplication key
    pub key: KeySelector<T, K>,
    /// Paging and filter settings
    pub config: PaginationConfig<F>,
}

/// Reducer implementing the list bookkeeping.
pub struct PaginationReducer<T, K, F, C>(PhantomData<fn() -> (T, K, F, C)>);

impl<T, K, F, C> PaginationReducer<T, K, F, C> {
    /// Create the reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T, K, F, C> Default for PaginationReducer<T, K, F, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K, F, C> PaginationReducer<T, K, F, C>
where
    T: Send + 'static,
    F: Clone + Send + 'static,
    C: Clone + Send + 'static,
{
    fn request_page(
        state: &PaginationState<T, K, F, C>,
        env: &PaginationEnvironment<T, K, F, C>,
        context: C,
    ) -> Effect<PaginationAction<T, F, C>> {
        let page = PageInfo {
            page_number: state.loaded_pages + 1,
            page_size: env.config.page_size,
        };
        let generation = state.generation;

        metrics::counter!(crate::metrics::FETCHES_TOTAL, "manager" => env.name).increment(1);

        let request = env
            .fetcher
            .fetch_page(page, state.filter.clone(), context);
        Effect::future(async move {
            let result = request.await;
            Some(PaginationAction::PageLoaded {
                generation,
                page_number: page.page_number,
                result,
            })
        })
    }

    /// Restart under the current filter if a context is known.
    fn restart_with_stored_context(
        state: &mut PaginationState<T, K, F, C>,
        env: &PaginationEnvironment<T, K, F, C>,
    ) -> SmallVec<[Effect<PaginationAction<T, F, C>>; 4]>
    where
        K: Eq + Hash,
    {
        match state.context.clone() {
            Some(context) => {
                state.restart();
                smallvec![Self::request_page(state, env, context)]
            },
            None => {
                tracing::debug!(pagination = env.name, "Filter recorded, list not initialized");
                smallvec![Effect::None]
            },
        }
    }
}

impl<T, K, F, C> Reducer for PaginationReducer<T, K, F, C>
where
    T: Send + 'static,
    K: Eq + Hash + fmt::Debug + Send + 'static,
    F: Clone + fmt::Debug + Send + 'static,
    C: Clone + fmt::Debug + Send + 'static,
{
    type State = PaginationState<T, K, F, C>;
    type Action = PaginationAction<T, F, C>;
    type Environment = PaginationEnvironment<T, K, F, C>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            PaginationAction::InitialFetch { context } => {
                state.context = Some(context.clone());
                state.restart();
                smallvec![Self::request_page(state, env, context)]
            },
            PaginationAction::FetchNextPage => {
                if state.is_last_page || state.fetching {
                    return smallvec![Effect::None];
                }
                let Some(context) = state.context.clone() else {
                    tracing::debug!(pagination = env.name, "Next page requested before initial fetch");
                    return smallvec![Effect::None];
                };
                state.fetching = true;
                state.error = false;
                smallvec![Self::request_page(state, env, context)]
            },
            PaginationAction::SetFilter { filter } => {
                state.filter = filter;
                state.filter_index = None;
                Self::restart_with_stored_context(state, env)
            },
            PaginationAction::SelectFilter { index } => {
                let Some(option) = env.config.filter_options.get(index) else {
                    tracing::warn!(
                        pagination = env.name,
                        index,
                        available = env.config.filter_options.len(),
                        "Ignoring unknown filter preset"
                    );
                    return smallvec![Effect::None];
                };
                state.filter = option.value.clone();
                state.filter_index = Some(index);
                Self::restart_with_stored_context(state, env)
            },
            PaginationAction::PageLoaded {
                generation,
                page_number,
                result,
            } => {
                if generation != state.generation {
                    tracing::debug!(
                        pagination = env.name,
                        generation,
                        latest = state.generation,
                        page_number,
                        "Discarding stale page"
                    );
                    metrics::counter!(crate::metrics::STALE_DISCARDS_TOTAL, "manager" => env.name)
                        .increment(1);
                    return smallvec![Effect::None];
                }

                state.fetching = false;
                match result {
                    Ok(page) => {
                        let ends_list = page.ends_list_of(env.config.page_size);
                        let skipped = state.append(page.items, &env.key);
                        if skipped > 0 {
                            tracing::debug!(
                                pagination = env.name,
                                page_number,
                                skipped,
                                key = env.key.field(),
                                "Skipped entries already in the list"
                            );
                        }
                        state.loaded_pages = page_number;
                        state.is_last_page = ends_list;
                        state.error = false;
                    },
                    Err(error) => {
                        tracing::warn!(pagination = env.name, page_number, %error, "Page fetch failed");
                        metrics::counter!(crate::metrics::FETCH_FAILURES_TOTAL, "manager" => env.name)
                            .increment(1);
                        state.error = true;
                    },
                }
                smallvec![Effect::None]
            },
            PaginationAction::AddLatestItem { item } => {
                let replaced = state.prepend(item, &env.key);
                tracing::trace!(pagination = env.name, replaced, "Live item prepended");
                metrics::counter!(crate::metrics::LIVE_PREPENDS_TOTAL, "manager" => env.name)
                    .increment(1);
                smallvec![Effect::None]
            },
            PaginationAction::Uninitialize => {
                let generation = state.generation + 1;
                *state = PaginationState::new(
                    env.config.initial_filter.clone(),
                    (!env.config.filter_options.is_empty()).then_some(0),
                );
                state.generation = generation;
                smallvec![Effect::None]
            },
        }
    }
}

/// Read-only view of a Pagination: `{ items, isLastPage, fetching }` plus
/// the paging and filter details a list view renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationSnapshot<T, F> {
    /// Entries in display order
    pub items: Vec<T>,
    /// Last merged page number (0 before page 1)
    pub page_number: u32,
    /// Whether nothing follows the loaded pages
    pub is_last_page: bool,
    /// Whether a page fetch is in flight
    pub fetching: bool,
    /// Whether the last page fetch failed
    pub error: bool,
    /// Current filter
    pub filter: F,
    /// Index of the selected preset, if the filter came from one
    pub filter_index: Option<usize>,
}

type PaginationStore<T, K, F, C> = Store<
    PaginationState<T, K, F, C>,
    PaginationAction<T, F, C>,
    PaginationEnvironment<T, K, F, C>,
    PaginationReducer<T, K, F, C>,
>;

/// Paginated, deduplicated, filterable list with live prepends.
///
/// `T` is the record, `K` its deduplication key, `F` the filter and `C` the
/// context handed to every page fetch (for instance the height of the block
/// whose transactions are listed). Cloning yields another handle to the same
/// list.
///
/// # Example
///
/// ```ignore
/// let transactions = Pagination::new(
///     "block_transactions",
///     move |page, filter, height| sdk.block_transactions(height, filter, page),
///     KeySelector::new("hash", |tx: &Transaction| tx.hash.clone()),
///     PaginationConfig::new(10).with_filter_options(vec![
///         FilterOption::new("All", TxFilter::All),
///         FilterOption::new("Transfer", TxFilter::Transfer),
///     ]),
/// );
///
/// transactions.initial_fetch(100).await;
/// transactions.select_filter(1).await;
/// ```
pub struct Pagination<T, K, F = (), C = ()> {
    store: PaginationStore<T, K, F, C>,
    filter_options: Arc<[FilterOption<F>]>,
}

impl<T, K, F, C> Clone for Pagination<T, K, F, C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            filter_options: Arc::clone(&self.filter_options),
        }
    }
}

impl<T, K, F, C> Pagination<T, K, F, C>
where
    T: Clone + Send + Sync + 'static,
    K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    F: Clone + fmt::Debug + Send + Sync + 'static,
    C: Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Create an empty list.
    pub fn new(
        name: &'static str,
        fetcher: impl PageFetcher<T, F, C>,
        key: KeySelector<T, K>,
        config: PaginationConfig<F>,
    ) -> Self {
        let filter_options: Arc<[FilterOption<F>]> = config.filter_options.clone().into();
        let initial = PaginationState::new(
            config.initial_filter.clone(),
            (!filter_options.is_empty()).then_some(0),
        );
        let environment = PaginationEnvironment {
            name,
            fetcher: Arc::new(fetcher),
            key,
            config,
        };

        Self {
            store: Store::new(name, initial, PaginationReducer::new(), environment),
            filter_options,
        }
    }

    /// Manager name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.store.name()
    }

    /// Reset to page 1 under the current filter, fetch it, and wait until it
    /// has been merged or discarded. `context` is reused by later pages.
    pub async fn initial_fetch(&self, context: C) {
        self.request_initial_fetch(context).await.wait().await;
    }

    /// Issue [`Pagination::initial_fetch`] without waiting for the page.
    pub async fn request_initial_fetch(&self, context: C) -> EffectHandle {
        self.send(PaginationAction::InitialFetch { context }).await
    }

    /// Fetch and append the next page. No-op on the last page or while a
    /// fetch is in flight.
    pub async fn fetch_next_page(&self) {
        self.send(PaginationAction::FetchNextPage).await.wait().await;
    }

    /// Replace the filter and restart from page 1.
    pub async fn set_filter(&self, filter: F) {
        self.send(PaginationAction::SetFilter { filter }).await.wait().await;
    }

    /// Apply the preset at `index` and restart from page 1.
    pub async fn select_filter(&self, index: usize) {
        self.send(PaginationAction::SelectFilter { index }).await.wait().await;
    }

    /// Insert a pushed record at the front, replacing an entry with the same key.
    pub async fn add_latest_item(&self, item: T) {
        let _ = self.send(PaginationAction::AddLatestItem { item }).await;
    }

    /// Clear the list and reset paging and filter state. Pages still in
    /// flight are discarded.
    pub async fn uninitialize(&self) {
        let _ = self.send(PaginationAction::Uninitialize).await;
    }

    /// Send a raw action without waiting for its effects.
    pub async fn send(&self, action: PaginationAction<T, F, C>) -> EffectHandle {
        self.store.send(action).await
    }

    /// Current view of the list.
    pub async fn snapshot(&self) -> PaginationSnapshot<T, F> {
        self.store
            .state(|s| PaginationSnapshot {
                items: s.items.iter().cloned().collect(),
                page_number: s.loaded_pages,
                is_last_page: s.is_last_page,
                fetching: s.fetching,
                error: s.error,
                filter: s.filter.clone(),
                filter_index: s.filter_index,
            })
            .await
    }

    /// Entries in display order.
    pub async fn items(&self) -> Vec<T> {
        self.store.state(|s| s.items.iter().cloned().collect()).await
    }

    /// The first `n` entries.
    pub async fn latest(&self, n: usize) -> Vec<T> {
        self.store
            .state(|s| s.items.iter().take(n).cloned().collect())
            .await
    }

    /// Whether nothing follows the loaded pages.
    pub async fn is_last_page(&self) -> bool {
        self.store.state(PaginationState::is_last_page).await
    }

    /// Whether a page fetch is in flight.
    pub async fn fetching(&self) -> bool {
        self.store.state(PaginationState::fetching).await
    }

    /// Whether the last page fetch failed.
    pub async fn error(&self) -> bool {
        self.store.state(PaginationState::error).await
    }

    /// Current filter.
    pub async fn filter(&self) -> F {
        self.store.state(|s| s.filter.clone()).await
    }

    /// Configured filter presets.
    #[must_use]
    pub fn filter_options(&self) -> &[FilterOption<F>] {
        &self.filter_options
    }

    /// Observe state changes.
    #[must_use]
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.store.subscribe_changes()
    }
}

impl<T, K, F, C> crate::composition::Clearable for Pagination<T, K, F, C>
where
    T: Clone + Send + Sync + 'static,
    K: Eq + Hash + fmt::Debug + Send + Sync + 'static,
    F: Clone + fmt::Debug + Send + Sync + 'static,
    C: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn manager_name(&self) -> &'static str {
        self.name()
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.uninitialize())
    }
}
