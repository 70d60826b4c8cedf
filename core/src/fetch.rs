//! Fetch state for a single keyed record, and the fetcher seams.
//!
//! The remote node API is an opaque collaborator: a fetcher takes a key (or a
//! page request) and eventually yields a domain record or fails. Managers
//! never see transport details, only [`FetchError`].

use crate::page::{Page, PageInfo};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;

/// Errors reported by a remote data source.
///
/// Fetch errors are recorded as `error = true` on the owning manager and are
/// never thrown to the caller of `fetch`/`fetch_next_page`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The request could not be completed (transport or server failure)
    #[error("Request failed: {0}")]
    Request(String),

    /// The requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response could not be decoded into a domain record
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Future returned by every fetcher.
pub type FetchFuture<T> = BoxFuture<'static, Result<T, FetchError>>;

/// Fetch state of one record: `{ data, loading, error }`.
///
/// After a fetch settles, `loading` and `error` are never both true, and
/// `data` is only set by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchState<T> {
    /// The committed record, if the last accepted fetch succeeded
    pub data: Option<T>,
    /// A fetch is in flight
    pub loading: bool,
    /// The last accepted fetch failed
    pub error: bool,
}

impl<T> FetchState<T> {
    /// Empty state: no data, not loading, no error.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            data: None,
            loading: false,
            error: false,
        }
    }

    /// Enter the loading state. Previous data stays visible until replaced.
    pub fn begin(&mut self) {
        self.loading = true;
        self.error = false;
    }

    /// Commit a successful result.
    pub fn succeed(&mut self, data: T) {
        self.data = Some(data);
        self.loading = false;
        self.error = false;
    }

    /// Commit a failure.
    pub fn fail(&mut self) {
        self.data = None;
        self.loading = false;
        self.error = true;
    }

    /// Neither loading nor failed, and holding data.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        self.data.is_some() && !self.loading && !self.error
    }
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// A data source for single records keyed by `K`.
///
/// Implemented for every `Fn(K) -> impl Future<Output = Result<T, FetchError>>`,
/// so most call sites pass a closure over an SDK client.
///
/// # Example
///
/// ```
/// use explorer_state_core::fetch::{FetchError, Fetcher};
///
/// let fetcher = |height: u64| async move {
///     if height == 0 {
///         Err(FetchError::NotFound("block 0".to_string()))
///     } else {
///         Ok(height * 2)
///     }
/// };
///
/// let result = tokio_test::block_on(fetcher.fetch(21));
/// assert_eq!(result, Ok(42));
/// ```
pub trait Fetcher<K, T>: Send + Sync + 'static {
    /// Issue the fetch for `key`.
    fn fetch(&self, key: K) -> FetchFuture<T>;
}

impl<K, T, F, Fut> Fetcher<K, T> for F
where
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    fn fetch(&self, key: K) -> FetchFuture<T> {
        Box::pin(self(key))
    }
}

/// A data source for pages of records.
///
/// Receives the requested page, the list's current filter and the context
/// value the list was initialized with (for instance the height of the block
/// whose transactions are listed).
pub trait PageFetcher<T, F, C>: Send + Sync + 'static {
    /// Issue the fetch for one page.
    fn fetch_page(&self, page: PageInfo, filter: F, context: C) -> FetchFuture<Page<T>>;
}

impl<T, F, C, Func, Fut> PageFetcher<T, F, C> for Func
where
    Func: Fn(PageInfo, F, C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Page<T>, FetchError>> + Send + 'static,
{
    fn fetch_page(&self, page: PageInfo, filter: F, context: C) -> FetchFuture<Page<T>> {
        Box::pin(self(page, filter, context))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn settled_state_never_loading_and_failed() {
        let mut state = FetchState::<u32>::empty();
        state.begin();
        assert!(state.loading);
        state.fail();
        assert!(state.error && !state.loading);
        assert_eq!(state.data, None);

        state.begin();
        assert!(!state.error);
        state.succeed(7);
        assert!(state.is_ready());
    }

    #[test]
    fn page_fetcher_closure_receives_all_arguments() {
        let fetcher = |page: PageInfo, filter: u8, context: &'static str| async move {
            Ok::<_, FetchError>(Page::new(
                vec![format!("{context}:{filter}")],
                page.page_number,
                page.page_size,
            ))
        };

        let page =
            tokio_test::block_on(fetcher.fetch_page(PageInfo::first(5), 3, "block")).unwrap();
        assert_eq!(page.items, vec!["block:3".to_string()]);
        assert_eq!(page.page_number, 1);
    }
}
