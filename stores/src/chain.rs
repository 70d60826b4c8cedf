//! Chain info module.

use crate::records::ChainInfo;
use crate::source::ChainSource;
use explorer_state_runtime::composition::StoreModule;
use explorer_state_runtime::{DataSet, LifecycleLock, StateError, composition};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Chain-wide counters, shared by the modules that need the chain height.
///
/// Chain info is always refetched: [`ChainStore::refresh`] never serves a
/// cached value.
pub struct ChainStore {
    lock: LifecycleLock,
    info: DataSet<(), ChainInfo>,
}

impl ChainStore {
    /// Create an empty store over `source`.
    pub fn new(source: impl ChainSource) -> Self {
        let source = Arc::new(source);
        Self {
            lock: LifecycleLock::new("chain"),
            info: DataSet::new("chain_info", move |(): ()| source.chain_info()),
        }
    }

    /// Load the current chain info and wait until it settles.
    pub async fn refresh(&self) {
        self.info.fetch(()).await;
    }

    /// The chain info DataSet.
    #[must_use]
    pub const fn info(&self) -> &DataSet<(), ChainInfo> {
        &self.info
    }

    /// Height of the newest block, if chain info has loaded.
    pub async fn current_height(&self) -> Option<u64> {
        self.info.data().await.map(|info| info.current_height)
    }

    /// Initialize through the module lock.
    ///
    /// # Errors
    ///
    /// See [`composition::initialize`].
    pub async fn initialize(&self) -> Result<(), StateError> {
        composition::initialize(self).await
    }

    /// Uninitialize through the module lock.
    ///
    /// # Errors
    ///
    /// See [`composition::uninitialize`].
    pub async fn uninitialize(&self) -> Result<(), StateError> {
        composition::uninitialize(self).await
    }
}

impl StoreModule for ChainStore {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn lock(&self) -> &LifecycleLock {
        &self.lock
    }

    fn initialize_page(&self) -> BoxFuture<'_, Result<(), StateError>> {
        Box::pin(async move {
            self.refresh().await;
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.info.clear())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use explorer_state_core::{FetchError, FetchFuture};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counter(Arc<AtomicU64>);

    impl ChainSource for Counter {
        fn chain_info(&self) -> FetchFuture<ChainInfo> {
            let height = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Box::pin(async move {
                if height == 3 {
                    return Err(FetchError::Request("node unavailable".to_string()));
                }
                Ok(ChainInfo {
                    current_height: height * 10,
                    finalized_height: height * 10 - 2,
                })
            })
        }
    }

    #[tokio::test]
    async fn refresh_always_refetches() {
        let calls = Arc::new(AtomicU64::new(0));
        let chain = ChainStore::new(Counter(Arc::clone(&calls)));

        chain.initialize().await.unwrap();
        assert_eq!(chain.current_height().await, Some(10));

        chain.refresh().await;
        assert_eq!(chain.current_height().await, Some(20));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_refresh_flags_error_and_clears_height() {
        let chain = ChainStore::new(Counter(Arc::new(AtomicU64::new(2))));

        chain.refresh().await;

        assert!(chain.info().error().await);
        assert_eq!(chain.current_height().await, None);
    }

    #[tokio::test]
    async fn uninitialize_clears_chain_info() {
        let chain = ChainStore::new(Counter(Arc::new(AtomicU64::new(0))));

        chain.initialize().await.unwrap();
        chain.uninitialize().await.unwrap();

        assert_eq!(chain.current_height().await, None);
        assert!(!chain.lock().is_initialized());
    }
}
