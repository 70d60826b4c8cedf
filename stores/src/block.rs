//! Block module.
//!
//! The timeline lists blocks newest first and receives new blocks live from
//! the node's push channel. The detail view shows one block at a time, keyed
//! by `current_block_height`:
//!
//! - `info`: the full block record
//! - `block_receipts`: resolution statements of the block
//! - `transactions`: transactions of the block, filterable by kind
//! - `receipts`: receipts of the block, filterable by group
//!
//! A pushed block is announced by height only; the handler loads it through
//! [`BlockSource::block_by_height`], prepends it to the timeline, then
//! refreshes chain info so navigation bounds follow the chain tip.

use crate::chain::ChainStore;
use crate::records::{
    Block, BlockInfo, BlockReceipts, NewBlock, Receipt, ReceiptKind, Transaction,
    TransactionFilter,
};
use crate::source::BlockSource;
use explorer_state_core::{Endpoint, FetchError, KeySelector, Listener, PageInfo};
use explorer_state_runtime::composition::{
    StoreModule, clear_all, log_failure, next_within, previous_within,
};
use explorer_state_runtime::{
    DataSet, EffectHandle, LifecycleLock, Pagination, PaginationConfig, StateConfig, StateError,
    SubscriptionAdapter, composition,
};
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use tokio::sync::{Mutex, watch};

/// Number of blocks shown in the "recent blocks" widget.
pub const RECENT_BLOCKS: usize = 4;

/// Block timeline and block detail view.
pub struct BlockStore<L: Listener<Notification = NewBlock>> {
    lock: LifecycleLock,
    source: Arc<dyn BlockSource>,
    chain: Arc<ChainStore>,
    subscription: SubscriptionAdapter<L>,
    endpoint: Endpoint,
    current_block_height: watch::Sender<Option<u64>>,
    /// Held while the detail view is reset and its requests are issued
    detail: Mutex<()>,
    timeline: Pagination<Block, u64>,
    info: DataSet<u64, BlockInfo>,
    block_receipts: DataSet<u64, BlockReceipts>,
    transactions: Pagination<Transaction, String, TransactionFilter, u64>,
    receipts: Pagination<Receipt, String, ReceiptKind, u64>,
}

impl<L: Listener<Notification = NewBlock>> BlockStore<L> {
    /// Create an empty store.
    ///
    /// `chain` is shared with other modules; this store refreshes it but
    /// never clears it.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Config`] if no streaming endpoint can be derived
    /// from `config`.
    pub fn new(
        config: &StateConfig,
        source: impl BlockSource,
        listener: L,
        chain: Arc<ChainStore>,
    ) -> Result<Self, StateError> {
        let endpoint = config.endpoint()?;
        let source: Arc<dyn BlockSource> = Arc::new(source);

        let timeline = Pagination::new(
            "block_timeline",
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, (): (), (): ()| source.block_list(page)
            },
            KeySelector::new("height", |block: &Block| block.height),
            PaginationConfig::new(config.page_size),
        );

        let info = DataSet::with_config(
            "block_info",
            {
                let source = Arc::clone(&source);
                move |height: u64| source.block_info(height)
            },
            config.dataset(),
        );

        let block_receipts = DataSet::with_config(
            "block_receipts_info",
            {
                let source = Arc::clone(&source);
                move |height: u64| source.block_receipts_info(height)
            },
            config.dataset(),
        );

        let transactions = Pagination::new(
            "block_transactions",
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, filter: TransactionFilter, height: u64| {
                    source.block_transactions(page, filter, height)
                }
            },
            KeySelector::new("hash", |transaction: &Transaction| {
                transaction.hash.clone()
            }),
            PaginationConfig::new(config.detail_page_size)
                .with_filter_options(TransactionFilter::options()),
        );

        let receipts = Pagination::new(
            "block_receipts",
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, kind: ReceiptKind, height: u64| {
                    source.block_receipts(page, kind, height)
                }
            },
            KeySelector::new("id", |receipt: &Receipt| receipt.id.clone()),
            PaginationConfig::new(config.detail_page_size)
                .with_filter_options(ReceiptKind::options()),
        );

        Ok(Self {
            lock: LifecycleLock::new("block"),
            source,
            chain,
            subscription: SubscriptionAdapter::new("block", listener),
            endpoint,
            current_block_height: watch::Sender::new(None),
            detail: Mutex::new(()),
            timeline,
            info,
            block_receipts,
            transactions,
            receipts,
        })
    }

    /// Initialize through the module lock: chain info and the first timeline
    /// page, then the new-block subscription.
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

    /// Show block `height`: tear down the previous detail view, record the
    /// height, then load the four detail managers concurrently.
    ///
    /// Overlapping calls issue their requests one call at a time, so every
    /// manager ends up on the height of the last call.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_block_info(&self, height: u64) {
        let mut pending: [EffectHandle; 4] = {
            let _detail = self.detail.lock().await;
            self.reset_detail().await;
            self.current_block_height.send_replace(Some(height));
            [
                self.info.request(height, None).await,
                self.block_receipts.request(height, None).await,
                self.transactions.request_initial_fetch(height).await,
                self.receipts.request_initial_fetch(height).await,
            ]
        };
        join_all(pending.iter_mut().map(|handle| handle.wait())).await;
    }

    /// Empty the detail view and forget the current height.
    pub async fn uninitialize_detail(&self) {
        let _detail = self.detail.lock().await;
        self.reset_detail().await;
    }

    async fn reset_detail(&self) {
        self.current_block_height.send_replace(None);
        clear_all(&[
            &self.info,
            &self.block_receipts,
            &self.transactions,
            &self.receipts,
        ])
        .await;
    }

    /// Open the block after the current one. Returns the height opened, or
    /// `None` if the current block is the chain tip or either height is
    /// unknown.
    pub async fn next_block(&self) -> Option<u64> {
        let current = self.current_block_height()?;
        let latest = self.chain.current_height().await?;
        let next = next_within(current, latest)?;
        self.fetch_block_info(next).await;
        Some(next)
    }

    /// Open the block before the current one. Returns the height opened, or
    /// `None` at height 1 or when no block is on display.
    pub async fn previous_block(&self) -> Option<u64> {
        let previous = previous_within(self.current_block_height()?)?;
        self.fetch_block_info(previous).await;
        Some(previous)
    }

    /// The first `n` timeline blocks.
    pub async fn recent_blocks(&self, n: usize) -> Vec<Block> {
        self.timeline.latest(n).await
    }

    /// Height of the block on display.
    #[must_use]
    pub fn current_block_height(&self) -> Option<u64> {
        *self.current_block_height.borrow()
    }

    /// Observe changes of the block on display.
    #[must_use]
    pub fn watch_current_block_height(&self) -> watch::Receiver<Option<u64>> {
        self.current_block_height.subscribe()
    }

    /// The block timeline.
    #[must_use]
    pub const fn timeline(&self) -> &Pagination<Block, u64> {
        &self.timeline
    }

    /// Full record of the block on display.
    #[must_use]
    pub const fn info(&self) -> &DataSet<u64, BlockInfo> {
        &self.info
    }

    /// Resolution statements of the block on display.
    #[must_use]
    pub const fn block_receipts(&self) -> &DataSet<u64, BlockReceipts> {
        &self.block_receipts
    }

    /// Transactions of the block on display.
    #[must_use]
    pub const fn transactions(&self) -> &Pagination<Transaction, String, TransactionFilter, u64> {
        &self.transactions
    }

    /// Receipts of the block on display.
    #[must_use]
    pub const fn receipts(&self) -> &Pagination<Receipt, String, ReceiptKind, u64> {
        &self.receipts
    }

    /// The new-block subscription.
    #[must_use]
    pub const fn subscription(&self) -> &SubscriptionAdapter<L> {
        &self.subscription
    }
}

impl<L: Listener<Notification = NewBlock>> StoreModule for BlockStore<L> {
    fn name(&self) -> &'static str {
        "block"
    }

    fn lock(&self) -> &LifecycleLock {
        &self.lock
    }

    fn initialize_page(&self) -> BoxFuture<'_, Result<(), StateError>> {
        Box::pin(async move {
            tokio::join!(self.chain.refresh(), self.timeline.initial_fetch(()));
            Ok(())
        })
    }

    fn subscribe(&self) -> BoxFuture<'_, Result<(), StateError>> {
        let source = Arc::clone(&self.source);
        let timeline = self.timeline.clone();
        let chain = Arc::clone(&self.chain);

        let on_new_block = move |NewBlock { height }: NewBlock| {
            let source = Arc::clone(&source);
            let timeline = timeline.clone();
            let chain = Arc::clone(&chain);
            log_failure("add_latest_block", async move {
                let block = source.block_by_height(height).await?;
                timeline.add_latest_item(block).await;
                chain.refresh().await;
                Ok::<_, FetchError>(())
            })
        };

        Box::pin(async move {
            self.subscription
                .subscribe(&self.endpoint, on_new_block)
                .await?;
            Ok(())
        })
    }

    fn unsubscribe(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.subscription.unsubscribe())
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            tokio::join!(self.uninitialize_detail(), self.timeline.uninitialize());
        })
    }
}
