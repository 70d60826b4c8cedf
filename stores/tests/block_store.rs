//! Block module end to end: timeline, live blocks, detail view, navigation.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use chrono::{DateTime, Utc};
use explorer_state_core::{FetchError, FetchFuture, Page, PageInfo};
use explorer_state_runtime::composition::StoreModule;
use explorer_state_runtime::{Phase, StateConfig};
use explorer_state_stores::records::{
    Block, BlockInfo, BlockReceipts, ChainInfo, NewBlock, Receipt, ReceiptKind, Transaction,
    TransactionFilter, TransactionKind,
};
use explorer_state_stores::{BlockSource, BlockStore, ChainSource, ChainStore};
use explorer_state_testing::{GatedSource, InMemoryListener, eventually, init_tracing};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

fn block(height: u64) -> Block {
    Block {
        height,
        hash: format!("{height:064X}"),
        timestamp: DateTime::from_timestamp(i64::try_from(height).unwrap() * 15, 0).unwrap(),
        signer: "HARVESTER".to_string(),
        transaction_count: 3,
    }
}

fn heights(blocks: &[Block]) -> Vec<u64> {
    blocks.iter().map(|block| block.height).collect()
}

/// In-memory node: blocks `1..=tip`, three transactions per block.
#[derive(Clone)]
struct Node {
    tip: Arc<AtomicU64>,
    list: GatedSource<PageInfo, Page<Block>>,
    info: GatedSource<u64, BlockInfo>,
}

impl Node {
    fn new(tip: u64, gated_info: bool) -> Self {
        let tip = Arc::new(AtomicU64::new(tip));
        let list = GatedSource::ready({
            let tip = Arc::clone(&tip);
            move |page: &PageInfo| {
                let newest = tip
                    .load(Ordering::SeqCst)
                    .saturating_sub(u64::from(page.page_number - 1) * u64::from(page.page_size));
                let items = (1..=newest)
                    .rev()
                    .take(page.page_size as usize)
                    .map(block)
                    .collect();
                Ok(Page::new(items, page.page_number, page.page_size))
            }
        });
        let describe = |height: &u64| {
            Ok(BlockInfo {
                block: block(*height),
                state_hash: format!("STATE{height}"),
                receipts_hash: format!("RECEIPTS{height}"),
                transactions_hash: format!("TXS{height}"),
                fee_multiplier: 100,
            })
        };
        let info = if gated_info {
            GatedSource::new(describe)
        } else {
            GatedSource::ready(describe)
        };
        Self { tip, list, info }
    }

    fn advance(&self) -> u64 {
        self.tip.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl ChainSource for Node {
    fn chain_info(&self) -> FetchFuture<ChainInfo> {
        let current_height = self.tip.load(Ordering::SeqCst);
        Box::pin(async move {
            Ok(ChainInfo {
                current_height,
                finalized_height: current_height.saturating_sub(2),
            })
        })
    }
}

impl BlockSource for Node {
    fn block_list(&self, page: PageInfo) -> FetchFuture<Page<Block>> {
        self.list.call(page)
    }

    fn block_by_height(&self, height: u64) -> FetchFuture<Block> {
        let tip = self.tip.load(Ordering::SeqCst);
        Box::pin(async move {
            if height == 0 || height > tip {
                Err(FetchError::NotFound(format!("block {height}")))
            } else {
                Ok(block(height))
            }
        })
    }

    fn block_info(&self, height: u64) -> FetchFuture<BlockInfo> {
        self.info.call(height)
    }

    fn block_receipts_info(&self, _height: u64) -> FetchFuture<BlockReceipts> {
        Box::pin(async { Ok(BlockReceipts::default()) })
    }

    fn block_transactions(
        &self,
        page: PageInfo,
        filter: TransactionFilter,
        height: u64,
    ) -> FetchFuture<Page<Transaction>> {
        let kinds = [
            TransactionKind::Transfer,
            TransactionKind::Mosaic,
            TransactionKind::Transfer,
        ];
        let items = kinds
            .into_iter()
            .enumerate()
            .map(|(index, kind)| Transaction {
                hash: format!("{height}-{index}"),
                height,
                kind,
                signer: "SENDER".to_string(),
                deadline: DateTime::<Utc>::UNIX_EPOCH,
            })
            .filter(|transaction| filter.matches(transaction))
            .collect();
        Box::pin(async move { Ok(Page::new(items, page.page_number, page.page_size)) })
    }

    fn block_receipts(
        &self,
        page: PageInfo,
        kind: ReceiptKind,
        height: u64,
    ) -> FetchFuture<Page<Receipt>> {
        let receipt = Receipt {
            id: format!("{height}-0-0"),
            height,
            kind,
            target: "ACCOUNT".to_string(),
            amount: Some(10),
        };
        Box::pin(async move { Ok(Page::new(vec![receipt], page.page_number, page.page_size)) })
    }
}

struct Fixture {
    node: Node,
    listener: InMemoryListener<NewBlock>,
    chain: Arc<ChainStore>,
    store: Arc<BlockStore<InMemoryListener<NewBlock>>>,
}

fn config() -> StateConfig {
    StateConfig::new("http://localhost:3000".parse().unwrap())
}

fn fixture(tip: u64, gated_info: bool) -> Fixture {
    init_tracing();
    let node = Node::new(tip, gated_info);
    let listener = InMemoryListener::new();
    let chain = Arc::new(ChainStore::new(node.clone()));
    let store = BlockStore::new(&config(), node.clone(), listener.clone(), Arc::clone(&chain))
        .unwrap();
    Fixture {
        node,
        listener,
        chain,
        store: Arc::new(store),
    }
}

#[tokio::test]
async fn initialize_loads_chain_and_timeline_then_subscribes() {
    let f = fixture(25, false);

    f.store.initialize().await.unwrap();

    assert_eq!(f.chain.current_height().await, Some(25));
    assert_eq!(
        heights(&f.store.timeline().items().await),
        (16..=25).rev().collect::<Vec<_>>()
    );
    assert_eq!(heights(&f.store.recent_blocks(4).await), vec![25, 24, 23, 22]);
    assert_eq!(f.listener.endpoints(), vec![config().endpoint().unwrap()]);
    assert!(f.store.subscription().is_subscribed().await);
}

#[tokio::test]
async fn concurrent_initialize_runs_once() {
    let f = fixture(25, false);

    let (first, second) = tokio::join!(f.store.initialize(), f.store.initialize());
    first.unwrap();
    second.unwrap();

    assert_eq!(f.node.list.call_count(), 1);
    assert_eq!(f.listener.open_count(), 1);
}

#[tokio::test]
async fn new_block_is_prepended_and_chain_refreshed() {
    let f = fixture(25, false);
    f.store.initialize().await.unwrap();

    let height = f.node.advance();
    assert!(f.listener.push(NewBlock { height }));

    eventually(|| async { f.chain.current_height().await == Some(26) }).await;
    assert_eq!(heights(&f.store.recent_blocks(3).await), vec![26, 25, 24]);
    assert_eq!(f.store.timeline().items().await.len(), 11);
}

#[tokio::test]
async fn block_that_fails_to_load_is_skipped() {
    let f = fixture(25, false);
    f.store.initialize().await.unwrap();

    assert!(f.listener.push(NewBlock { height: 99 }));
    let height = f.node.advance();
    assert!(f.listener.push(NewBlock { height }));

    eventually(|| async { f.chain.current_height().await == Some(26) }).await;
    let timeline = heights(&f.store.timeline().items().await);
    assert_eq!(timeline[0], 26);
    assert!(!timeline.contains(&99));
    assert!(f.store.subscription().is_subscribed().await);
}

#[tokio::test]
async fn fetch_block_info_loads_whole_detail_view() {
    let f = fixture(25, false);

    f.store.fetch_block_info(20).await;

    assert_eq!(f.store.current_block_height(), Some(20));
    assert_eq!(
        f.store.info().data().await.map(|info| info.block.height),
        Some(20)
    );
    assert_eq!(f.store.block_receipts().data().await, Some(BlockReceipts::default()));
    assert_eq!(f.store.transactions().items().await.len(), 3);
    assert!(f.store.transactions().is_last_page().await);

    let receipts = f.store.receipts().items().await;
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].kind, ReceiptKind::BalanceChange);
}

#[tokio::test]
async fn detail_filters_reuse_current_height() {
    let f = fixture(25, false);
    f.store.fetch_block_info(20).await;

    f.store.transactions().select_filter(1).await;
    f.store.receipts().select_filter(2).await;

    let transactions = f.store.transactions().items().await;
    assert_eq!(transactions.len(), 2);
    assert!(transactions.iter().all(|t| t.kind == TransactionKind::Transfer && t.height == 20));
    let receipts = f.store.receipts().items().await;
    assert_eq!(receipts[0].kind, ReceiptKind::Inflation);
    assert_eq!(receipts[0].height, 20);
}

#[tokio::test]
async fn opening_another_block_replaces_detail_view() {
    let f = fixture(25, false);
    f.store.fetch_block_info(20).await;
    f.store.transactions().select_filter(1).await;

    f.store.fetch_block_info(21).await;

    assert_eq!(f.store.current_block_height(), Some(21));
    assert_eq!(f.store.transactions().filter().await, TransactionFilter::All);
    let transactions = f.store.transactions().items().await;
    assert_eq!(transactions.len(), 3);
    assert!(transactions.iter().all(|t| t.height == 21));
}

#[tokio::test]
async fn navigation_stays_within_chain() {
    let f = fixture(25, false);
    f.chain.refresh().await;

    assert_eq!(f.store.next_block().await, None);
    assert_eq!(f.store.previous_block().await, None);

    f.store.fetch_block_info(25).await;
    assert_eq!(f.store.next_block().await, None);
    assert_eq!(f.store.previous_block().await, Some(24));
    assert_eq!(
        f.store.info().data().await.map(|info| info.block.height),
        Some(24)
    );
    assert_eq!(f.store.next_block().await, Some(25));

    f.store.fetch_block_info(1).await;
    assert_eq!(f.store.previous_block().await, None);
    assert_eq!(f.store.current_block_height(), Some(1));
}

#[tokio::test]
async fn next_block_needs_chain_info() {
    let f = fixture(25, false);

    f.store.fetch_block_info(10).await;

    assert_eq!(f.store.next_block().await, None);
    assert_eq!(f.store.current_block_height(), Some(10));
}

#[tokio::test]
async fn rapid_navigation_shows_last_requested_block() {
    let f = fixture(25, true);

    let first = tokio::spawn({
        let store = Arc::clone(&f.store);
        async move { store.fetch_block_info(5).await }
    });
    f.node.info.wait_for_calls(1).await;

    let second = tokio::spawn({
        let store = Arc::clone(&f.store);
        async move { store.fetch_block_info(6).await }
    });
    f.node.info.wait_for_calls(2).await;

    f.node.info.release(1);
    second.await.unwrap();
    f.node.info.release(0);
    first.await.unwrap();

    assert_eq!(f.store.current_block_height(), Some(6));
    let info = f.store.info().snapshot().await;
    assert_eq!(info.data.map(|info| info.block.height), Some(6));
    assert!(!info.loading);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_opens_never_mix_heights() {
    let f = fixture(25, false);

    let opens: Vec<_> = (1..=20)
        .map(|height| {
            let store = Arc::clone(&f.store);
            tokio::spawn(async move { store.fetch_block_info(height).await })
        })
        .collect();
    for open in opens {
        open.await.unwrap();
    }

    let height = f.store.current_block_height().unwrap();
    assert_eq!(
        f.store.info().data().await.map(|info| info.block.height),
        Some(height)
    );
    let transactions = f.store.transactions().items().await;
    assert_eq!(transactions.len(), 3);
    assert!(transactions.iter().all(|t| t.height == height));
    let receipts = f.store.receipts().items().await;
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].height, height);
}

#[tokio::test]
async fn uninitialize_unsubscribes_and_clears() {
    let f = fixture(25, false);
    f.store.initialize().await.unwrap();
    f.store.fetch_block_info(20).await;

    f.store.uninitialize().await.unwrap();

    assert!(!f.listener.push(NewBlock { height: 26 }));
    assert_eq!(f.listener.close_count(), 1);
    assert!(f.store.timeline().items().await.is_empty());
    assert_eq!(f.store.current_block_height(), None);
    assert_eq!(f.store.info().data().await, None);
    assert!(f.store.transactions().items().await.is_empty());
    assert_eq!(f.store.lock().phase(), Phase::Idle);
}

#[tokio::test]
async fn refused_subscription_leaves_module_uninitialized() {
    let f = fixture(25, false);
    f.listener.refuse_connections("node offline");

    assert!(f.store.initialize().await.is_err());
    assert!(!f.store.lock().is_initialized());
    assert!(f.store.timeline().items().await.is_empty());

    f.listener.accept_connections();
    f.store.initialize().await.unwrap();
    assert!(f.store.lock().is_initialized());
    assert_eq!(f.node.list.call_count(), 2);
}
