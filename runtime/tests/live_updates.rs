//! Push notifications spliced into paginated lists.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use explorer_state_core::{Endpoint, KeySelector, Page, PageInfo};
use explorer_state_runtime::{Pagination, PaginationConfig, SubscriptionAdapter};
use explorer_state_testing::{GatedSource, InMemoryListener, init_tracing, wait_until};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Block {
    height: u64,
    hash: String,
}

fn block(height: u64) -> Block {
    Block {
        height,
        hash: format!("{height:064X}"),
    }
}

fn heights(blocks: &[Block]) -> Vec<u64> {
    blocks.iter().map(|block| block.height).collect()
}

fn endpoint() -> Endpoint {
    Endpoint::from_node_url(&"http://localhost:3000".parse().unwrap()).unwrap()
}

fn timeline(source: &GatedSource<u32, Page<Block>>) -> Pagination<Block, u64> {
    Pagination::new(
        "timeline",
        source.page_fetcher(|page: PageInfo, (): (), (): ()| page.page_number),
        KeySelector::new("height", |block: &Block| block.height),
        PaginationConfig::new(3),
    )
}

/// Forward every pushed block to `timeline`, counting handled notifications.
fn forward_to(
    timeline: &Pagination<Block, u64>,
    handled: &Arc<AtomicUsize>,
) -> impl Fn(Block) -> futures::future::BoxFuture<'static, ()> + Send + Sync + 'static {
    let timeline = timeline.clone();
    let handled = Arc::clone(handled);
    move |block| {
        let timeline = timeline.clone();
        let handled = Arc::clone(&handled);
        Box::pin(async move {
            timeline.add_latest_item(block).await;
            handled.fetch_add(1, Ordering::SeqCst);
        })
    }
}

#[tokio::test]
async fn pushed_block_during_initial_fetch_stays_first() {
    init_tracing();
    let source = GatedSource::new(|_page: &u32| {
        Ok(Page::new(vec![block(99), block(98), block(97)], 1, 3))
    });
    let timeline = timeline(&source);
    let listener = InMemoryListener::new();
    let adapter = SubscriptionAdapter::new("block", listener.clone());
    let handled = Arc::new(AtomicUsize::new(0));

    adapter
        .subscribe(&endpoint(), forward_to(&timeline, &handled))
        .await
        .unwrap();

    let fetch = tokio::spawn({
        let timeline = timeline.clone();
        async move { timeline.initial_fetch(()).await }
    });
    source.wait_for_calls(1).await;

    listener.push(block(100));
    wait_until(|| handled.load(Ordering::SeqCst) == 1).await;

    source.release(0);
    fetch.await.unwrap();

    assert_eq!(heights(&timeline.items().await), vec![100, 99, 98, 97]);
    adapter.unsubscribe().await;
}

#[tokio::test]
async fn pushed_block_also_in_page_is_not_duplicated() {
    init_tracing();
    let source = GatedSource::new(|_page: &u32| {
        Ok(Page::new(vec![block(100), block(99), block(98)], 1, 3))
    });
    let timeline = timeline(&source);
    let listener = InMemoryListener::new();
    let adapter = SubscriptionAdapter::new("block", listener.clone());
    let handled = Arc::new(AtomicUsize::new(0));

    adapter
        .subscribe(&endpoint(), forward_to(&timeline, &handled))
        .await
        .unwrap();

    let fetch = tokio::spawn({
        let timeline = timeline.clone();
        async move { timeline.initial_fetch(()).await }
    });
    source.wait_for_calls(1).await;

    listener.push(block(100));
    wait_until(|| handled.load(Ordering::SeqCst) == 1).await;
    source.release(0);
    fetch.await.unwrap();

    assert_eq!(heights(&timeline.items().await), vec![100, 99, 98]);
}

#[tokio::test]
async fn pushed_block_after_page_moves_to_front() {
    init_tracing();
    let source = GatedSource::ready(|_page: &u32| {
        Ok(Page::new(vec![block(100), block(99), block(98)], 1, 3))
    });
    let timeline = timeline(&source);
    let listener = InMemoryListener::new();
    let adapter = SubscriptionAdapter::new("block", listener.clone());
    let handled = Arc::new(AtomicUsize::new(0));

    timeline.initial_fetch(()).await;
    adapter
        .subscribe(&endpoint(), forward_to(&timeline, &handled))
        .await
        .unwrap();

    listener.push(block(101));
    listener.push(block(100));
    wait_until(|| handled.load(Ordering::SeqCst) == 2).await;

    assert_eq!(heights(&timeline.items().await), vec![100, 101, 99, 98]);
}

#[tokio::test]
async fn notifications_after_unsubscribe_are_not_applied() {
    init_tracing();
    let source = GatedSource::ready(|_page: &u32| Ok(Page::new(vec![block(5)], 1, 3)));
    let timeline = timeline(&source);
    let listener = InMemoryListener::new();
    let adapter = SubscriptionAdapter::new("block", listener.clone());
    let handled = Arc::new(AtomicUsize::new(0));

    timeline.initial_fetch(()).await;
    adapter
        .subscribe(&endpoint(), forward_to(&timeline, &handled))
        .await
        .unwrap();
    adapter.unsubscribe().await;

    assert!(!listener.push(block(6)));
    assert_eq!(heights(&timeline.items().await), vec![5]);
    assert_eq!(listener.close_count(), 1);
    assert_eq!(listener.endpoints(), vec![endpoint()]);
}
