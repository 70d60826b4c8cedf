//! The harness pieces used together, as the manager tests use them.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use explorer_state_core::{Endpoint, FetchError, Listener, Page, PageFetcher, PageInfo};
use explorer_state_testing::{GatedSource, InMemoryListener, init_tracing, wait_until};
use futures::StreamExt;
use std::sync::{Arc, Mutex};

#[tokio::test]
async fn page_fetcher_sees_filter_and_context() {
    init_tracing();
    let source = GatedSource::ready(|request: &(u32, bool, u64)| {
        let (page, only_transfers, height) = *request;
        Ok(Page::new(vec![height; usize::from(!only_transfers) + 1], page, 2))
    });
    let fetcher = source.page_fetcher(|page: PageInfo, only_transfers: bool, height: u64| {
        (page.page_number, only_transfers, height)
    });

    let all = fetcher.fetch_page(PageInfo::first(2), false, 40).await.unwrap();
    let transfers = fetcher
        .fetch_page(PageInfo::first(2).next(), true, 40)
        .await
        .unwrap();

    assert_eq!(all.items, vec![40, 40]);
    assert!(transfers.ends_list());
    assert_eq!(source.calls(), vec![(1, false, 40), (2, true, 40)]);
}

#[tokio::test]
async fn responses_complete_in_release_order() {
    init_tracing();
    let source = GatedSource::new(|height: &u64| {
        if *height == 0 {
            Err(FetchError::NotFound("block 0".to_string()))
        } else {
            Ok(*height)
        }
    });
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = Vec::new();
    for height in [0_u64, 1, 2] {
        let call = source.call(height);
        let order = Arc::clone(&order);
        tasks.push(tokio::spawn(async move {
            let result = call.await;
            order.lock().unwrap().push((height, result.is_ok()));
        }));
    }

    source.release(2);
    wait_until(|| order.lock().unwrap().len() == 1).await;
    source.release_all();
    for task in tasks {
        task.await.unwrap();
    }

    let order = order.lock().unwrap().clone();
    assert_eq!(order[0], (2, true));
    assert!(order.contains(&(0, false)));
    assert!(order.contains(&(1, true)));
}

#[tokio::test]
async fn reopened_listener_delivers_to_new_connection_only() {
    init_tracing();
    let listener = InMemoryListener::new();
    let endpoint = Endpoint::from_node_url(&"https://node.test:3001".parse().unwrap()).unwrap();

    let first = listener.open(&endpoint).await.unwrap();
    first.connection.close();
    let second = listener.open(&endpoint).await.unwrap();
    let mut notifications = second.notifications;

    assert!(listener.push("block 7"));
    assert_eq!(notifications.next().await, Some(Ok("block 7")));
    assert_eq!(listener.open_count(), 2);
    assert_eq!(listener.close_count(), 1);
    assert_eq!(endpoint.as_str(), "wss://node.test:3001/ws");
}
