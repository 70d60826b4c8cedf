//! Module lifecycle through the composition helpers.

#![allow(clippy::unwrap_used)] // Tests can unwrap

use explorer_state_core::{FetchError, KeySelector, Page, PageInfo};
use explorer_state_runtime::composition::{self, StoreModule, clear_all};
use explorer_state_runtime::{
    DataSet, LifecycleLock, Pagination, PaginationConfig, Phase, StateError,
};
use explorer_state_testing::{GatedSource, init_tracing};
use futures::future::BoxFuture;
use std::sync::Arc;

struct AccountModule {
    lock: LifecycleLock,
    list: Pagination<String, String>,
    info: DataSet<String, u64>,
}

impl AccountModule {
    fn new(source: &GatedSource<u32, Page<String>>) -> Self {
        Self {
            lock: LifecycleLock::new("account"),
            list: Pagination::new(
                "accounts",
                source.page_fetcher(|page: PageInfo, (): (), (): ()| page.page_number),
                KeySelector::new("address", String::clone),
                PaginationConfig::new(2),
            ),
            info: DataSet::new("account_info", |address: String| async move {
                if address.is_empty() {
                    Err(FetchError::NotFound("empty address".to_string()))
                } else {
                    Ok(address.len() as u64)
                }
            }),
        }
    }
}

impl StoreModule for AccountModule {
    fn name(&self) -> &'static str {
        "account"
    }

    fn lock(&self) -> &LifecycleLock {
        &self.lock
    }

    fn initialize_page(&self) -> BoxFuture<'_, Result<(), StateError>> {
        Box::pin(async move {
            self.list.initial_fetch(()).await;
            Ok(())
        })
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { clear_all(&[&self.list, &self.info]).await })
    }
}

fn accounts(page: &u32) -> Result<Page<String>, FetchError> {
    Ok(Page::new(
        vec![format!("TA{page}"), format!("TB{page}")],
        *page,
        2,
    ))
}

#[tokio::test]
async fn concurrent_initialize_fetches_once() {
    init_tracing();
    let source = GatedSource::new(accounts);
    let module = Arc::new(AccountModule::new(&source));

    let first = tokio::spawn({
        let module = Arc::clone(&module);
        async move { composition::initialize(module.as_ref()).await }
    });
    let second = tokio::spawn({
        let module = Arc::clone(&module);
        async move { composition::initialize(module.as_ref()).await }
    });

    source.wait_for_calls(1).await;
    assert_eq!(module.lock.phase(), Phase::Initializing);
    source.release(0);

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(source.call_count(), 1);
    assert_eq!(module.list.items().await, vec!["TA1", "TB1"]);
    assert!(module.lock.is_initialized());
}

#[tokio::test]
async fn uninitialize_waits_for_pending_initialize() {
    init_tracing();
    let source = GatedSource::new(accounts);
    let module = Arc::new(AccountModule::new(&source));

    let init = tokio::spawn({
        let module = Arc::clone(&module);
        async move { composition::initialize(module.as_ref()).await }
    });
    source.wait_for_calls(1).await;

    let uninit = tokio::spawn({
        let module = Arc::clone(&module);
        async move { composition::uninitialize(module.as_ref()).await }
    });
    tokio::task::yield_now().await;
    assert!(!uninit.is_finished());

    source.release(0);
    init.await.unwrap().unwrap();
    uninit.await.unwrap().unwrap();

    assert_eq!(module.lock.phase(), Phase::Idle);
    assert!(module.list.items().await.is_empty());
}

#[tokio::test]
async fn reinitialize_after_uninitialize_fetches_again() {
    init_tracing();
    let source = GatedSource::ready(accounts);
    let module = AccountModule::new(&source);

    composition::initialize(&module).await.unwrap();
    module.info.fetch("TA1".to_string()).await;
    assert_eq!(module.info.data().await, Some(3));

    composition::uninitialize(&module).await.unwrap();
    assert_eq!(module.info.data().await, None);

    composition::initialize(&module).await.unwrap();
    assert_eq!(source.call_count(), 2);
    assert_eq!(module.list.items().await.len(), 2);
}

#[tokio::test]
async fn fetch_failure_is_flagged_not_returned() {
    init_tracing();
    let source = GatedSource::ready(accounts);
    let module = AccountModule::new(&source);

    composition::initialize(&module).await.unwrap();
    module.info.fetch(String::new()).await;

    let state = module.info.snapshot().await;
    assert!(state.error);
    assert!(!state.loading);
    assert_eq!(state.data, None);
    assert!(module.lock.is_initialized());
}
