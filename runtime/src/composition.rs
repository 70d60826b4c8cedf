//! Store module composition.
//!
//! A store module (block, namespace, mosaic) owns one [`LifecycleLock`] and a
//! handful of DataSets and Paginations. Implementing [`StoreModule`] gives it
//! the uniform lifecycle:
//!
//! - [`initialize`]: through the lock, load the first page(s), then subscribe.
//! - [`uninitialize`]: through the lock, unsubscribe, then clear every manager.
//!
//! The free functions here also cover the navigation guards and the
//! fire-and-forget logging used by detail views.

use crate::{LifecycleLock, StateError};
use futures::future::{BoxFuture, join_all};
use std::fmt::Display;
use std::future::Future;

/// A manager that can be reset to its empty state.
pub trait Clearable: Send + Sync {
    /// Manager name for logs.
    fn manager_name(&self) -> &'static str;

    /// Reset to the empty state, discarding results still in flight.
    fn clear(&self) -> BoxFuture<'_, ()>;
}

/// Clear several managers concurrently.
pub async fn clear_all(managers: &[&dyn Clearable]) {
    tracing::debug!(
        managers = ?managers.iter().map(|m| m.manager_name()).collect::<Vec<_>>(),
        "Clearing managers"
    );
    join_all(managers.iter().map(|manager| manager.clear())).await;
}

/// A store module with a uniform lifecycle.
///
/// # Example
///
/// ```ignore
/// impl StoreModule for NamespaceStore {
///     fn name(&self) -> &'static str { "namespace" }
///     fn lock(&self) -> &LifecycleLock { &self.lock }
///
///     fn initialize_page(&self) -> BoxFuture<'_, Result<(), StateError>> {
///         Box::pin(async move {
///             self.list.initial_fetch(()).await;
///             Ok(())
///         })
///     }
///
///     fn clear(&self) -> BoxFuture<'_, ()> {
///         Box::pin(async move { clear_all(&[&self.list, &self.info]).await })
///     }
/// }
/// ```
pub trait StoreModule: Send + Sync {
    /// Module name for logs.
    fn name(&self) -> &'static str;

    /// The lock gating this module's transitions.
    fn lock(&self) -> &LifecycleLock;

    /// Kick off the module's first fetches.
    fn initialize_page(&self) -> BoxFuture<'_, Result<(), StateError>>;

    /// Open the module's push subscription. Modules without one keep the default.
    fn subscribe(&self) -> BoxFuture<'_, Result<(), StateError>> {
        Box::pin(async { Ok(()) })
    }

    /// Close the module's push subscription. Must be idempotent.
    fn unsubscribe(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    /// Clear every manager and any detail-view state.
    fn clear(&self) -> BoxFuture<'_, ()>;
}

/// Initialize `module` through its lock: first page(s), then subscription.
///
/// # Errors
///
/// Returns the first failing step's error. Whatever the routine already
/// loaded or opened is torn down, the module stays uninitialized, and a later
/// call retries the whole routine.
pub async fn initialize<M>(module: &M) -> Result<(), StateError>
where
    M: StoreModule + ?Sized,
{
    module
        .lock()
        .initialize(|| async {
            let result = match module.initialize_page().await {
                Ok(()) => module.subscribe().await,
                Err(error) => Err(error),
            };
            if let Err(error) = &result {
                tracing::warn!(module = module.name(), %error, "Initialize failed, rolling back");
                module.unsubscribe().await;
                module.clear().await;
            }
            result
        })
        .await
}

/// Uninitialize `module` through its lock: unsubscribe, then clear.
///
/// # Errors
///
/// Only [`StateError::Cancelled`] if the driving task was dropped; teardown
/// itself cannot fail.
pub async fn uninitialize<M>(module: &M) -> Result<(), StateError>
where
    M: StoreModule + ?Sized,
{
    module
        .lock()
        .uninitialize(|| async {
            module.unsubscribe().await;
            module.clear().await;
            Ok(())
        })
        .await
}

/// The key after `current`, unless that passes `latest`.
#[must_use]
pub fn next_within(current: u64, latest: u64) -> Option<u64> {
    (current < latest).then(|| current + 1)
}

/// The key before `current`, unless that drops below 1.
#[must_use]
pub fn previous_within(current: u64) -> Option<u64> {
    (current > 1).then(|| current - 1)
}

/// Run a fallible action and log its failure instead of returning it.
pub async fn log_failure<Fut, E>(action: &'static str, fut: Fut)
where
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    if let Err(error) = fut.await {
        tracing::error!(action, %error, "Action failed");
    }
}
