//! # Explorer State Testing
//!
//! Testing utilities for the explorer state managers.
//!
//! This crate provides:
//! - [`ReducerTest`]: Given-When-Then harness for reducers
//! - [`GatedSource`]: fetch source whose responses complete when the test says so
//! - [`InMemoryListener`]: push transport driven by the test
//! - [`init_tracing`], [`wait_until`] and [`eventually`] helpers
//!
//! ## Example
//!
//! ```ignore
//! use explorer_state_testing::{GatedSource, init_tracing};
//!
//! #[tokio::test]
//! async fn slow_first_response_is_discarded() {
//!     init_tracing();
//!     let source = GatedSource::new(|height: &u64| Ok(*height));
//!     let info = DataSet::new("info", source.fetcher());
//!
//!     // ...issue fetch(1) and fetch(2), release 1 then 0...
//!
//!     assert_eq!(info.data().await, Some(2));
//! }
//! ```

use std::future::Future;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// In-memory push transport
pub mod listener;


/// Scripted and gated fetch sources
pub mod sources;

pub use listener::InMemoryListener;
pub use reducer_test::{ReducerTest, assertions};
pub use sources::GatedSource;

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG` and defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within five seconds.
#[allow(clippy::panic)] // Test helper
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5 seconds"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Poll the async `condition` until it holds.
///
/// # Panics
///
/// Panics if the condition does not hold within five seconds.
#[allow(clippy::panic)] // Test helper
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5 seconds"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn wait_until_returns_once_condition_holds() {
        init_tracing();
        let ticks = Arc::new(AtomicUsize::new(0));

        let background = Arc::clone(&ticks);
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(1)).await;
                background.fetch_add(1, Ordering::SeqCst);
            }
        });

        wait_until(|| ticks.load(Ordering::SeqCst) == 3).await;
    }

    #[tokio::test]
    async fn eventually_awaits_async_condition() {
        let value = Arc::new(tokio::sync::Mutex::new(0));

        let background = Arc::clone(&value);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            *background.lock().await = 7;
        });

        eventually(|| {
            let value = Arc::clone(&value);
            async move { *value.lock().await == 7 }
        })
        .await;
    }
}
