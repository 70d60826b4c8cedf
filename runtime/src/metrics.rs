//! Prometheus metrics for the state managers.
//!
//! Every manager reports through the `metrics` facade under the
//! `explorer_state_` prefix:
//! - Store reductions and reducer latency
//! - Fetches issued, failed and discarded as stale
//! - Live prepends
//! - Lifecycle transitions
//! - Push subscriptions opened and closed
//!
//! Without an installed recorder the macros are no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use explorer_state_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! if let Some(text) = server.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Actions reduced, labelled by `store`.
pub const REDUCTIONS_TOTAL: &str = "explorer_state_reductions_total";
/// Reducer latency, labelled by `store`.
pub const REDUCER_DURATION: &str = "explorer_state_reducer_duration_seconds";
/// Fetches issued, labelled by `manager`.
pub const FETCHES_TOTAL: &str = "explorer_state_fetches_total";
/// Fetches that failed, labelled by `manager`.
pub const FETCH_FAILURES_TOTAL: &str = "explorer_state_fetch_failures_total";
/// Results discarded because a newer request superseded them, labelled by `manager`.
pub const STALE_DISCARDS_TOTAL: &str = "explorer_state_stale_discards_total";
/// Records live-prepended to a list, labelled by `manager`.
pub const LIVE_PREPENDS_TOTAL: &str = "explorer_state_live_prepends_total";
/// Lifecycle transitions started, labelled by `module` and `transition`.
pub const LIFECYCLE_TRANSITIONS_TOTAL: &str = "explorer_state_lifecycle_transitions_total";
/// Push subscriptions opened, labelled by `module`.
pub const SUBSCRIPTIONS_OPENED_TOTAL: &str = "explorer_state_subscriptions_opened_total";
/// Push subscriptions closed, labelled by `module`.
pub const SUBSCRIPTIONS_CLOSED_TOTAL: &str = "explorer_state_subscriptions_closed_total";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus exporter for the state metrics.
///
/// Installs the global recorder and renders the text exposition. Serving the
/// text over HTTP is left to the embedding application.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create an exporter for the given scrape address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be built or installed. An
    /// already installed recorder is not an error.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Scrape address this exporter was created for.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this instance did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(REDUCTIONS_TOTAL, "Total number of actions reduced by manager stores");
    describe_histogram!(REDUCER_DURATION, "Time taken to reduce one action");
    describe_counter!(FETCHES_TOTAL, "Total number of fetches issued to the data source");
    describe_counter!(FETCH_FAILURES_TOTAL, "Total number of fetches that failed");
    describe_counter!(
        STALE_DISCARDS_TOTAL,
        "Total number of results discarded because a newer request superseded them"
    );
    describe_counter!(LIVE_PREPENDS_TOTAL, "Total number of pushed records prepended to lists");
    describe_counter!(
        LIFECYCLE_TRANSITIONS_TOTAL,
        "Total number of initialize/uninitialize transitions started"
    );
    describe_counter!(SUBSCRIPTIONS_OPENED_TOTAL, "Total number of push subscriptions opened");
    describe_counter!(SUBSCRIPTIONS_CLOSED_TOTAL, "Total number of push subscriptions closed");
}
