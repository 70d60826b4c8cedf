//! Streaming subscription seam.
//!
//! The node pushes notifications (new blocks, confirmed transactions) over a
//! streaming connection. A [`Listener`] opens that connection and hands back
//! a [`Subscription`]: the notification stream plus the [`Connection`] that
//! must be closed on teardown. Both halves are released on unsubscribe.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  open(endpoint)  ┌──────────────┐
//! │ Adapter  │ ───────────────> │   Listener   │
//! └────┬─────┘                  └──────┬───────┘
//!      │       Subscription            │
//!      │ <─────────────────────────────┘
//!      │   notifications ──> on_event ──> Pagination::add_latest_item
//!      │   connection    ──> close() on unsubscribe
//! ```

use futures::Stream;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use thiserror::Error;
use url::Url;

/// Errors from the streaming transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The streaming connection could not be opened
    #[error("Connection to '{endpoint}' failed: {reason}")]
    Connect {
        /// The endpoint that refused the connection
        endpoint: String,
        /// The reason for failure
        reason: String,
    },

    /// The connection was closed by the remote side
    #[error("Subscription closed")]
    Closed,

    /// A push message could not be decoded
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The endpoint URL cannot be used for streaming
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Stream of decoded push notifications.
pub type NotificationStream<N> =
    Pin<Box<dyn Stream<Item = Result<N, SubscriptionError>> + Send>>;

/// The transport half of a subscription.
pub trait Connection: Send + Sync {
    /// Close the underlying transport. Called at most once.
    fn close(self: Box<Self>);
}

/// An open subscription: the event registration and its transport.
pub struct Subscription<N> {
    /// Push notifications in arrival order
    pub notifications: NotificationStream<N>,
    /// Transport to close on unsubscribe
    pub connection: Box<dyn Connection>,
}

impl<N> Subscription<N> {
    /// Pair a notification stream with its connection.
    #[must_use]
    pub fn new(notifications: NotificationStream<N>, connection: Box<dyn Connection>) -> Self {
        Self {
            notifications,
            connection,
        }
    }
}

impl<N> fmt::Debug for Subscription<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Opens streaming subscriptions.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one listener is shared by the
/// subscription adapter and the task driving the notification stream.
///
/// # Example
///
/// ```rust,ignore
/// let subscription = listener.open(&endpoint).await?;
/// while let Some(notification) = subscription.notifications.next().await {
///     handle(notification?);
/// }
/// subscription.connection.close();
/// ```
pub trait Listener: Send + Sync + 'static {
    /// Notification type carried by the stream
    type Notification: Send + 'static;

    /// Open a streaming connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::Connect`] if the connection cannot be established.
    fn open(
        &self,
        endpoint: &Endpoint,
    ) -> BoxFuture<'_, Result<Subscription<Self::Notification>, SubscriptionError>>;
}

/// Streaming endpoint of a node (`ws://` or `wss://`).
///
/// # Examples
///
/// ```
/// use explorer_state_core::Endpoint;
/// use url::Url;
///
/// let node = Url::parse("https://node.example.org:3001").unwrap();
/// let endpoint = Endpoint::from_node_url(&node).unwrap();
/// assert_eq!(endpoint.as_str(), "wss://node.example.org:3001/ws");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Use `url` as is. It must already be a `ws`/`wss` URL.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::InvalidEndpoint`] for any other scheme.
    pub fn new(url: Url) -> Result<Self, SubscriptionError> {
        match url.scheme() {
            "ws" | "wss" => Ok(Self(url)),
            other => Err(SubscriptionError::InvalidEndpoint(format!(
                "unsupported scheme '{other}' in {url}"
            ))),
        }
    }

    /// Derive the streaming endpoint from a REST node URL:
    /// `http` becomes `ws`, `https` becomes `wss`, and `/ws` is appended to the path.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::InvalidEndpoint`] if `node` is not an http(s) URL.
    pub fn from_node_url(node: &Url) -> Result<Self, SubscriptionError> {
        let scheme = match node.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => {
                return Err(SubscriptionError::InvalidEndpoint(format!(
                    "node URL must be http or https, got '{other}'"
                )));
            },
        };

        let mut url = node.clone();
        url.set_scheme(scheme).map_err(|()| {
            SubscriptionError::InvalidEndpoint(format!("cannot switch {node} to {scheme}"))
        })?;
        let path = format!("{}/ws", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self(url))
    }

    /// The endpoint URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
