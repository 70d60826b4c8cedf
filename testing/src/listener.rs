//! In-memory push transport.

use explorer_state_core::{
    Connection, Endpoint, Listener, NotificationStream, Subscription, SubscriptionError,
};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

type Notify<N> = mpsc::UnboundedSender<Result<N, SubscriptionError>>;

struct Inner<N> {
    current: Mutex<Option<Notify<N>>>,
    refusal: Mutex<Option<String>>,
    endpoints: Mutex<Vec<Endpoint>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// A [`Listener`] whose notifications are pushed by the test.
///
/// Clones share one transport: the test keeps a clone to push notifications
/// into whichever connection is currently open.
///
/// # Example
///
/// ```ignore
/// let listener = InMemoryListener::new();
/// let adapter = SubscriptionAdapter::new("block", listener.clone());
///
/// adapter.subscribe(&endpoint, handler).await?;
/// listener.push(block(100));
/// ```
pub struct InMemoryListener<N> {
    inner: Arc<Inner<N>>,
}

impl<N> Clone for InMemoryListener<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N> Default for InMemoryListener<N> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                current: Mutex::new(None),
                refusal: Mutex::new(None),
                endpoints: Mutex::new(Vec::new()),
                opened: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }),
        }
    }
}

impl<N> InMemoryListener<N> {
    /// A listener accepting connections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a notification on the open connection. Returns `false` if no
    /// connection is open.
    pub fn push(&self, notification: N) -> bool {
        self.send(Ok(notification))
    }

    /// Deliver a transport error on the open connection.
    pub fn push_error(&self, error: SubscriptionError) -> bool {
        self.send(Err(error))
    }

    fn send(&self, item: Result<N, SubscriptionError>) -> bool {
        lock(&self.inner.current)
            .as_ref()
            .is_some_and(|sender| sender.send(item).is_ok())
    }

    /// Make every following `open` fail with `reason`.
    pub fn refuse_connections(&self, reason: impl Into<String>) {
        *lock(&self.inner.refusal) = Some(reason.into());
    }

    /// Accept connections again.
    pub fn accept_connections(&self) {
        *lock(&self.inner.refusal) = None;
    }

    /// Whether a connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        lock(&self.inner.current).is_some()
    }

    /// Number of successful opens.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    /// Number of closed connections.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Endpoints of every successful open, in order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        lock(&self.inner.endpoints).clone()
    }
}

impl<N: Send + 'static> Listener for InMemoryListener<N> {
    type Notification = N;

    fn open(
        &self,
        endpoint: &Endpoint,
    ) -> BoxFuture<'_, Result<Subscription<N>, SubscriptionError>> {
        let result = match lock(&self.inner.refusal).clone() {
            Some(reason) => Err(SubscriptionError::Connect {
                endpoint: endpoint.to_string(),
                reason,
            }),
            None => {
                let (sender, mut receiver) = mpsc::unbounded_channel();
                *lock(&self.inner.current) = Some(sender);
                lock(&self.inner.endpoints).push(endpoint.clone());
                self.inner.opened.fetch_add(1, Ordering::SeqCst);

                let notifications: NotificationStream<N> = Box::pin(async_stream::stream! {
                    while let Some(item) = receiver.recv().await {
                        yield item;
                    }
                });
                let connection = InMemoryConnection {
                    inner: Arc::clone(&self.inner),
                };
                Ok(Subscription::new(notifications, Box::new(connection)))
            },
        };
        Box::pin(async move { result })
    }
}

struct InMemoryConnection<N> {
    inner: Arc<Inner<N>>,
}

impl<N: Send + 'static> Connection for InMemoryConnection<N> {
    fn close(self: Box<Self>) {
        lock(&self.inner.current).take();
        self.inner.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
