//! Subscription adapter: at most one open push subscription per module.
//!
//! `subscribe` opens the connection through a [`Listener`] and spawns a task
//! that hands every decoded notification to the caller's handler, in arrival
//! order. `unsubscribe` aborts that task (the event registration) and closes
//! the connection (the transport). Both calls are idempotent.

use explorer_state_core::{Connection, Endpoint, Listener, SubscriptionError};
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Both halves of an open subscription.
struct ActiveSubscription {
    endpoint: Endpoint,
    registration: JoinHandle<()>,
    connection: Box<dyn Connection>,
}

/// Owns at most one push subscription.
///
/// # Example
///
/// ```ignore
/// let adapter = SubscriptionAdapter::new("block", listener);
///
/// let timeline = timeline.clone();
/// adapter
///     .subscribe(&endpoint, move |block| {
///         let timeline = timeline.clone();
///         async move { timeline.add_latest_item(block).await }
///     })
///     .await?;
///
/// adapter.unsubscribe().await;
/// ```
pub struct SubscriptionAdapter<L: Listener> {
    name: &'static str,
    listener: Arc<L>,
    active: Mutex<Option<ActiveSubscription>>,
}

impl<L: Listener> SubscriptionAdapter<L> {
    /// Create an adapter without an open subscription.
    pub fn new(name: &'static str, listener: L) -> Self {
        Self {
            name,
            listener: Arc::new(listener),
            active: Mutex::new(None),
        }
    }

    /// Open a subscription to `endpoint` and forward notifications to
    /// `on_event`. No-op if a subscription is already open.
    ///
    /// Notifications are handled one at a time: the next one is not read
    /// before the handler future for the previous one has completed.
    /// Undecodable notifications are logged and skipped. The registration
    /// ends when the remote side closes the stream.
    ///
    /// # Errors
    ///
    /// Returns the listener's error if the connection cannot be opened. No
    /// subscription is recorded in that case.
    #[tracing::instrument(skip(self, endpoint, on_event), fields(module = self.name, endpoint = %endpoint))]
    pub async fn subscribe<H, Fut>(
        &self,
        endpoint: &Endpoint,
        on_event: H,
    ) -> Result<(), SubscriptionError>
    where
        H: Fn(L::Notification) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.as_ref() {
            tracing::debug!(open = %existing.endpoint, "Already subscribed");
            return Ok(());
        }

        let subscription = self.listener.open(endpoint).await?;
        let mut notifications = subscription.notifications;
        let name = self.name;

        let registration = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                match notification {
                    Ok(event) => on_event(event).await,
                    Err(SubscriptionError::Decode(reason)) => {
                        tracing::warn!(module = name, %reason, "Skipping undecodable notification");
                    },
                    Err(error) => {
                        tracing::warn!(module = name, %error, "Notification stream ended");
                        break;
                    },
                }
            }
            tracing::debug!(module = name, "Notification stream drained");
        });

        *active = Some(ActiveSubscription {
            endpoint: endpoint.clone(),
            registration,
            connection: subscription.connection,
        });

        metrics::counter!(crate::metrics::SUBSCRIPTIONS_OPENED_TOTAL, "module" => self.name)
            .increment(1);
        tracing::info!("Subscribed");
        Ok(())
    }

    /// Release the event registration and close the connection. No-op if no
    /// subscription is open.
    ///
    /// Returns only once the handler loop has stopped, so no handler runs
    /// after this call.
    #[tracing::instrument(skip(self), fields(module = self.name))]
    pub async fn unsubscribe(&self) {
        let Some(active) = self.active.lock().await.take() else {
            tracing::trace!("No open subscription");
            return;
        };
        let ActiveSubscription {
            endpoint,
            registration,
            connection,
        } = active;

        registration.abort();
        match registration.await {
            Err(error) if error.is_panic() => {
                tracing::error!(%error, "Notification handler panicked");
            },
            _ => {},
        }
        connection.close();

        metrics::counter!(crate::metrics::SUBSCRIPTIONS_CLOSED_TOTAL, "module" => self.name)
            .increment(1);
        tracing::info!(%endpoint, "Unsubscribed");
    }

    /// Whether a subscription is open.
    pub async fn is_subscribed(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Endpoint of the open subscription.
    pub async fn endpoint(&self) -> Option<Endpoint> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| active.endpoint.clone())
    }
}

impl<L: Listener> fmt::Debug for SubscriptionAdapter<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionAdapter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<L: Listener> Drop for SubscriptionAdapter<L> {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            active.registration.abort();
            active.connection.close();
        }
    }
}
