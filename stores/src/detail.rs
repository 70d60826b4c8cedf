//! Entity detail view shared by namespaces and mosaics.
//!
//! A detail view shows one entity at a time: its info record plus three
//! lists keyed by the entity id (metadata, balance-transfer receipts,
//! artifact-expiry receipts). Opening another entity tears the previous view
//! down first.

use crate::records::{MetadataEntry, Receipt};
use explorer_state_core::{Fetcher, KeySelector, PageFetcher};
use explorer_state_runtime::composition::{Clearable, clear_all};
use explorer_state_runtime::{DataSet, DataSetConfig, EffectHandle, Pagination, PaginationConfig};
use futures::future::{BoxFuture, join_all};
use tokio::sync::{Mutex, watch};

/// Manager names of one detail view, for logs and metrics.
#[derive(Debug, Clone, Copy)]
pub struct DetailNames {
    /// Info DataSet
    pub info: &'static str,
    /// Metadata list
    pub metadata: &'static str,
    /// Balance-transfer receipt list
    pub balance_transfers: &'static str,
    /// Artifact-expiry receipt list
    pub artifact_expiries: &'static str,
}

/// Receipt list keyed by an entity id.
pub type ReceiptList = Pagination<Receipt, String, (), String>;

/// Metadata list keyed by an entity id.
pub type MetadataList = Pagination<MetadataEntry, String, (), String>;

/// Detail view of one entity with info record `I`.
pub struct EntityDetail<I> {
    current: watch::Sender<Option<String>>,
    /// Held while the view is reset and its requests are issued
    opening: Mutex<()>,
    info: DataSet<String, I>,
    metadata: MetadataList,
    balance_transfers: ReceiptList,
    artifact_expiries: ReceiptList,
}

impl<I> EntityDetail<I>
where
    I: Clone + Send + Sync + 'static,
{
    /// Build the view's managers.
    pub fn new(
        names: DetailNames,
        info: impl Fetcher<String, I>,
        metadata: impl PageFetcher<MetadataEntry, (), String>,
        balance_transfers: impl PageFetcher<Receipt, (), String>,
        artifact_expiries: impl PageFetcher<Receipt, (), String>,
        page_size: u32,
        dataset: DataSetConfig,
    ) -> Self {
        let by_id = KeySelector::new("id", |receipt: &Receipt| receipt.id.clone());
        Self {
            current: watch::Sender::new(None),
            opening: Mutex::new(()),
            info: DataSet::with_config(names.info, info, dataset),
            metadata: Pagination::new(
                names.metadata,
                metadata,
                KeySelector::new("composite_hash", |entry: &MetadataEntry| {
                    entry.composite_hash.clone()
                }),
                PaginationConfig::new(page_size),
            ),
            balance_transfers: Pagination::new(
                names.balance_transfers,
                balance_transfers,
                by_id.clone(),
                PaginationConfig::new(page_size),
            ),
            artifact_expiries: Pagination::new(
                names.artifact_expiries,
                artifact_expiries,
                by_id,
                PaginationConfig::new(page_size),
            ),
        }
    }

    /// Show entity `id`: tear down the previous view, record `id`, then load
    /// the info record and the first page of every list concurrently.
    ///
    /// Overlapping opens issue their requests one open at a time, so every
    /// manager ends up on the entity of the last open.
    #[tracing::instrument(skip(self), fields(manager = self.info.name()))]
    pub async fn open(&self, id: String) {
        let mut pending: [EffectHandle; 4] = {
            let _opening = self.opening.lock().await;
            self.reset().await;
            self.current.send_replace(Some(id.clone()));
            [
                self.info.request(id.clone(), None).await,
                self.metadata.request_initial_fetch(id.clone()).await,
                self.balance_transfers.request_initial_fetch(id.clone()).await,
                self.artifact_expiries.request_initial_fetch(id).await,
            ]
        };
        join_all(pending.iter_mut().map(|handle| handle.wait())).await;
    }

    /// Empty every manager and forget the current entity.
    pub async fn clear(&self) {
        let _opening = self.opening.lock().await;
        self.reset().await;
    }

    async fn reset(&self) {
        self.current.send_replace(None);
        clear_all(&[
            &self.info,
            &self.metadata,
            &self.balance_transfers,
            &self.artifact_expiries,
        ])
        .await;
    }

    /// Id of the entity on display.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Observe changes of the entity on display.
    #[must_use]
    pub fn watch_current(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }

    /// Info record of the entity on display.
    #[must_use]
    pub const fn info(&self) -> &DataSet<String, I> {
        &self.info
    }

    /// Metadata entries of the entity on display.
    #[must_use]
    pub const fn metadata(&self) -> &MetadataList {
        &self.metadata
    }

    /// Rental fee receipts of the entity on display.
    #[must_use]
    pub const fn balance_transfers(&self) -> &ReceiptList {
        &self.balance_transfers
    }

    /// Expiry receipts of the entity on display.
    #[must_use]
    pub const fn artifact_expiries(&self) -> &ReceiptList {
        &self.artifact_expiries
    }
}

impl<I> Clearable for EntityDetail<I>
where
    I: Clone + Send + Sync + 'static,
{
    fn manager_name(&self) -> &'static str {
        self.info.name()
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(EntityDetail::clear(self))
    }
}
