//! Mosaic module: mosaic list and mosaic detail view.

use crate::detail::{DetailNames, EntityDetail};
use crate::records::{Mosaic, MosaicInfo};
use crate::source::MosaicSource;
use explorer_state_core::{KeySelector, PageInfo};
use explorer_state_runtime::composition::{StoreModule, clear_all};
use explorer_state_runtime::{
    LifecycleLock, Pagination, PaginationConfig, StateConfig, StateError, composition,
};
use futures::future::BoxFuture;
use std::sync::Arc;

const NAMES: DetailNames = DetailNames {
    info: "mosaic_info",
    metadata: "mosaic_metadata",
    balance_transfers: "mosaic_balance_transfers",
    artifact_expiries: "mosaic_artifact_expiries",
};

/// Mosaic list plus the detail view of one mosaic.
pub struct MosaicStore {
    lock: LifecycleLock,
    list: Pagination<Mosaic, String>,
    detail: EntityDetail<MosaicInfo>,
}

impl MosaicStore {
    /// Create an empty store over `source`.
    pub fn new(config: &StateConfig, source: impl MosaicSource) -> Self {
        let source = Arc::new(source);

        let list = Pagination::new(
            "mosaic_list",
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, (): (), (): ()| source.mosaic_list(page)
            },
            KeySelector::new("id", |mosaic: &Mosaic| mosaic.id.clone()),
            PaginationConfig::new(config.page_size),
        );

        let detail = EntityDetail::new(
            NAMES,
            {
                let source = Arc::clone(&source);
                move |id: String| source.mosaic_info(id)
            },
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, (): (), id: String| source.mosaic_metadata(page, id)
            },
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, (): (), id: String| source.mosaic_balance_transfers(page, id)
            },
            move |page: PageInfo, (): (), id: String| source.mosaic_artifact_expiries(page, id),
            config.detail_page_size,
            config.dataset(),
        );

        Self {
            lock: LifecycleLock::new("mosaic"),
            list,
            detail,
        }
    }

    /// Show mosaic `id` in the detail view.
    pub async fn fetch_mosaic_info(&self, id: impl Into<String>) {
        self.detail.open(id.into()).await;
    }

    /// Empty the detail view.
    pub async fn uninitialize_detail(&self) {
        self.detail.clear().await;
    }

    /// The mosaic list.
    #[must_use]
    pub const fn list(&self) -> &Pagination<Mosaic, String> {
        &self.list
    }

    /// The mosaic detail view.
    #[must_use]
    pub const fn detail(&self) -> &EntityDetail<MosaicInfo> {
        &self.detail
    }

    /// Initialize through the module lock.
    ///
    /// # Errors
    ///
    /// See [`composition::initialize`].
    pub async fn initialize(&self) -> Result<(), StateError> {
        composition::initialize(self).await
    }

    /// Uninitialize through the module lock.
    ///
    /// # Errors
    ///
    /// See [`composition::uninitialize`].
    pub async fn uninitialize(&self) -> Result<(), StateError> {
        composition::uninitialize(self).await
    }
}

impl StoreModule for MosaicStore {
    fn name(&self) -> &'static str {
        "mosaic"
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
        Box::pin(async move { clear_all(&[&self.list, &self.detail]).await })
    }
}
