//! Namespace module: namespace list and namespace detail view.

use crate::detail::{DetailNames, EntityDetail};
use crate::records::{Namespace, NamespaceFilter, NamespaceInfo};
use crate::source::NamespaceSource;
use explorer_state_core::{KeySelector, PageInfo};
use explorer_state_runtime::composition::{StoreModule, clear_all};
use explorer_state_runtime::{
    LifecycleLock, Pagination, PaginationConfig, StateConfig, StateError, composition,
};
use futures::future::BoxFuture;
use std::sync::Arc;

const NAMES: DetailNames = DetailNames {
    info: "namespace_info",
    metadata: "namespace_metadata",
    balance_transfers: "namespace_balance_transfers",
    artifact_expiries: "namespace_artifact_expiries",
};

/// Namespace list plus the detail view of one namespace.
pub struct NamespaceStore {
    lock: LifecycleLock,
    list: Pagination<Namespace, String, NamespaceFilter>,
    detail: EntityDetail<NamespaceInfo>,
}

impl NamespaceStore {
    /// Create an empty store over `source`.
    pub fn new(config: &StateConfig, source: impl NamespaceSource) -> Self {
        let source = Arc::new(source);

        let list = Pagination::new(
            "namespace_list",
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, filter: NamespaceFilter, (): ()| {
                    source.namespace_list(page, filter)
                }
            },
            KeySelector::new("id", |namespace: &Namespace| namespace.id.clone()),
            PaginationConfig::new(config.page_size)
                .with_filter_options(NamespaceFilter::options()),
        );

        let detail = EntityDetail::new(
            NAMES,
            {
                let source = Arc::clone(&source);
                move |id: String| source.namespace_info(id)
            },
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, (): (), id: String| source.namespace_metadata(page, id)
            },
            {
                let source = Arc::clone(&source);
                move |page: PageInfo, (): (), id: String| {
                    source.namespace_balance_transfers(page, id)
                }
            },
            move |page: PageInfo, (): (), id: String| source.namespace_artifact_expiries(page, id),
            config.detail_page_size,
            config.dataset(),
        );

        Self {
            lock: LifecycleLock::new("namespace"),
            list,
            detail,
        }
    }

    /// Show namespace `id` in the detail view.
    pub async fn fetch_namespace_info(&self, id: impl Into<String>) {
        self.detail.open(id.into()).await;
    }

    /// Empty the detail view.
    pub async fn uninitialize_detail(&self) {
        self.detail.clear().await;
    }

    /// The namespace list.
    #[must_use]
    pub const fn list(&self) -> &Pagination<Namespace, String, NamespaceFilter> {
        &self.list
    }

    /// The namespace detail view.
    #[must_use]
    pub const fn detail(&self) -> &EntityDetail<NamespaceInfo> {
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

impl StoreModule for NamespaceStore {
    fn name(&self) -> &'static str {
        "namespace"
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
