//! Data source seams.
//!
//! Each trait is the slice of the node client one store module needs. The
//! client itself is out of scope; tests implement these traits over in-memory
//! fixtures.
//!
//! Entity ids are passed as strings: hex ids for mosaics, hex ids or dotted
//! names for namespaces.

use crate::records::{
    Block, BlockInfo, BlockReceipts, ChainInfo, MetadataEntry, Mosaic, MosaicInfo, Namespace,
    NamespaceFilter, NamespaceInfo, Receipt, ReceiptKind, Transaction, TransactionFilter,
};
use explorer_state_core::{FetchFuture, Page, PageInfo};

/// Chain-wide information.
pub trait ChainSource: Send + Sync + 'static {
    /// Current chain counters.
    fn chain_info(&self) -> FetchFuture<ChainInfo>;
}

/// Blocks and their content.
pub trait BlockSource: Send + Sync + 'static {
    /// Block timeline, newest first.
    fn block_list(&self, page: PageInfo) -> FetchFuture<Page<Block>>;

    /// Header of the block at `height`, in the same shape as timeline items.
    fn block_by_height(&self, height: u64) -> FetchFuture<Block>;

    /// Full details of the block at `height`.
    fn block_info(&self, height: u64) -> FetchFuture<BlockInfo>;

    /// Resolution statements of the block at `height`.
    fn block_receipts_info(&self, height: u64) -> FetchFuture<BlockReceipts>;

    /// Transactions confirmed in the block at `height`.
    fn block_transactions(
        &self,
        page: PageInfo,
        filter: TransactionFilter,
        height: u64,
    ) -> FetchFuture<Page<Transaction>>;

    /// Receipts of one group emitted in the block at `height`.
    fn block_receipts(
        &self,
        page: PageInfo,
        kind: ReceiptKind,
        height: u64,
    ) -> FetchFuture<Page<Receipt>>;
}

/// Namespaces and their detail lists.
pub trait NamespaceSource: Send + Sync + 'static {
    /// Namespace list, newest registrations first.
    fn namespace_list(
        &self,
        page: PageInfo,
        filter: NamespaceFilter,
    ) -> FetchFuture<Page<Namespace>>;

    /// Details of one namespace.
    fn namespace_info(&self, id: String) -> FetchFuture<NamespaceInfo>;

    /// Metadata attached to the namespace.
    fn namespace_metadata(&self, page: PageInfo, id: String) -> FetchFuture<Page<MetadataEntry>>;

    /// Rental fee receipts paid for the namespace.
    fn namespace_balance_transfers(&self, page: PageInfo, id: String)
    -> FetchFuture<Page<Receipt>>;

    /// Expiry and deletion receipts of the namespace.
    fn namespace_artifact_expiries(&self, page: PageInfo, id: String)
    -> FetchFuture<Page<Receipt>>;
}

/// Mosaics and their detail lists.
pub trait MosaicSource: Send + Sync + 'static {
    /// Mosaic list, newest first.
    fn mosaic_list(&self, page: PageInfo) -> FetchFuture<Page<Mosaic>>;

    /// Details of one mosaic.
    fn mosaic_info(&self, id: String) -> FetchFuture<MosaicInfo>;

    /// Metadata attached to the mosaic.
    fn mosaic_metadata(&self, page: PageInfo, id: String) -> FetchFuture<Page<MetadataEntry>>;

    /// Rental fee receipts paid for the mosaic.
    fn mosaic_balance_transfers(&self, page: PageInfo, id: String) -> FetchFuture<Page<Receipt>>;

    /// Expiry receipts of the mosaic.
    fn mosaic_artifact_expiries(&self, page: PageInfo, id: String) -> FetchFuture<Page<Receipt>>;
}
