//! # Explorer State Stores
//!
//! The store modules of the explorer, composed from the managers in
//! `explorer-state-runtime`:
//!
//! - [`ChainStore`]: chain info, refreshed on demand and on every new block
//! - [`BlockStore`]: block timeline with live prepends, and the block detail view
//! - [`NamespaceStore`] and [`MosaicStore`]: entity lists and detail views
//!
//! Remote data comes through the source traits in [`source`]; each module
//! adapts its source into the fetchers its managers need. The lifecycle
//! (`initialize`/`uninitialize`) of every module goes through
//! [`explorer_state_runtime::composition`].
//!
//! ## Example
//!
//! ```ignore
//! use explorer_state_stores::{BlockStore, ChainStore};
//!
//! let chain = Arc::new(ChainStore::new(node.clone()));
//! let blocks = BlockStore::new(&config, node, listener, Arc::clone(&chain))?;
//!
//! blocks.initialize().await?;
//! let recent = blocks.recent_blocks(4).await;
//!
//! blocks.fetch_block_info(1_200).await;
//! blocks.next_block().await;
//! ```

/// Block timeline and block detail view
pub mod block;

/// Chain info
pub mod chain;

/// Detail views shared by namespaces and mosaics
pub mod detail;

/// Mosaic list and mosaic detail view
pub mod mosaic;

/// Namespace list and namespace detail view
pub mod namespace;

/// Domain records returned by the node
pub mod records;

/// Data source seams
pub mod source;

pub use block::{BlockStore, RECENT_BLOCKS};
pub use chain::ChainStore;
pub use detail::EntityDetail;
pub use mosaic::MosaicStore;
pub use namespace::NamespaceStore;
pub use source::{BlockSource, ChainSource, MosaicSource, NamespaceSource};
