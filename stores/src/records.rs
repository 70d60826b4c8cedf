//! Domain records as the node source returns them.
//!
//! Records are plain data. Every record that lives in a Pagination carries a
//! stable identity field used as its dedupe key: `height` for blocks, `hash`
//! for transactions, `id` for receipts and entities, `composite_hash` for
//! metadata entries.

#![allow(missing_docs)] // Record fields are named after the node's fields

use chrono::{DateTime, Utc};
use explorer_state_core::FilterOption;
use serde::{Deserialize, Serialize};

/// Chain-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    /// Height of the newest block
    pub current_height: u64,
    /// Height of the newest finalized block
    pub finalized_height: u64,
}

/// A block header as listed in the timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: u64,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
    /// Public key of the harvester
    pub signer: String,
    pub transaction_count: u32,
}

/// Full block details for the detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block: Block,
    pub state_hash: String,
    pub receipts_hash: String,
    pub transactions_hash: String,
    pub fee_multiplier: u64,
}

/// Push payload announcing a new block. Carries only the height; the block
/// itself is loaded through the regular fetch path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlock {
    pub height: u64,
}

/// Alias or address resolution recorded in a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStatement {
    pub unresolved: String,
    pub resolved: Vec<String>,
}

/// Resolution statements of one block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReceipts {
    pub address_resolutions: Vec<ResolutionStatement>,
    pub mosaic_resolutions: Vec<ResolutionStatement>,
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub height: u64,
    pub kind: TransactionKind,
    pub signer: String,
    pub deadline: DateTime<Utc>,
}

/// Transaction families the block transaction list can be narrowed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[default]
    Transfer,
    Namespace,
    Mosaic,
    Aggregate,
    Other,
}

/// Filter for block transaction lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionFilter {
    #[default]
    All,
    Only(TransactionKind),
}

impl TransactionFilter {
    /// Whether `transaction` passes the filter.
    #[must_use]
    pub fn matches(self, transaction: &Transaction) -> bool {
        match self {
            Self::All => true,
            Self::Only(kind) => transaction.kind == kind,
        }
    }

    /// Presets offered by the block transaction list.
    #[must_use]
    pub fn options() -> Vec<FilterOption<Self>> {
        vec![
            FilterOption::new("Recent", Self::All),
            FilterOption::new("Transfer", Self::Only(TransactionKind::Transfer)),
            FilterOption::new("Namespace", Self::Only(TransactionKind::Namespace)),
            FilterOption::new("Mosaic", Self::Only(TransactionKind::Mosaic)),
            FilterOption::new("Aggregate", Self::Only(TransactionKind::Aggregate)),
        ]
    }
}

/// A receipt emitted by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// `<height>-<statement index>-<receipt index>`, unique per chain
    pub id: String,
    pub height: u64,
    pub kind: ReceiptKind,
    /// Account or artifact the receipt is about
    pub target: String,
    pub amount: Option<u64>,
}

/// Receipt groups shown by the explorer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptKind {
    /// Harvest fees and hash/secret lock movements
    #[default]
    BalanceChange,
    /// Namespace and mosaic rental fees
    BalanceTransfer,
    Inflation,
    /// Namespace and mosaic expiry or deletion
    ArtifactExpiry,
}

impl ReceiptKind {
    /// Presets offered by the block receipt list.
    #[must_use]
    pub fn options() -> Vec<FilterOption<Self>> {
        vec![
            FilterOption::new("Balance change", Self::BalanceChange),
            FilterOption::new("Balance transfer", Self::BalanceTransfer),
            FilterOption::new("Inflation", Self::Inflation),
            FilterOption::new("Artifact expiry", Self::ArtifactExpiry),
        ]
    }
}

/// A namespace as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    /// Hex id
    pub id: String,
    /// Full dotted name
    pub name: String,
    pub owner: String,
    pub start_height: u64,
    /// `None` for namespaces that never expire
    pub end_height: Option<u64>,
    pub active: bool,
}

/// What a namespace currently points to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alias {
    #[default]
    None,
    Address(String),
    Mosaic(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    pub namespace: Namespace,
    pub alias: Alias,
    /// Parent chain from the root, the namespace itself last
    pub levels: Vec<String>,
}

/// Filter for the namespace list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespaceFilter {
    #[default]
    All,
    Active,
    Expired,
}

impl NamespaceFilter {
    /// Presets offered by the namespace list.
    #[must_use]
    pub fn options() -> Vec<FilterOption<Self>> {
        vec![
            FilterOption::new("All", Self::All),
            FilterOption::new("Active", Self::Active),
            FilterOption::new("Expired", Self::Expired),
        ]
    }
}

/// A mosaic as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mosaic {
    /// Hex id
    pub id: String,
    pub owner: String,
    pub divisibility: u8,
    pub supply: u64,
    pub start_height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MosaicInfo {
    pub mosaic: Mosaic,
    /// Namespace names aliased to the mosaic
    pub names: Vec<String>,
    pub transferable: bool,
    pub supply_mutable: bool,
}

/// A metadata entry attached to a namespace or mosaic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub composite_hash: String,
    pub scoped_key: String,
    pub sender: String,
    pub value: String,
}
