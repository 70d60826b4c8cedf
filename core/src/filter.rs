//! Labelled filter presets.
//!
//! List views offer a fixed set of filters (for example "All", "Transfer",
//! "Aggregate" for block transactions). Each option pairs a display label
//! with the filter value handed to the page fetcher.

use serde::{Deserialize, Serialize};

/// One selectable filter of a paginated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption<F> {
    /// Label shown by the UI
    pub label: String,
    /// Filter value passed to the page fetcher
    pub value: F,
}

impl<F> FilterOption<F> {
    /// Create a filter option.
    pub fn new(label: impl Into<String>, value: F) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}
