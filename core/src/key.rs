//! Entity key selection.
//!
//! Every paginated list is deduplicated by one field of its records: a block
//! timeline by height, a transaction list by hash, a namespace list by id.

use std::fmt;
use std::sync::Arc;

/// Selects the deduplication key of a record.
///
/// # Example
///
/// ```
/// use explorer_state_core::KeySelector;
///
/// struct Block { height: u64 }
///
/// let by_height = KeySelector::new("height", |block: &Block| block.height);
/// assert_eq!(by_height.key(&Block { height: 100 }), 100);
/// assert_eq!(by_height.field(), "height");
/// ```
pub struct KeySelector<T, K> {
    field: &'static str,
    select: Arc<dyn Fn(&T) -> K + Send + Sync>,
}

impl<T, K> KeySelector<T, K> {
    /// Create a selector named after the field it reads.
    pub fn new<F>(field: &'static str, select: F) -> Self
    where
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self {
            field,
            select: Arc::new(select),
        }
    }

    /// Read the key of `item`.
    pub fn key(&self, item: &T) -> K {
        (self.select)(item)
    }

    /// Name of the key field, used in logs.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        self.field
    }
}

impl<T, K> Clone for KeySelector<T, K> {
    fn clone(&self) -> Self {
        Self {
            field: self.field,
            select: Arc::clone(&self.select),
        }
    }
}

impl<T, K> fmt::Debug for KeySelector<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySelector")
            .field("field", &self.field)
            .finish_non_exhaustive()
    }
}
