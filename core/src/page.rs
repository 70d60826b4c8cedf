//! Page requests and page results.

use serde::{Deserialize, Serialize};

/// A page request: which page, and how many items per page.
///
/// Page numbers start at 1 and page sizes are never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number
    pub page_number: u32,
    /// Requested number of items per page
    pub page_size: u32,
}

impl PageInfo {
    /// The first page for the given size. A zero size is raised to 1.
    #[must_use]
    pub fn first(page_size: u32) -> Self {
        Self {
            page_number: 1,
            page_size: page_size.max(1),
        }
    }

    /// The page following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self {
            page_number: self.page_number.saturating_add(1),
            page_size: self.page_size,
        }
    }
}

/// One page of records returned by a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Records in server order
    pub items: Vec<T>,
    /// 1-based page number this page answers
    pub page_number: u32,
    /// Page size that was requested
    pub page_size: u32,
    /// Explicit last-page flag reported by the server
    pub is_last_page: bool,
}

impl<T> Page<T> {
    /// A page without an explicit last-page flag.
    #[must_use]
    pub const fn new(items: Vec<T>, page_number: u32, page_size: u32) -> Self {
        Self {
            items,
            page_number,
            page_size,
            is_last_page: false,
        }
    }

    /// Mark the page as the last one.
    #[must_use]
    pub const fn last(mut self) -> Self {
        self.is_last_page = true;
        self
    }

    /// Whether nothing follows this page: either the server said so, or it
    /// returned fewer items than requested.
    #[must_use]
    pub fn ends_list(&self) -> bool {
        self.ends_list_of(self.page_size)
    }

    /// Whether nothing follows this page when `requested` items were asked
    /// for, regardless of the size the source reported.
    #[must_use]
    pub fn ends_list_of(&self, requested: u32) -> bool {
        self.is_last_page || self.items.len() < requested as usize
    }
}
