//! Pagination.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    #[must_use]
    pub const fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    /// Validates the request and clamps its size to `max_size`.
    ///
    /// # Errors
    /// `InvalidPagination` when page or size is zero.
    pub fn normalized(self, max_size: usize) -> Result<Self, ValidationError> {
        if self.page == 0 {
            return Err(ValidationError::InvalidPagination {
                reason: "page numbers start at 1".to_string(),
            });
        }
        if self.size == 0 {
            return Err(ValidationError::InvalidPagination {
                reason: "page size must be positive".to_string(),
            });
        }
        Ok(Self {
            page: self.page,
            size: self.size.min(max_size.max(1)),
        })
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 20 }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub index: usize,
    pub max_size: usize,
    pub total_pages: usize,
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Cuts one page out of the full, already ordered result set.
    ///
    /// # Errors
    /// `InvalidPagination` when the requested page lies past the last page.
    pub fn paginate(items: Vec<T>, request: PageRequest) -> Result<Self, ValidationError> {
        let total = items.len();
        let total_pages = total.div_ceil(request.size).max(1);
        if request.page > total_pages {
            return Err(ValidationError::InvalidPagination {
                reason: format!(
                    "page {} requested but {total} items at size {} make {total_pages} page(s)",
                    request.page, request.size
                ),
            });
        }
        let items = items
            .into_iter()
            .skip((request.page - 1) * request.size)
            .take(request.size)
            .collect();
        Ok(Self {
            index: request.page,
            max_size: request.size,
            total_pages,
            total,
            items,
        })
    }

    /// Maps the items, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            index: self.index,
            max_size: self.max_size,
            total_pages: self.total_pages,
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}
