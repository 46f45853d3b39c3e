//! Page-number pagination shared by list and ledger queries.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 200;

/// A validated 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Validate a page request; `page` starts at 1.
    pub fn new(page: u32, page_size: u32) -> DomainResult<Self> {
        if page == 0 {
            return Err(DomainError::invalid_argument("page must be at least 1"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(DomainError::invalid_argument(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, page_size })
    }

    pub fn first(page_size: u32) -> DomainResult<Self> {
        Self::new(1, page_size)
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Row offset of the first record on this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn total_pages(&self, total_count: u64) -> u32 {
        let pages = total_count.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 50,
        }
    }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub entries: Vec<T>,
    /// Number of records matching the query across all pages.
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(entries: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        Self {
            entries,
            total_count,
            page: request.page(),
            page_size: request.page_size(),
            total_pages: request.total_pages(total_count),
        }
    }

    /// Wrap a complete, unpaginated result set as a single page.
    pub fn unpaginated(entries: Vec<T>) -> Self {
        let total_count = entries.len() as u64;
        Self {
            page_size: u32::try_from(entries.len()).unwrap_or(u32::MAX),
            entries,
            total_count,
            page: 1,
            total_pages: u32::from(total_count > 0),
        }
    }
}
