//! Offset/limit pagination for list endpoints.

use bap_store::{Page, PageRequest};
use serde::{Deserialize, Serialize};

/// Page size when `limit` is not given.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub offset: Option<u64>,
    pub limit: Option<u32>,
}

impl PaginationParams {
    /// Page size clamped to [1, MAX_PAGE_SIZE].
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    /// Newest first.
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.offset.unwrap_or(0), self.effective_limit())
    }
}

/// Paging metadata included in list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub offset: u64,
    pub limit: u32,
    pub total: u64,
    /// Offset of the next page, absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u64>,
}

impl PaginationMeta {
    pub fn for_page<T>(page: &Page<T>, limit: u32) -> Self {
        let end = page.offset + page.items.len() as u64;
        Self {
            offset: page.offset,
            limit,
            total: page.total,
            next_offset: (end < page.total && !page.items.is_empty()).then_some(end),
        }
    }
}
