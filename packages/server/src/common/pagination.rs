//! Offset pagination over ranked relations.
//!
//! Ranked relations are paged by rank position (page 1 = highest score), so
//! a page maps directly onto a `ZREVRANGE start stop` window.

use serde::Serialize;

const MAX_LIMIT: i64 = 100;

/// Validated page request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    /// Clamp caller input into a usable window (page >= 1, 1 <= limit <= 100).
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Inclusive rank window for this page. Saturates for absurd page numbers,
    /// which simply land past the end of any relation.
    pub fn window(&self) -> (isize, isize) {
        let start = (self.page - 1).saturating_mul(self.limit);
        let stop = start.saturating_add(self.limit - 1);
        (
            isize::try_from(start).unwrap_or(isize::MAX),
            isize::try_from(stop).unwrap_or(isize::MAX),
        )
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// A page of results plus the paging envelope callers render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: i64) -> Self {
        let (_, stop) = request.window();
        let total_pages = if total == 0 {
            0
        } else {
            (total - 1) / request.limit + 1
        };

        Self {
            data,
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
            has_more: (stop as i64) < total - 1,
        }
    }
}
