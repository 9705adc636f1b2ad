//! # Route Modules
//!
//! Each module defines an axum `Router` for one API surface area; they are
//! assembled in `lib.rs`.

pub mod bulk;
pub mod disbursements;

use serde::Deserialize;

/// Shared `?limit=N&offset=M` pagination parameters.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl PaginationParams {
    /// Max items to return (default 100, capped at 1000).
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(100).min(1000)
    }

    /// Items to skip (default 0).
    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}
