//! Pagination module
//!
//! Supports: Offset/skip and Cursor/continuation-token
//!
//! # Overview
//!
//! The pagination module walks a source page by page to assemble a result
//! set under a record ceiling. The first page fixes the total; the effective
//! target is `min(total, ceiling)`. A failed page ends the walk but keeps
//! everything retrieved before it.

mod engine;
mod strategies;
mod types;

pub use engine::{PaginationEngine, DEFAULT_PAGE_TIMEOUT};
pub use strategies::{paginator_for, CursorPaginator, OffsetPaginator};
pub use types::{
    CancelSignal, NextPage, Page, PageFetcher, PageMeta, PageRequest, PaginationMode,
    PaginationPhase, PaginationState, Paginator, ResultSet, INITIAL_CURSOR,
};
