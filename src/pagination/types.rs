//! Pagination types and traits
//!
//! Defines the request/response shapes exchanged with a [`PageFetcher`], the
//! per-operation [`PaginationState`], and the [`ResultSet`] a retrieval
//! produces.

use crate::error::Result;
use crate::types::{QueryDescriptor, Record};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sentinel cursor that asks for the first page
pub const INITIAL_CURSOR: &str = "*";

// ============================================================================
// Requests and pages
// ============================================================================

/// Parameters for one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Skip `skip` records, return at most `limit`
    Offset { skip: u64, limit: u64 },
    /// Continue from `cursor`, return at most `page_size`
    Cursor { cursor: String, page_size: u64 },
}

impl PageRequest {
    /// Maximum number of records this request asks for
    pub fn size(&self) -> u64 {
        match self {
            PageRequest::Offset { limit, .. } => *limit,
            PageRequest::Cursor { page_size, .. } => *page_size,
        }
    }
}

/// Metadata reported alongside a page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMeta {
    /// Total records available for the query, when the source reports it
    pub total_count: Option<u64>,
    /// Continuation token for the next page (cursor mode)
    pub next_cursor: Option<String>,
}

/// One API response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records in response order
    pub records: Vec<Record>,
    /// Page metadata
    pub meta: PageMeta,
}

impl Page {
    /// Create a page from records
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            meta: PageMeta::default(),
        }
    }

    /// Set the reported total
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.meta.total_count = Some(total);
        self
    }

    /// Set the continuation token
    #[must_use]
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.meta.next_cursor = Some(cursor.into());
        self
    }

    /// Number of records on the page
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the page has no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fetches single pages from a source
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch one page for `descriptor`
    async fn fetch_page(&self, descriptor: &QueryDescriptor, request: &PageRequest) -> Result<Page>;
}

// ============================================================================
// Mode and phase
// ============================================================================

/// Pagination protocol of a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaginationMode {
    /// Offset/skip pagination
    Offset {
        /// Requested records per call
        batch_size: u64,
        /// Per-call maximum enforced by the API
        api_max: u64,
    },
    /// Cursor/continuation-token pagination
    Cursor {
        /// Records per call
        page_size: u64,
        /// Per-call maximum enforced by the API
        api_max: u64,
        /// Cursor that asks for the first page
        initial_cursor: String,
    },
}

impl PaginationMode {
    /// Offset pagination
    pub fn offset(batch_size: u64, api_max: u64) -> Self {
        Self::Offset {
            batch_size,
            api_max,
        }
    }

    /// Cursor pagination starting from `*`
    pub fn cursor(page_size: u64, api_max: u64) -> Self {
        Self::Cursor {
            page_size,
            api_max,
            initial_cursor: INITIAL_CURSOR.to_string(),
        }
    }

    /// Records per call after applying the API maximum
    pub fn effective_batch(&self) -> u64 {
        let (requested, api_max) = match self {
            Self::Offset {
                batch_size,
                api_max,
            } => (*batch_size, *api_max),
            Self::Cursor {
                page_size, api_max, ..
            } => (*page_size, *api_max),
        };
        requested.min(api_max).max(1)
    }

    /// Mode name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Offset { .. } => "offset",
            Self::Cursor { .. } => "cursor",
        }
    }
}

/// Lifecycle of one retrieval operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationPhase {
    #[default]
    Init,
    Fetching,
    Accumulating,
    Done,
    Failed,
    Cancelled,
}

impl std::fmt::Display for PaginationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Fetching => "fetching",
            Self::Accumulating => "accumulating",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

// ============================================================================
// State
// ============================================================================

/// Result of processing a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch this request next
    Continue(PageRequest),
    /// Stop paginating
    Done,
}

/// Tracks progress of one retrieval operation
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Pages fetched so far
    pub page: u32,
    /// Next skip value (offset mode)
    pub skip: u64,
    /// Next cursor (cursor mode)
    pub cursor: Option<String>,
    /// Records kept so far
    pub retrieved: u64,
    /// Caller's record ceiling
    pub ceiling: Option<u64>,
    /// Total reported by the first page
    pub total_available: Option<u64>,
    /// Effective target, fixed after the first page
    pub target: Option<u64>,
    /// Current phase
    pub phase: PaginationPhase,
}

impl PaginationState {
    /// Create state for a ceiling
    pub fn new(ceiling: Option<u64>) -> Self {
        Self {
            ceiling,
            target: ceiling,
            ..Default::default()
        }
    }

    /// Fix the total and effective target from the first page
    pub fn fix_target(&mut self, total: Option<u64>) {
        self.total_available = total;
        self.target = match (total, self.ceiling) {
            (Some(total), Some(ceiling)) => Some(total.min(ceiling)),
            (Some(total), None) => Some(total),
            (None, ceiling) => ceiling,
        };
    }

    /// Records still wanted, `None` when unbounded
    pub fn remaining(&self) -> Option<u64> {
        self.target
            .map(|target| target.saturating_sub(self.retrieved))
    }

    /// Whether the target has been reached
    pub fn target_reached(&self) -> bool {
        self.remaining() == Some(0)
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Request for the first page
    fn first_request(&self, state: &PaginationState) -> PageRequest;

    /// Single-record request used to learn the total without keeping records
    fn probe_request(&self) -> PageRequest;

    /// Decide what comes after a page of `received` records
    fn next_request(
        &self,
        request: &PageRequest,
        meta: &PageMeta,
        received: usize,
        state: &mut PaginationState,
    ) -> NextPage;
}

// ============================================================================
// Result set
// ============================================================================

/// Accumulated outcome of a retrieval operation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Source name
    pub source: String,
    /// Records in retrieval order
    pub records: Vec<Record>,
    /// Total the source reported (or the retrieved count if it reported none)
    pub total_available: u64,
    /// Number of records kept
    pub total_retrieved: u64,
    /// Pages fetched successfully
    pub pages_fetched: u32,
    /// Terminal phase
    pub phase: PaginationPhase,
    /// Reason the operation stopped early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ResultSet {
    /// Empty result set for a source
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            phase: PaginationPhase::Done,
            ..Default::default()
        }
    }

    /// Whether the retrieval stopped before reaching its target
    pub fn is_partial(&self) -> bool {
        self.phase != PaginationPhase::Done
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation flag, checked between pages
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
