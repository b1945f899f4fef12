//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{NextPage, PageMeta, PageRequest, PaginationMode, PaginationState, Paginator};

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset/skip pagination
///
/// Each call asks for `min(batch, remaining)` records and the skip advances by
/// the batch size. A short page means the data ran out.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Records per call, already capped at the API maximum
    pub batch: u64,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(batch: u64) -> Self {
        Self {
            batch: batch.max(1),
        }
    }

    fn request(&self, state: &PaginationState) -> PageRequest {
        let limit = state
            .remaining()
            .map_or(self.batch, |remaining| remaining.min(self.batch));
        PageRequest::Offset {
            skip: state.skip,
            limit,
        }
    }
}

impl Paginator for OffsetPaginator {
    fn first_request(&self, state: &PaginationState) -> PageRequest {
        self.request(state)
    }

    fn probe_request(&self) -> PageRequest {
        PageRequest::Offset { skip: 0, limit: 1 }
    }

    fn next_request(
        &self,
        request: &PageRequest,
        _meta: &PageMeta,
        received: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        if received == 0 || state.target_reached() {
            return NextPage::Done;
        }

        // Fewer records than asked for: end of data
        if (received as u64) < request.size() {
            return NextPage::Done;
        }

        state.skip += self.batch;
        NextPage::Continue(self.request(state))
    }
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Cursor/continuation-token pagination
///
/// Page size is fixed. Stops on an empty page, a missing or empty
/// continuation token, or once the target is reached.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Records per call, already capped at the API maximum
    pub page_size: u64,
    /// Cursor that asks for the first page
    pub initial_cursor: String,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(page_size: u64, initial_cursor: impl Into<String>) -> Self {
        Self {
            page_size: page_size.max(1),
            initial_cursor: initial_cursor.into(),
        }
    }
}

impl Paginator for CursorPaginator {
    fn first_request(&self, state: &PaginationState) -> PageRequest {
        PageRequest::Cursor {
            cursor: state
                .cursor
                .clone()
                .unwrap_or_else(|| self.initial_cursor.clone()),
            page_size: self.page_size,
        }
    }

    fn probe_request(&self) -> PageRequest {
        PageRequest::Cursor {
            cursor: self.initial_cursor.clone(),
            page_size: 1,
        }
    }

    fn next_request(
        &self,
        _request: &PageRequest,
        meta: &PageMeta,
        received: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        if received == 0 || state.target_reached() {
            return NextPage::Done;
        }

        match meta.next_cursor.as_deref() {
            Some(cursor) if !cursor.is_empty() => {
                state.cursor = Some(cursor.to_string());
                NextPage::Continue(PageRequest::Cursor {
                    cursor: cursor.to_string(),
                    page_size: self.page_size,
                })
            }
            _ => NextPage::Done,
        }
    }
}

/// Build the strategy for a mode
pub fn paginator_for(mode: &PaginationMode) -> Box<dyn Paginator> {
    let batch = mode.effective_batch();
    match mode {
        PaginationMode::Offset { .. } => Box::new(OffsetPaginator::new(batch)),
        PaginationMode::Cursor { initial_cursor, .. } => {
            Box::new(CursorPaginator::new(batch, initial_cursor.clone()))
        }
    }
}
