//! Batch processing module
//!
//! Tracks many independent items processed in parallel.
//!
//! # Features
//!
//! - Per-item status, progress and 1-based index
//! - Failure log with full error text; short status text per item
//! - Counters and snapshots read under a single lock
//! - Bounded worker pool over a `futures` stream

mod runner;
mod tracker;
mod types;

pub use runner::run_parallel;
pub use tracker::ProgressTracker;
pub use types::{
    FailedItem, ItemProgress, ItemStatus, ProgressSnapshot, STATUS_TEXT_LIMIT,
    SUMMARY_FAILURE_LIMIT,
};
