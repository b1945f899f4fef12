//! Thread-safe batch progress tracker

use super::types::{
    FailedItem, ItemProgress, ItemStatus, ProgressSnapshot, SUMMARY_FAILURE_LIMIT,
};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Default)]
struct TrackerState {
    status: HashMap<String, ItemStatus>,
    progress: HashMap<String, ItemProgress>,
    index: HashMap<String, usize>,
    failures: Vec<FailedItem>,
}

impl TrackerState {
    fn count(&self, predicate: impl Fn(&ItemStatus) -> bool) -> usize {
        self.status.values().filter(|status| predicate(status)).count()
    }
}

/// Per-item status, progress and failure log for a batch
///
/// All state sits behind one mutex, so counters read under the same lock
/// as the updates they count.
#[derive(Debug)]
pub struct ProgressTracker {
    operation: String,
    total_items: usize,
    started: Instant,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    /// Create a tracker for `total_items` items
    pub fn new(operation: impl Into<String>, total_items: usize) -> Self {
        Self {
            operation: operation.into(),
            total_items,
            started: Instant::now(),
            state: Mutex::new(TrackerState::default()),
        }
    }

    /// Operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Number of items in the batch
    pub fn total_items(&self) -> usize {
        self.total_items
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the 1-based position of an item
    pub fn set_index(&self, id: &str, index: usize) {
        self.lock().index.insert(id.to_string(), index);
    }

    /// Mark an item as already present
    pub fn set_existing(&self, id: &str) {
        self.lock()
            .status
            .insert(id.to_string(), ItemStatus::Existing);
    }

    /// Mark an item as in flight and reset its progress
    pub fn set_processing(&self, id: &str) {
        let mut state = self.lock();
        state.status.insert(id.to_string(), ItemStatus::Processing);
        state.progress.insert(id.to_string(), ItemProgress::default());
    }

    /// Update the progress of an item
    pub fn update_progress(&self, id: &str, current: u64, total: u64) {
        self.lock()
            .progress
            .insert(id.to_string(), ItemProgress { current, total });
    }

    /// Mark an item as finished
    pub fn set_completed(&self, id: &str) {
        self.lock()
            .status
            .insert(id.to_string(), ItemStatus::Completed);
    }

    /// Mark an item as failed, keeping the full error in the failure log
    pub fn set_failed(&self, id: &str, error: &str) {
        warn!("{} failed for {}: {}", self.operation, id, error);
        let mut state = self.lock();
        state.status.insert(id.to_string(), ItemStatus::failed(error));
        state.failures.push(FailedItem {
            id: id.to_string(),
            error: error.to_string(),
        });
    }

    /// Current status of an item
    pub fn status(&self, id: &str) -> Option<ItemStatus> {
        self.lock().status.get(id).cloned()
    }

    /// Current progress of an item
    pub fn progress(&self, id: &str) -> Option<ItemProgress> {
        self.lock().progress.get(id).copied()
    }

    pub fn existing_count(&self) -> usize {
        self.lock().count(|s| *s == ItemStatus::Existing)
    }

    pub fn processing_count(&self) -> usize {
        self.lock().count(|s| *s == ItemStatus::Processing)
    }

    pub fn completed_count(&self) -> usize {
        self.lock().count(|s| *s == ItemStatus::Completed)
    }

    pub fn failed_count(&self) -> usize {
        self.lock().count(|s| matches!(s, ItemStatus::Failed(_)))
    }

    /// Items that are done (existing + completed + failed)
    pub fn processed_count(&self) -> usize {
        self.lock().count(ItemStatus::is_settled)
    }

    /// Failure log in the order failures happened
    pub fn failures(&self) -> Vec<FailedItem> {
        self.lock().failures.clone()
    }

    /// All counters read under one lock
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_of(&self.lock())
    }

    fn snapshot_of(&self, state: &TrackerState) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total_items,
            existing: state.count(|s| *s == ItemStatus::Existing),
            processing: state.count(|s| *s == ItemStatus::Processing),
            completed: state.count(|s| *s == ItemStatus::Completed),
            failed: state.count(|s| matches!(s, ItemStatus::Failed(_))),
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }

    /// Plain-text summary with the first failures listed
    pub fn summary(&self) -> String {
        let state = self.lock();
        let snapshot = self.snapshot_of(&state);
        let total = self.total_items;
        let elapsed = snapshot.elapsed_ms as f64 / 1000.0;

        let mut out = String::new();
        let _ = writeln!(out, "{} complete in {:.1}s", self.operation, elapsed);
        let _ = writeln!(out, "  Existing:  {}/{}", snapshot.existing, total);
        let _ = writeln!(out, "  Completed: {}/{}", snapshot.completed, total);
        let _ = writeln!(out, "  Failed:    {}/{}", snapshot.failed, total);

        if !state.failures.is_empty() {
            let _ = writeln!(out, "Failed items ({}):", state.failures.len());
            for failure in state.failures.iter().take(SUMMARY_FAILURE_LIMIT) {
                let index = state
                    .index
                    .get(&failure.id)
                    .map_or_else(|| "?".to_string(), ToString::to_string);
                let _ = writeln!(
                    out,
                    "  - [{}/{}] {}: {}",
                    index, total, failure.id, failure.error
                );
            }
            if state.failures.len() > SUMMARY_FAILURE_LIMIT {
                let _ = writeln!(
                    out,
                    "  ... and {} more",
                    state.failures.len() - SUMMARY_FAILURE_LIMIT
                );
            }
        }

        out
    }
}
