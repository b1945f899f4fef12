//! Batch progress types

use serde::Serialize;

/// Longest status text kept for a failed item
pub const STATUS_TEXT_LIMIT: usize = 50;

/// Failures listed in a summary
pub const SUMMARY_FAILURE_LIMIT: usize = 20;

/// Status of one batch item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "status", content = "reason")]
pub enum ItemStatus {
    /// Already present, skipped
    Existing,
    /// In flight
    Processing,
    /// Finished successfully
    Completed,
    /// Finished with an error (short form)
    Failed(String),
}

impl ItemStatus {
    /// Failed status with the reason cut to [`STATUS_TEXT_LIMIT`] characters
    pub fn failed(reason: &str) -> Self {
        Self::Failed(reason.chars().take(STATUS_TEXT_LIMIT).collect())
    }

    /// Whether the item is finished (existing, completed or failed)
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

/// Byte or unit progress of one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemProgress {
    pub current: u64,
    pub total: u64,
}

/// A failure kept in full for the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub id: String,
    pub error: String,
}

/// Point-in-time counters of a tracker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub existing: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

impl ProgressSnapshot {
    /// Items that are done (existing + completed + failed)
    pub fn processed(&self) -> usize {
        self.existing + self.completed + self.failed
    }
}
