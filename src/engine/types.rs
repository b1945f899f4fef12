//! Engine types
//!
//! Shared run state and the outcome of one harvest.

use crate::config::HarvestConfig;
use crate::http::RateLimiter;
use crate::output::PersistedFile;
use crate::pagination::{CancelSignal, PageFetcher, PaginationMode, PaginationPhase};
use crate::reconcile::{ColumnCoercion, ColumnShape};
use crate::schema::SchemaRegistry;
use crate::telemetry::{OperationStats, TelemetrySink, TracingTelemetry};
use serde::Serialize;
use std::sync::Arc;

/// State shared by every harvest in a run
///
/// Clones share the same rate limiter clock, schema cache, sink and
/// cancellation flag.
#[derive(Clone)]
pub struct RunContext {
    /// Request pacing across all sources
    pub rate_limiter: RateLimiter,
    /// Schema cache
    pub registry: Arc<SchemaRegistry>,
    /// Progress and diagnostics receiver
    pub telemetry: Arc<dyn TelemetrySink>,
    /// Cooperative cancellation, checked between pages
    pub cancel: CancelSignal,
}

impl RunContext {
    /// Create a context for `config` reporting to `telemetry`
    pub fn new(config: &HarvestConfig, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            rate_limiter: RateLimiter::new(&config.rate_limiter_config()),
            registry: Arc::new(SchemaRegistry::new(Arc::clone(&telemetry))),
            telemetry,
            cancel: CancelSignal::new(),
        }
    }

    /// Create a context reporting through `tracing`
    pub fn with_tracing(config: &HarvestConfig) -> Self {
        Self::new(config, Arc::new(TracingTelemetry))
    }

    /// Stop every running harvest after its current page
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// A source the harvester can page through
#[derive(Clone)]
pub struct RegisteredSource {
    pub fetcher: Arc<dyn PageFetcher>,
    pub mode: PaginationMode,
}

/// What one harvest produced
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HarvestOutcome {
    /// Source name
    pub source: String,
    /// Free-text query term, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Records the source reported as available
    pub total_available: u64,
    /// Records retrieved and persisted
    pub total_retrieved: u64,
    /// Pages fetched successfully
    pub pages_fetched: u32,
    /// Terminal pagination phase
    pub phase: PaginationPhase,
    /// Why retrieval stopped early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    /// Files written
    pub files: Vec<PersistedFile>,
    /// Reconciled column shapes, in column order
    pub columns: Vec<(String, ColumnShape)>,
    /// Columns where reconciliation nulled values
    pub coercions: Vec<ColumnCoercion>,
    /// Wall-clock duration
    pub duration_ms: u64,
}

impl HarvestOutcome {
    /// Whether retrieval stopped before the target
    pub fn is_partial(&self) -> bool {
        self.failure.is_some() || self.phase != PaginationPhase::Done
    }

    /// Total bytes written across all files
    pub fn bytes_written(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }

    /// Values nulled by reconciliation across all columns
    pub fn nulled(&self) -> usize {
        self.coercions.iter().map(|c| c.nulled).sum()
    }

    /// Summary for the telemetry sink
    pub fn stats(&self) -> OperationStats {
        OperationStats {
            source: self.source.clone(),
            total_available: self.total_available,
            total_retrieved: self.total_retrieved,
            pages_fetched: self.pages_fetched,
            phase: self.phase.to_string(),
            duration_ms: self.duration_ms,
            files_written: self.files.len(),
        }
    }
}
