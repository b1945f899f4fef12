//! Telemetry sink
//!
//! The retrieval core reports progress through [`TelemetrySink`]. Sink
//! failures never affect a harvest: callers go through [`report`], which logs
//! the error at debug level and moves on.

use crate::error::Result;
use serde::Serialize;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Summary of one finished retrieval operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    /// Source name
    pub source: String,
    /// Records the source reported as available
    pub total_available: u64,
    /// Records actually retrieved
    pub total_retrieved: u64,
    /// Pages fetched successfully
    pub pages_fetched: u32,
    /// Terminal pagination phase ("done", "failed", "cancelled")
    pub phase: String,
    /// Wall-clock duration of the operation
    pub duration_ms: u64,
    /// Number of files written
    pub files_written: usize,
}

/// Receiver for progress and diagnostics
pub trait TelemetrySink: Send + Sync {
    /// A page was fetched
    fn page_completed(
        &self,
        source: &str,
        page_index: u32,
        records: usize,
        duration_ms: u64,
    ) -> Result<()>;

    /// Something went wrong but the operation continues
    fn warning(&self, source: &str, message: &str) -> Result<()>;

    /// An operation finished
    fn operation_summary(&self, stats: &OperationStats) -> Result<()>;
}

/// Swallow a sink failure
pub fn report(result: Result<()>) {
    if let Err(e) = result {
        debug!("Telemetry sink error ignored: {}", e);
    }
}

/// Sink that forwards everything to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn page_completed(
        &self,
        source: &str,
        page_index: u32,
        records: usize,
        duration_ms: u64,
    ) -> Result<()> {
        debug!(
            source,
            page = page_index,
            records,
            duration_ms,
            "Page fetched"
        );
        Ok(())
    }

    fn warning(&self, source: &str, message: &str) -> Result<()> {
        warn!(source, "{}", message);
        Ok(())
    }

    fn operation_summary(&self, stats: &OperationStats) -> Result<()> {
        info!(
            source = %stats.source,
            available = stats.total_available,
            retrieved = stats.total_retrieved,
            pages = stats.pages_fetched,
            phase = %stats.phase,
            duration_ms = stats.duration_ms,
            files = stats.files_written,
            "Harvest finished"
        );
        Ok(())
    }
}

/// Event captured by [`RecordingTelemetry`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    Page {
        source: String,
        index: u32,
        records: usize,
    },
    Warning {
        source: String,
        message: String,
    },
    Summary(OperationStats),
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events recorded so far
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.lock().clone()
    }

    /// Warnings recorded so far
    pub fn warnings(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TelemetryEvent::Warning { message, .. } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TelemetryEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TelemetrySink for RecordingTelemetry {
    fn page_completed(
        &self,
        source: &str,
        page_index: u32,
        records: usize,
        _duration_ms: u64,
    ) -> Result<()> {
        self.lock().push(TelemetryEvent::Page {
            source: source.to_string(),
            index: page_index,
            records,
        });
        Ok(())
    }

    fn warning(&self, source: &str, message: &str) -> Result<()> {
        self.lock().push(TelemetryEvent::Warning {
            source: source.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn operation_summary(&self, stats: &OperationStats) -> Result<()> {
        self.lock().push(TelemetryEvent::Summary(stats.clone()));
        Ok(())
    }
}

/// Formatted `tracing` output collected in memory
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture(std::sync::Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl LogCapture {
    /// Route this thread's events here until the guard drops
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Lines logged at WARN
    pub(crate) fn warn_lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|line| line.contains(" WARN "))
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
