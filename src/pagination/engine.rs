//! Pagination engine
//!
//! Drives a [`Paginator`] against a [`PageFetcher`] until the target is
//! reached, the data runs out, a page fails, or the run is cancelled. A
//! failing page never surfaces as an error: whatever was accumulated before
//! it is returned with phase [`PaginationPhase::Failed`].

use super::strategies::paginator_for;
use super::types::{
    CancelSignal, NextPage, PageFetcher, PageRequest, PaginationMode, PaginationPhase,
    PaginationState, ResultSet,
};
use crate::error::{Error, Result};
use crate::http::RateLimiter;
use crate::telemetry::{report, TelemetrySink, TracingTelemetry};
use crate::types::QueryDescriptor;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default per-page timeout
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Runs retrieval loops
#[derive(Clone)]
pub struct PaginationEngine {
    rate_limiter: RateLimiter,
    telemetry: Arc<dyn TelemetrySink>,
    page_timeout: Duration,
    cancel: CancelSignal,
}

impl PaginationEngine {
    /// Create an engine sharing `rate_limiter`
    pub fn new(rate_limiter: RateLimiter, telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            rate_limiter,
            telemetry,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            cancel: CancelSignal::new(),
        }
    }

    /// Set the per-page timeout
    #[must_use]
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout = timeout;
        self
    }

    /// Use an external cancellation signal
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retrieve the result set for `descriptor`
    pub async fn run(
        &self,
        fetcher: &dyn PageFetcher,
        descriptor: &QueryDescriptor,
        mode: &PaginationMode,
    ) -> ResultSet {
        let source = descriptor.source.as_str();
        let paginator = paginator_for(mode);
        let mut state = PaginationState::new(descriptor.ceiling);
        let mut result = ResultSet {
            source: source.to_string(),
            ..Default::default()
        };

        info!(
            "Retrieving from '{}' ({} mode, batch {}, ceiling {:?})",
            source,
            mode.name(),
            mode.effective_batch(),
            descriptor.ceiling
        );

        if descriptor.ceiling == Some(0) {
            return self
                .probe_total(fetcher, descriptor, paginator.probe_request(), result)
                .await;
        }

        let mut request = paginator.first_request(&state);
        loop {
            if self.cancel.is_cancelled() {
                info!("Retrieval from '{}' cancelled after {} pages", source, state.page);
                state.phase = PaginationPhase::Cancelled;
                break;
            }

            let index = state.page + 1;
            state.phase = PaginationPhase::Fetching;
            self.rate_limiter.acquire().await;

            let started = Instant::now();
            let page = match self.fetch(fetcher, descriptor, &request, index).await {
                Ok(page) => page,
                Err(e) => {
                    debug!(
                        "Stopping '{}' at page {}, keeping {} records",
                        source, index, state.retrieved
                    );
                    report(self.telemetry.warning(source, &e.to_string()));
                    state.phase = PaginationPhase::Failed;
                    result.failure = Some(e.to_string());
                    break;
                }
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            state.phase = PaginationPhase::Accumulating;
            state.page = index;
            if index == 1 {
                state.fix_target(page.meta.total_count);
            }

            let received = page.len();
            let keep = state
                .remaining()
                .map_or(received, |remaining| received.min(remaining as usize));
            result.records.extend(page.records.into_iter().take(keep));
            state.retrieved += keep as u64;

            debug!(
                "Page {} from '{}': {} records ({} kept, {} total)",
                index, source, received, keep, state.retrieved
            );
            report(
                self.telemetry
                    .page_completed(source, index, received, duration_ms),
            );

            match paginator.next_request(&request, &page.meta, received, &mut state) {
                NextPage::Continue(next) => request = next,
                NextPage::Done => {
                    state.phase = PaginationPhase::Done;
                    break;
                }
            }
        }

        result.pages_fetched = state.page;
        result.total_retrieved = state.retrieved;
        result.total_available = state
            .total_available
            .unwrap_or(state.retrieved)
            .max(state.retrieved);
        result.phase = state.phase;
        result
    }

    /// Single-record request that only establishes the total
    async fn probe_total(
        &self,
        fetcher: &dyn PageFetcher,
        descriptor: &QueryDescriptor,
        request: PageRequest,
        mut result: ResultSet,
    ) -> ResultSet {
        self.rate_limiter.acquire().await;
        match self.fetch(fetcher, descriptor, &request, 1).await {
            Ok(page) => {
                result.total_available = page.meta.total_count.unwrap_or(0);
                result.phase = PaginationPhase::Done;
                debug!(
                    "'{}' reports {} records; ceiling 0, nothing retrieved",
                    descriptor.source, result.total_available
                );
            }
            Err(e) => {
                report(self.telemetry.warning(&descriptor.source, &e.to_string()));
                result.phase = PaginationPhase::Failed;
                result.failure = Some(e.to_string());
            }
        }
        result
    }

    async fn fetch(
        &self,
        fetcher: &dyn PageFetcher,
        descriptor: &QueryDescriptor,
        request: &PageRequest,
        index: u32,
    ) -> Result<super::types::Page> {
        match tokio::time::timeout(self.page_timeout, fetcher.fetch_page(descriptor, request)).await
        {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(e)) => Err(Error::page_fetch(index, e.to_string())),
            Err(_) => Err(Error::page_fetch(
                index,
                format!("timed out after {:?}", self.page_timeout),
            )),
        }
    }
}

impl Default for PaginationEngine {
    fn default() -> Self {
        Self::new(RateLimiter::default(), Arc::new(TracingTelemetry))
    }
}

impl std::fmt::Debug for PaginationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationEngine")
            .field("rate_limiter", &self.rate_limiter)
            .field("page_timeout", &self.page_timeout)
            .finish_non_exhaustive()
    }
}
