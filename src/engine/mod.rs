//! Harvest engine module
//!
//! Drives one retrieval operation end to end: validate the descriptor's
//! field references, page through the source, reconcile column shapes and
//! persist the result.
//!
//! # Features
//!
//! - **Fail Fast on Bad Fields**: schema violations abort before any page request
//! - **Partial Results**: a failing page ends retrieval, the records so far are kept
//! - **Bounded Concurrency**: `harvest_many` runs independent harvests on a worker pool
//! - **Shared Pacing**: every source draws from one rate limiter in [`RunContext`]

mod types;

pub use types::{HarvestOutcome, RegisteredSource, RunContext};

use crate::batch::{run_parallel, ProgressTracker};
use crate::config::HarvestConfig;
use crate::error::{Error, Result};
use crate::output::DualFormatPersister;
use crate::pagination::{PageFetcher, PaginationEngine, PaginationMode};
use crate::reconcile::TypeReconciler;
use crate::schema::{FieldDiscovery, FieldKind};
use crate::source::HttpSource;
use crate::telemetry::report;
use crate::types::QueryDescriptor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runs harvests against registered sources
pub struct Harvester {
    config: HarvestConfig,
    context: RunContext,
    persister: DualFormatPersister,
    sources: HashMap<String, RegisteredSource>,
}

impl Harvester {
    /// Create a harvester reporting through `tracing`
    pub fn new(config: HarvestConfig) -> Self {
        let context = RunContext::with_tracing(&config);
        Self::with_context(config, context)
    }

    /// Create a harvester on an existing run context
    pub fn with_context(config: HarvestConfig, context: RunContext) -> Self {
        let persister = config.persister();
        Self {
            config,
            context,
            persister,
            sources: HashMap::new(),
        }
    }

    /// Run settings
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Shared run state
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Register a page fetcher under `name`
    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        fetcher: Arc<dyn PageFetcher>,
        mode: PaginationMode,
    ) {
        self.sources
            .insert(name.into(), RegisteredSource { fetcher, mode });
    }

    /// Register the field discovery for `name`
    pub async fn add_discovery(&self, name: impl Into<String>, discovery: Arc<dyn FieldDiscovery>) {
        self.context.registry.register(name, discovery).await;
    }

    /// Register an HTTP source, with its discovery when it defines one
    pub async fn add_http_source(&mut self, source: HttpSource) {
        let name = source.name().to_string();
        let mode = source.pagination_mode();
        let has_discovery = source.config().discovery.is_some();
        let source = Arc::new(source.with_rate_limiter(self.context.rate_limiter.clone()));

        if has_discovery {
            self.add_discovery(name.clone(), Arc::clone(&source) as Arc<dyn FieldDiscovery>)
                .await;
        }
        self.add_source(name, source, mode);
    }

    /// Names of the registered sources, sorted
    pub fn source_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Check every field the descriptor references against the source schema
    ///
    /// Select lists are checked as a whole so one error names every bad
    /// field; metric references are full expressions.
    pub async fn validate_descriptor(&self, descriptor: &QueryDescriptor) -> Result<()> {
        let registry = &self.context.registry;
        let source = descriptor.source.as_str();

        if let Some(select) = &descriptor.select {
            registry
                .validate_fields(source, FieldKind::Select, select)
                .await?;
        }

        for reference in &descriptor.references {
            match reference.kind {
                FieldKind::Metric => {
                    registry
                        .validate_metric_expression(source, &reference.name)
                        .await?;
                }
                kind => registry.validate(source, kind, &reference.name).await?,
            }
        }

        Ok(())
    }

    /// Run one harvest
    ///
    /// Fails only on unknown sources, schema violations and persistence
    /// failures; a page failure yields a partial outcome.
    pub async fn harvest(&self, descriptor: &QueryDescriptor) -> Result<HarvestOutcome> {
        let start = Instant::now();
        let source = self
            .sources
            .get(&descriptor.source)
            .ok_or_else(|| Error::UnknownSource {
                name: descriptor.source.clone(),
            })?;

        self.validate_descriptor(descriptor).await?;

        let engine = PaginationEngine::new(
            self.context.rate_limiter.clone(),
            Arc::clone(&self.context.telemetry),
        )
        .with_page_timeout(self.config.page_timeout())
        .with_cancel(self.context.cancel.clone());

        let result = engine
            .run(source.fetcher.as_ref(), descriptor, &source.mode)
            .await;
        if let Some(reason) = &result.failure {
            warn!(
                "Harvest from '{}' stopped early after {} records: {}",
                descriptor.source, result.total_retrieved, reason
            );
        }

        let table = TypeReconciler::new().reconcile(&result.records);
        let coercions: Vec<_> = table
            .coercions
            .iter()
            .filter(|c| c.nulled > 0)
            .cloned()
            .collect();

        let files = self
            .persister
            .persist(
                &descriptor.source,
                descriptor.query.as_deref(),
                &result,
                &table,
            )
            .inspect_err(|e| {
                report(
                    self.context
                        .telemetry
                        .warning(&descriptor.source, &e.to_string()),
                );
            })?;

        let outcome = HarvestOutcome {
            source: descriptor.source.clone(),
            query: descriptor.query.clone(),
            total_available: result.total_available,
            total_retrieved: result.total_retrieved,
            pages_fetched: result.pages_fetched,
            phase: result.phase,
            failure: result.failure,
            files,
            columns: table.shapes(),
            coercions,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Harvested {}/{} records from '{}' into {} file(s)",
            outcome.total_retrieved,
            outcome.total_available,
            outcome.source,
            outcome.files.len()
        );
        report(self.context.telemetry.operation_summary(&outcome.stats()));

        Ok(outcome)
    }

    /// Run independent harvests, at most `max_parallel` at a time
    ///
    /// Every descriptor gets an item in `tracker`; a failing harvest is
    /// recorded there and does not stop the others. Results are in input
    /// order.
    pub async fn harvest_many(
        &self,
        descriptors: Vec<QueryDescriptor>,
        tracker: Arc<ProgressTracker>,
    ) -> Vec<anyhow::Result<HarvestOutcome>> {
        let items = descriptors
            .into_iter()
            .enumerate()
            .map(|(i, descriptor)| (item_id(i, &descriptor), descriptor))
            .collect();

        run_parallel(
            tracker,
            items,
            self.config.max_parallel,
            |id, descriptor, tracker| async move {
                tracker.set_processing(&id);
                let outcome = self.harvest(&descriptor).await?;
                tracker.update_progress(&id, outcome.total_retrieved, outcome.total_available);
                Ok::<_, anyhow::Error>(outcome)
            },
        )
        .await
    }
}

/// Tracker id for the `index`-th descriptor of a batch
fn item_id(index: usize, descriptor: &QueryDescriptor) -> String {
    match &descriptor.query {
        Some(query) => format!("{}:{} {}", index + 1, descriptor.source, query),
        None => format!("{}:{}", index + 1, descriptor.source),
    }
}
