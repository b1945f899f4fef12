//! Schema registry
//!
//! Caches one [`SourceSchema`] per source for the lifetime of the process.
//! The first reference to a source triggers discovery; every later
//! validation is a cache lookup. Entries are write-once and never
//! invalidated. Two callers racing on an unknown source may both run
//! discovery, in which case the last writer wins.

use super::discovery::FieldDiscovery;
use super::types::{rejection_message, FieldKind, SourceSchema, AGGREGATE_FUNCTIONS};
use crate::error::{Error, Result};
use crate::telemetry::{report, TelemetrySink, TracingTelemetry};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Per-source cache of valid field names
pub struct SchemaRegistry {
    cache: RwLock<HashMap<String, Arc<SourceSchema>>>,
    discoveries: RwLock<HashMap<String, Arc<dyn FieldDiscovery>>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl SchemaRegistry {
    /// Create an empty registry
    pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            discoveries: RwLock::new(HashMap::new()),
            telemetry,
        }
    }

    /// Register the discovery used for `source`
    pub async fn register(&self, source: impl Into<String>, discovery: Arc<dyn FieldDiscovery>) {
        self.discoveries.write().await.insert(source.into(), discovery);
    }

    /// Seed the cache directly, skipping discovery
    pub async fn insert(&self, schema: SourceSchema) {
        self.cache
            .write()
            .await
            .insert(schema.source.clone(), Arc::new(schema));
    }

    /// Whether `source` has already been resolved
    pub async fn is_cached(&self, source: &str) -> bool {
        self.cache.read().await.contains_key(source)
    }

    /// Schema for `source`, discovering it on first use
    ///
    /// Never fails: a source without a registered discovery, or whose
    /// discovery errors, resolves to a permissive schema.
    pub async fn schema(&self, source: &str) -> Arc<SourceSchema> {
        if let Some(schema) = self.cache.read().await.get(source) {
            return Arc::clone(schema);
        }

        let discovery = self.discoveries.read().await.get(source).cloned();
        let schema = match discovery {
            Some(discovery) => match discovery.discover(source).await {
                Ok(mut schema) => {
                    schema.source = source.to_string();
                    info!(
                        "Schema loaded for '{}': {} facets, {} filters, {} select fields, {} metrics",
                        source,
                        schema.count(FieldKind::Facet),
                        schema.count(FieldKind::Filter),
                        schema.count(FieldKind::Select),
                        schema.count(FieldKind::Metric)
                    );
                    schema
                }
                Err(e) => {
                    let err = match e {
                        Error::Discovery { .. } => e,
                        other => Error::discovery(source, other.to_string()),
                    };
                    debug!("Validation disabled for '{}'", source);
                    report(self.telemetry.warning(source, &err.to_string()));
                    SourceSchema::permissive(source)
                }
            },
            None => {
                debug!("No discovery registered for '{}', accepting all fields", source);
                SourceSchema::permissive(source)
            }
        };

        let schema = Arc::new(schema);
        self.cache
            .write()
            .await
            .insert(source.to_string(), Arc::clone(&schema));
        schema
    }

    /// Cached schema for display, discovering it if needed
    pub async fn describe(&self, source: &str) -> Arc<SourceSchema> {
        self.schema(source).await
    }

    /// Reject `field` unless it is valid for `(source, kind)`
    pub async fn validate(&self, source: &str, kind: FieldKind, field: &str) -> Result<()> {
        let schema = self.schema(source).await;
        let Some(valid) = schema.valid_fields(kind) else {
            return Ok(());
        };

        if valid.contains(field) {
            debug!("{} '{}' validated for '{}'", kind, field, source);
            return Ok(());
        }

        Err(Error::schema_violation(
            source,
            kind,
            rejection_message(source, kind, &[field], valid),
        ))
    }

    /// Validate a comma-separated list of names, reporting all invalid ones
    pub async fn validate_fields(&self, source: &str, kind: FieldKind, list: &str) -> Result<()> {
        let fields: Vec<&str> = split_list(list).collect();
        if fields.is_empty() {
            return Ok(());
        }

        let schema = self.schema(source).await;
        let Some(valid) = schema.valid_fields(kind) else {
            return Ok(());
        };

        let invalid: Vec<&str> = fields
            .into_iter()
            .filter(|field| !valid.contains(*field))
            .collect();
        if invalid.is_empty() {
            return Ok(());
        }

        Err(Error::schema_violation(
            source,
            kind,
            rejection_message(source, kind, &invalid, valid),
        ))
    }

    /// Validate an aggregation expression such as `count, sum(funding), citations_mean`
    ///
    /// `func(field)` is accepted for any known aggregate function regardless
    /// of `field`; `count` is always accepted; bare names must be metrics.
    pub async fn validate_metric_expression(&self, source: &str, expression: &str) -> Result<()> {
        let items: Vec<&str> = split_list(expression).collect();
        if items.is_empty() {
            return Ok(());
        }

        let schema = self.schema(source).await;
        let Some(valid) = schema.valid_fields(FieldKind::Metric) else {
            return Ok(());
        };

        let invalid: Vec<&str> = items
            .into_iter()
            .filter(|item| match item.split_once('(') {
                Some((function, _)) => !AGGREGATE_FUNCTIONS.contains(&function.trim()),
                None => *item != "count" && !valid.contains(*item),
            })
            .collect();
        if invalid.is_empty() {
            return Ok(());
        }

        Err(Error::schema_violation(
            source,
            FieldKind::Metric,
            rejection_message(source, FieldKind::Metric, &invalid, valid),
        ))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new(Arc::new(TracingTelemetry))
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry").finish_non_exhaustive()
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}
