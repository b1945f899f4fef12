//! Field discovery
//!
//! A [`FieldDiscovery`] learns the valid field names of a source from the
//! source itself. Two response styles are understood:
//!
//! - **describe**: a dedicated metadata request returning
//!   `{"fields": {name: {"is_facet": bool, "is_filter": bool}}, "metrics": [...]}`
//! - **probe**: a deliberately invalid request whose error message lists the
//!   valid names after a marker phrase, e.g.
//!   `"... Valid fields are type, publication_year."`

use super::types::{FieldKind, SourceSchema};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Learns the valid field names of a source
#[async_trait]
pub trait FieldDiscovery: Send + Sync {
    /// Discover the schema of `source`
    async fn discover(&self, source: &str) -> Result<SourceSchema>;
}

/// Discovery over schemas known up front
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    schemas: HashMap<String, SourceSchema>,
}

impl StaticDiscovery {
    /// Create an empty static discovery
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema
    #[must_use]
    pub fn with_schema(mut self, schema: SourceSchema) -> Self {
        self.schemas.insert(schema.source.clone(), schema);
        self
    }
}

#[async_trait]
impl FieldDiscovery for StaticDiscovery {
    async fn discover(&self, source: &str) -> Result<SourceSchema> {
        self.schemas
            .get(source)
            .cloned()
            .ok_or_else(|| Error::discovery(source, "no schema registered"))
    }
}

/// Build a schema from a describe response
///
/// `fields` entries that are not objects are ignored. Metrics may be plain
/// names or objects carrying a `name`.
pub fn parse_describe_response(source: &str, fields: &Value, metrics: &Value) -> SourceSchema {
    let mut schema = SourceSchema::new(source);

    if let Some(map) = fields.as_object() {
        schema.insert_all(FieldKind::Facet, flagged(map, "is_facet"));
        schema.insert_all(FieldKind::Filter, flagged(map, "is_filter"));
    }

    if let Some(items) = metrics.as_array() {
        let names = items.iter().filter_map(|metric| match metric {
            Value::String(name) => Some(name.clone()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        });
        schema.insert_all(FieldKind::Metric, names);
    }

    schema
}

fn flagged(map: &serde_json::Map<String, Value>, flag: &str) -> Vec<String> {
    map.iter()
        .filter(|(_, info)| info.get(flag).and_then(Value::as_bool).unwrap_or(false))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Extract the valid names listed after `marker` in a probe error message
///
/// Returns `None` when the marker is absent.
pub fn parse_probe_message(message: &str, marker: &str) -> Option<Vec<String>> {
    let (_, listed) = message.split_once(marker)?;
    let listed = listed.trim_start_matches(':').trim().trim_end_matches('.');

    Some(
        listed
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Pull the message text out of a probe error body
///
/// JSON bodies carry it under `message` (falling back to `error`); anything
/// else is taken verbatim.
pub fn probe_error_message(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(Value::as_str)
            .map_or_else(|| body.to_string(), str::to_string),
        Err(_) => body.to_string(),
    }
}
