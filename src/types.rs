//! Common types used throughout harvestkit
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use crate::schema::FieldKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// One semi-structured record as returned by a source
pub type Record = JsonObject;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
        }
    }
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Output Format
// ============================================================================

/// Which files a harvest writes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Parquet (reconciled) plus JSONL (raw)
    #[default]
    Dual,
    /// Parquet only
    Parquet,
    /// JSONL only
    Jsonl,
    /// Tab-separated, nested values as JSON text
    Tsv,
    /// Comma-separated, nested values as JSON text
    Csv,
}

impl OutputFormat {
    /// File extension for single-file formats
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Dual | OutputFormat::Parquet => "parquet",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Csv => "csv",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Dual => write!(f, "dual"),
            other => write!(f, "{}", other.extension()),
        }
    }
}

// ============================================================================
// Query Descriptor
// ============================================================================

/// Opaque description of one retrieval request
///
/// The core never interprets these fields; source adapters map them onto
/// their own request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Source name (e.g. "openalex-works")
    pub source: String,
    /// Free-text search term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Filter expression in the source's own syntax
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Comma-separated list of fields to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    /// Sort expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Extra request parameters passed through verbatim
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    /// Maximum number of records to retrieve
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceiling: Option<u64>,
    /// Field references checked against the source schema before any request
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<FieldReference>,
}

/// A named field the query depends on (a facet to group by, a metric, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReference {
    pub kind: FieldKind,
    pub name: String,
}

impl QueryDescriptor {
    /// Create a descriptor for a source
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Set the search term
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into().none_if_empty();
        self
    }

    /// Set the filter expression
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into().none_if_empty();
        self
    }

    /// Set the select list
    #[must_use]
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into().none_if_empty();
        self
    }

    /// Set the sort expression
    #[must_use]
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into().none_if_empty();
        self
    }

    /// Add a pass-through parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the record ceiling
    #[must_use]
    pub fn with_ceiling(mut self, ceiling: u64) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Add a field reference
    #[must_use]
    pub fn with_reference(mut self, kind: FieldKind, name: impl Into<String>) -> Self {
        self.references.push(FieldReference {
            kind,
            name: name.into(),
        });
        self
    }

    /// Names referenced with `kind`, in insertion order
    pub fn references_of(&self, kind: FieldKind) -> Vec<&str> {
        self.references
            .iter()
            .filter(|reference| reference.kind == kind)
            .map(|reference| reference.name.as_str())
            .collect()
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
