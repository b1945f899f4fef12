//! Error types for harvestkit
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Only [`Error::SchemaViolation`] and [`Error::Persistence`] are meant to
//! reach the caller of a harvest as hard failures. Discovery and page-fetch
//! errors are absorbed by the registry and the pagination engine.

use crate::schema::FieldKind;
use thiserror::Error;

/// The main error type for harvestkit
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Retrieval Core Errors
    // ============================================================================
    #[error("Schema violation for {kind} on '{source_name}': {message}")]
    SchemaViolation {
        source_name: String,
        kind: FieldKind,
        message: String,
    },

    #[error("Schema discovery failed for '{source_name}': {message}")]
    Discovery {
        source_name: String,
        message: String,
    },

    #[error("Page {page} fetch failed: {message}")]
    PageFetch { page: u32, message: String },

    #[error("Persistence failed: {message}")]
    Persistence { message: String },

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unknown source: {name}")]
    UnknownSource { name: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    // ============================================================================
    // Arrow/Parquet/CSV Errors
    // ============================================================================
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a schema violation
    pub fn schema_violation(
        source_name: impl Into<String>,
        kind: FieldKind,
        message: impl Into<String>,
    ) -> Self {
        Self::SchemaViolation {
            source_name: source_name.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a discovery error
    pub fn discovery(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a page fetch error
    pub fn page_fetch(page: u32, message: impl Into<String>) -> Self {
        Self::PageFetch {
            page,
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a JSONPath error
    pub fn json_path(message: impl Into<String>) -> Self {
        Self::JsonPath {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::HttpStatus { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Whether this error must fail the whole harvest operation
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SchemaViolation { .. } | Error::Persistence { .. }
        )
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for harvestkit
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::page_fetch(3, "connection reset");
        assert_eq!(err.to_string(), "Page 3 fetch failed: connection reset");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::schema_violation("works", FieldKind::Facet, "Invalid facet 'x'");
        assert_eq!(
            err.to_string(),
            "Schema violation for facet on 'works': Invalid facet 'x'"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::RateLimited {
            retry_after_seconds: 60
        }
        .is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::http_status(429, "").is_retryable());
        assert!(Error::http_status(500, "").is_retryable());
        assert!(Error::http_status(503, "").is_retryable());

        assert!(!Error::http_status(400, "").is_retryable());
        assert!(!Error::http_status(404, "").is_retryable());
        assert!(!Error::config("test").is_retryable());
        assert!(!Error::schema_violation("s", FieldKind::Metric, "m").is_retryable());
    }

    #[test]
    fn test_is_fatal() {
        assert!(Error::schema_violation("s", FieldKind::Select, "bad").is_fatal());
        assert!(Error::persistence("disk full").is_fatal());
        assert!(!Error::page_fetch(2, "timeout").is_fatal());
        assert!(!Error::discovery("s", "timeout").is_fatal());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
