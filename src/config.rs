//! Run configuration
//!
//! Settings shared by every harvest in one process: where files go, which
//! formats are written, how fast requests may be sent and how long a page
//! may take. Loadable from YAML; every field has a default.

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::output::{DualFormatPersister, ParquetCompression, ParquetWriterConfig};
use crate::types::{BackoffType, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/harvest-results";

// ============================================================================
// Harvest Config
// ============================================================================

/// Process-wide harvest settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Directory result files are written to (created if absent)
    pub output_dir: PathBuf,

    /// Which files each harvest writes
    pub format: OutputFormat,

    /// Request rate shared by every source
    pub requests_per_second: u32,

    /// Timeout for one page, including HTTP retries
    pub page_timeout_secs: u64,

    /// Timeout for a single HTTP attempt
    pub request_timeout_secs: u64,

    /// HTTP retries for transient failures
    pub max_retries: u32,

    /// Harvests run at once by `harvest_many`
    pub max_parallel: usize,

    /// Parquet compression codec
    pub compression: ParquetCompression,

    /// User agent override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            format: OutputFormat::Dual,
            requests_per_second: 10,
            page_timeout_secs: 60,
            request_timeout_secs: 30,
            max_retries: 3,
            max_parallel: 4,
            compression: ParquetCompression::Snappy,
            user_agent: None,
        }
    }
}

impl HarvestConfig {
    /// Create a config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Reject settings that would stall or never run
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_second == 0 {
            return Err(Error::config("requests_per_second must be at least 1"));
        }
        if self.page_timeout_secs == 0 {
            return Err(Error::config("page_timeout_secs must be at least 1"));
        }
        if self.max_parallel == 0 {
            return Err(Error::config("max_parallel must be at least 1"));
        }
        Ok(())
    }

    /// Set the output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the shared request rate
    #[must_use]
    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    /// Set the per-page timeout
    #[must_use]
    pub fn with_page_timeout(mut self, timeout: Duration) -> Self {
        self.page_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the number of concurrent harvests
    #[must_use]
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    /// Set the HTTP retry count
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Per-page timeout
    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    /// Rate limiter settings (strict spacing, no burst)
    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig::per_second(self.requests_per_second)
    }

    /// HTTP client settings for source adapters
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
            .max_retries(self.max_retries)
            .backoff(
                BackoffType::Exponential,
                Duration::from_millis(500),
                Duration::from_secs(30),
            );
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }

    /// Parquet writer settings
    pub fn parquet_config(&self) -> ParquetWriterConfig {
        ParquetWriterConfig::new().with_compression(self.compression)
    }

    /// Persister for this configuration
    pub fn persister(&self) -> DualFormatPersister {
        DualFormatPersister::new(&self.output_dir, self.format)
            .with_parquet_config(self.parquet_config())
    }
}
