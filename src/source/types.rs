//! Source definition types
//!
//! A source is described in YAML: where to send requests, how descriptor
//! fields map onto request parameters, how the API paginates, where records
//! and totals sit in a response, and how field names can be discovered.

use crate::error::{Error, Result};
use crate::pagination::{PaginationMode, INITIAL_CURSOR};
use crate::schema::FieldKind;
use crate::types::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Complete definition of one HTTP data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source name, used in file names and as the schema cache key
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Base URL of the API
    pub base_url: String,

    /// Endpoint path for record requests
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub method: Method,

    /// Path of the record list in a response (whole body when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_path: Option<String>,

    /// Path of the total count in a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_path: Option<String>,

    /// Path of the continuation token in a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_path: Option<String>,

    /// Headers sent with every request (templates allowed)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Query parameters sent with every request (templates allowed)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_params: BTreeMap<String, String>,

    /// Names of the parameters descriptor fields are sent as
    #[serde(default)]
    pub params: ParamNames,

    pub pagination: PaginationConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryConfig>,
}

impl SourceConfig {
    /// Parse a definition from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a definition from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read source file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("source name must not be empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(Error::config(format!(
                "source '{}' has no base_url",
                self.name
            )));
        }
        url::Url::parse(&self.base_url)?;
        if matches!(self.pagination, PaginationConfig::Cursor { .. }) && self.cursor_path.is_none()
        {
            return Err(Error::config(format!(
                "source '{}' uses cursor pagination but has no cursor_path",
                self.name
            )));
        }
        if let PaginationConfig::Offset {
            style: RequestStyle::Dsl,
            ..
        } = self.pagination
        {
            if self.method != Method::POST {
                return Err(Error::config(format!(
                    "source '{}' uses DSL requests, which must be POST",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Pagination mode for the engine
    pub fn pagination_mode(&self) -> PaginationMode {
        self.pagination.mode()
    }
}

/// Parameter names descriptor fields map to; unset fields are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamNames {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Parameter facet references are sent as (comma-joined)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<String>,
}

/// How offset requests are expressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStyle {
    /// Skip and limit as query parameters
    #[default]
    Params,
    /// Query text posted as the body, with a ` limit N skip M` suffix
    Dsl,
}

/// Pagination block of a source definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaginationConfig {
    Offset {
        #[serde(default = "default_skip_param")]
        skip_param: String,
        #[serde(default = "default_limit_param")]
        limit_param: String,
        #[serde(default = "default_batch_size")]
        batch_size: u64,
        #[serde(default = "default_batch_size")]
        api_max: u64,
        #[serde(default)]
        style: RequestStyle,
    },
    Cursor {
        #[serde(default = "default_cursor_param")]
        cursor_param: String,
        #[serde(default = "default_size_param")]
        size_param: String,
        #[serde(default = "default_page_size")]
        page_size: u64,
        #[serde(default = "default_page_size")]
        api_max: u64,
        #[serde(default = "default_initial_cursor")]
        initial_cursor: String,
    },
}

impl PaginationConfig {
    /// Pagination mode for the engine
    pub fn mode(&self) -> PaginationMode {
        match self {
            Self::Offset {
                batch_size,
                api_max,
                ..
            } => PaginationMode::offset(*batch_size, *api_max),
            Self::Cursor {
                page_size,
                api_max,
                initial_cursor,
                ..
            } => PaginationMode::Cursor {
                page_size: *page_size,
                api_max: *api_max,
                initial_cursor: initial_cursor.clone(),
            },
        }
    }
}

fn default_skip_param() -> String {
    "skip".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_batch_size() -> u64 {
    1000
}

fn default_cursor_param() -> String {
    "cursor".to_string()
}

fn default_size_param() -> String {
    "per_page".to_string()
}

fn default_page_size() -> u64 {
    200
}

fn default_initial_cursor() -> String {
    INITIAL_CURSOR.to_string()
}

/// How a source's valid field names are learned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiscoveryConfig {
    /// A metadata request listing fields and metrics
    Describe {
        /// Endpoint (the record endpoint when absent)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        /// Body posted for DSL sources, e.g. `describe source publications`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request: Option<String>,
        #[serde(default = "default_fields_path")]
        fields_path: String,
        #[serde(default = "default_metrics_path")]
        metrics_path: String,
    },
    /// Deliberately invalid requests whose errors list the valid names
    Probe {
        /// Endpoint (the record endpoint when absent)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        /// Extra parameters for every probe, e.g. `per_page: "1"`
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        params: BTreeMap<String, String>,
        probes: Vec<ProbeConfig>,
    },
}

fn default_fields_path() -> String {
    "fields".to_string()
}

fn default_metrics_path() -> String {
    "metrics".to_string()
}

/// One probe: which parameter to poison and where the answer starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub kind: FieldKind,
    pub param: String,
    /// Phrase after which the error message lists valid names
    pub marker: String,
    #[serde(default = "default_probe_value")]
    pub value: String,
}

fn default_probe_value() -> String {
    "__invalid_field__".to_string()
}
