//! HTTP source module
//!
//! Declarative adapters for paginated JSON APIs.
//!
//! # Features
//!
//! - **YAML Definitions**: endpoint, paths, parameter names and pagination
//! - **Offset and Cursor Paging**: query parameters or DSL query text
//! - **Field Discovery**: describe requests or error-message probes
//! - **Templates**: `{{ env.NAME }}` in headers and default parameters

mod extract;
mod http_source;
mod types;

pub use extract::{extract_count, extract_path, extract_records, extract_string};
pub use http_source::{dsl_page_query, HttpSource};
pub use types::{
    DiscoveryConfig, PaginationConfig, ParamNames, ProbeConfig, RequestStyle, SourceConfig,
};

#[cfg(test)]
mod tests;
