// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # harvestkit
//!
//! Retrieves complete result sets from paginated, schema-governed research
//! APIs and writes them as typed Parquet tables next to lossless JSONL.
//!
//! ## Features
//!
//! - **Pagination**: offset/skip and cursor protocols under a record ceiling
//! - **Schema Validation**: field names learned from the API, checked before any request
//! - **Type Reconciliation**: one shape per column for mixed semi-structured records
//! - **Dual Output**: Parquet (reconciled) plus JSONL (raw), or TSV/CSV
//! - **Declarative Sources**: YAML definitions for HTTP APIs, built-ins included
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use harvestkit::{load_source, HarvestConfig, Harvester, HttpSource, QueryDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> harvestkit::Result<()> {
//!     let source = HttpSource::new(load_source("openalex-works")?)?;
//!
//!     let mut harvester = Harvester::new(HarvestConfig::default());
//!     harvester.add_http_source(source).await;
//!
//!     let descriptor = QueryDescriptor::new("openalex-works")
//!         .with_query("graphene")
//!         .with_ceiling(5000);
//!     let outcome = harvester.harvest(&descriptor).await?;
//!
//!     for file in &outcome.files {
//!         println!("{} ({} rows)", file.path.display(), file.rows);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! QueryDescriptor
//!       │
//!       ▼
//! ┌──────────────┐   ┌──────────────────┐   ┌────────────────┐   ┌─────────────────────┐
//! │SchemaRegistry│ → │ PaginationEngine │ → │ TypeReconciler │ → │ DualFormatPersister │
//! │ validate refs│   │ offset / cursor  │   │ dominant shape │   │ Parquet + JSONL     │
//! └──────┬───────┘   └────────┬─────────┘   └────────────────┘   └─────────────────────┘
//!        │ FieldDiscovery     │ PageFetcher + RateLimiter
//!        └────────── HttpSource (YAML definition) ──────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with retry, plus the shared rate limiter
pub mod http;

/// Offset and cursor retrieval loops
pub mod pagination;

/// Field discovery and validation
pub mod schema;

/// Column shape reconciliation
pub mod reconcile;

/// Parquet, JSONL and delimited output
pub mod output;

/// Progress and diagnostics sink
pub mod telemetry;

/// Parallel batch tracking
pub mod batch;

/// Harvest orchestration
pub mod engine;

/// Run configuration
pub mod config;

/// HTTP source adapters
pub mod source;

/// Built-in source definitions
pub mod sources;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use engine::{HarvestOutcome, Harvester, RunContext};
pub use source::{HttpSource, SourceConfig};
pub use sources::load_source;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
