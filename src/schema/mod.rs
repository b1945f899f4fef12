//! Schema validation module
//!
//! Learns which fields each source supports and rejects invalid field
//! references before any request is sent.
//!
//! # Features
//!
//! - **Lazy Discovery**: Valid fields are fetched from the source on first use
//! - **Process Cache**: One discovery per source, never invalidated
//! - **Permissive Fallback**: Failed discovery disables validation for that source
//! - **Suggestions**: Rejections list similar and valid field names

mod discovery;
mod registry;
mod types;

pub use discovery::{
    parse_describe_response, parse_probe_message, probe_error_message, FieldDiscovery,
    StaticDiscovery,
};
pub use registry::SchemaRegistry;
pub use types::{
    rejection_message, suggestions, valid_listing, FieldKind, SourceSchema, AGGREGATE_FUNCTIONS,
    LISTED_VALID_FIELDS, MAX_SUGGESTIONS,
};
