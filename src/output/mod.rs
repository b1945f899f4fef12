//! Output module
//!
//! Materializes result sets as files.
//!
//! # Overview
//!
//! This module provides utilities for:
//! - Converting reconciled tables to Arrow RecordBatches
//! - Writing Parquet files, with a JSON-text fallback for nested columns
//! - Writing raw records as JSONL
//! - Writing reconciled rows as TSV or CSV
//! - Naming and persisting result sets ([`DualFormatPersister`])

mod delimited;
mod jsonl;
mod persister;
mod schema;
mod writer;

pub use delimited::{cell_text, write_delimited, Delimiter};
pub use jsonl::{read_jsonl, write_jsonl};
pub use persister::{file_stem, write_parquet_table, DualFormatPersister, PersistedFile};
pub use schema::{arrow_to_json, table_schema, table_to_batch, NestedEncoding};
pub use writer::{
    read_parquet, write_batch_to_parquet, ParquetCompression, ParquetWriter, ParquetWriterConfig,
};

#[cfg(test)]
mod tests;
