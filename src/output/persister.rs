//! Result set persistence
//!
//! Writes a retrieved result set in the configured [`OutputFormat`]. Dual
//! mode produces a typed Parquet table from the reconciled columns plus a
//! lossless JSONL copy of the raw records.

use super::delimited::{write_delimited, Delimiter};
use super::jsonl::write_jsonl;
use super::schema::{table_to_batch, NestedEncoding};
use super::writer::{write_batch_to_parquet, ParquetWriterConfig};
use crate::error::{Error, Result};
use crate::pagination::ResultSet;
use crate::reconcile::ReconciledTable;
use crate::types::OutputFormat;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Characters of the query term considered for file names
const QUERY_STEM_CHARS: usize = 30;

/// A file written by the persister
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedFile {
    /// Full path of the file
    pub path: PathBuf,
    /// Format of this file (never `Dual`)
    pub format: OutputFormat,
    /// Rows written
    pub rows: usize,
    /// File size on disk
    pub size_bytes: u64,
}

impl PersistedFile {
    fn stat(path: PathBuf, format: OutputFormat, rows: usize) -> Result<Self> {
        let size_bytes = std::fs::metadata(&path)?.len();
        Ok(Self {
            path,
            format,
            rows,
            size_bytes,
        })
    }
}

/// File stem `{prefix}_{query}_{YYYYMMDD_HHMMSS}`
///
/// The query part keeps the alphanumeric characters of the first 30
/// characters of the term and is left out when nothing remains.
pub fn file_stem(prefix: &str, query: Option<&str>, timestamp: NaiveDateTime) -> String {
    let stamp = timestamp.format("%Y%m%d_%H%M%S");
    let cleaned: String = query
        .unwrap_or_default()
        .chars()
        .take(QUERY_STEM_CHARS)
        .filter(|c| c.is_alphanumeric())
        .collect();

    if cleaned.is_empty() {
        format!("{prefix}_{stamp}")
    } else {
        format!("{prefix}_{cleaned}_{stamp}")
    }
}

/// Write a reconciled table to Parquet
///
/// Nested columns are written natively first. If that fails the table is
/// written again with list and structured columns as JSON text.
pub fn write_parquet_table(
    path: impl AsRef<Path>,
    table: &ReconciledTable,
    config: &ParquetWriterConfig,
) -> Result<usize> {
    write_parquet_table_with(path.as_ref(), table, |path, batch| {
        write_batch_to_parquet(path, batch, config)
    })
}

pub(super) fn write_parquet_table_with<W>(
    path: &Path,
    table: &ReconciledTable,
    write: W,
) -> Result<usize>
where
    W: Fn(&Path, &RecordBatch) -> Result<usize>,
{
    let native = table_to_batch(table, NestedEncoding::Native).and_then(|batch| write(path, &batch));

    match native {
        Ok(rows) => Ok(rows),
        Err(e) => {
            warn!(
                "Native Parquet write failed ({}), retrying with nested columns as JSON text",
                e
            );
            table_to_batch(table, NestedEncoding::JsonText)
                .and_then(|batch| write(path, &batch))
                .map_err(|e| Error::persistence(format!("Parquet write failed: {e}")))
        }
    }
}

/// Writes result sets into a single flat output directory
#[derive(Debug, Clone)]
pub struct DualFormatPersister {
    output_dir: PathBuf,
    format: OutputFormat,
    parquet: ParquetWriterConfig,
}

impl DualFormatPersister {
    /// Create a persister writing `format` into `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
            parquet: ParquetWriterConfig::default(),
        }
    }

    /// Set the Parquet writer configuration
    #[must_use]
    pub fn with_parquet_config(mut self, config: ParquetWriterConfig) -> Self {
        self.parquet = config;
        self
    }

    /// Output directory
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Configured format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Persist a result set and its reconciled table
    ///
    /// An empty result set writes nothing. In dual mode the JSONL copy is
    /// written first, so it survives a Parquet failure.
    pub fn persist(
        &self,
        prefix: &str,
        query: Option<&str>,
        result: &ResultSet,
        table: &ReconciledTable,
    ) -> Result<Vec<PersistedFile>> {
        if result.records.is_empty() {
            debug!("No records for {}, nothing written", result.source);
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            Error::persistence(format!(
                "Failed to create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let base = file_stem(prefix, query, chrono::Local::now().naive_local());
        let stem = self.reserve_stem(&base)?;
        let mut files = Vec::new();

        let written = match self.format {
            OutputFormat::Dual => self.jsonl(&stem, result).and_then(|jsonl| {
                files.push(jsonl);
                self.parquet(&stem, table)
            }),
            OutputFormat::Parquet => self.parquet(&stem, table),
            OutputFormat::Jsonl => self.jsonl(&stem, result),
            OutputFormat::Tsv => self.delimited(&stem, table, OutputFormat::Tsv),
            OutputFormat::Csv => self.delimited(&stem, table, OutputFormat::Csv),
        };
        match written {
            Ok(file) => files.push(file),
            Err(e) => {
                self.release(&stem, files.len());
                return Err(e);
            }
        }

        for file in &files {
            info!(
                "Saved {} rows to {} ({} bytes)",
                file.rows,
                file.path.display(),
                file.size_bytes
            );
        }

        Ok(files)
    }

    /// Files written per result set, in write order
    fn file_formats(&self) -> &'static [OutputFormat] {
        match self.format {
            OutputFormat::Dual => &[OutputFormat::Jsonl, OutputFormat::Parquet],
            OutputFormat::Parquet => &[OutputFormat::Parquet],
            OutputFormat::Jsonl => &[OutputFormat::Jsonl],
            OutputFormat::Tsv => &[OutputFormat::Tsv],
            OutputFormat::Csv => &[OutputFormat::Csv],
        }
    }

    /// Claim `base`, or the first free `base_N`, for every file of a result set
    ///
    /// Each path is created empty with `create_new`, so concurrent
    /// persists never share a stem.
    fn reserve_stem(&self, base: &str) -> Result<String> {
        let mut attempt = 1u32;
        loop {
            let stem = if attempt == 1 {
                base.to_string()
            } else {
                format!("{base}_{attempt}")
            };

            let mut created = Vec::new();
            let mut taken = false;
            for format in self.file_formats() {
                let path = self.path_for(&stem, *format);
                match OpenOptions::new().write(true).create_new(true).open(&path) {
                    Ok(_) => created.push(path),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                        taken = true;
                        break;
                    }
                    Err(e) => {
                        remove_all(&created);
                        return Err(Error::persistence(format!(
                            "Failed to create {}: {e}",
                            path.display()
                        )));
                    }
                }
            }

            if !taken {
                if attempt > 1 {
                    debug!("{} already taken, writing to {}", base, stem);
                }
                return Ok(stem);
            }
            remove_all(&created);
            attempt += 1;
        }
    }

    /// Remove reserved files past the first `kept` after a failed write
    fn release(&self, stem: &str, kept: usize) {
        let paths: Vec<PathBuf> = self
            .file_formats()
            .iter()
            .skip(kept)
            .map(|format| self.path_for(stem, *format))
            .collect();
        remove_all(&paths);
    }

    fn path_for(&self, stem: &str, format: OutputFormat) -> PathBuf {
        self.output_dir
            .join(format!("{stem}.{}", format.extension()))
    }

    fn jsonl(&self, stem: &str, result: &ResultSet) -> Result<PersistedFile> {
        let path = self.path_for(stem, OutputFormat::Jsonl);
        let rows = write_jsonl(&path, &result.records)
            .map_err(|e| Error::persistence(format!("JSONL write failed: {e}")))?;
        PersistedFile::stat(path, OutputFormat::Jsonl, rows)
    }

    fn parquet(&self, stem: &str, table: &ReconciledTable) -> Result<PersistedFile> {
        let path = self.path_for(stem, OutputFormat::Parquet);
        let rows = write_parquet_table(&path, table, &self.parquet)?;
        PersistedFile::stat(path, OutputFormat::Parquet, rows)
    }

    fn delimited(
        &self,
        stem: &str,
        table: &ReconciledTable,
        format: OutputFormat,
    ) -> Result<PersistedFile> {
        let path = self.path_for(stem, format);
        let delimiter = if format == OutputFormat::Tsv {
            Delimiter::Tab
        } else {
            Delimiter::Comma
        };
        let rows = write_delimited(&path, table, delimiter)
            .map_err(|e| Error::persistence(format!("{format} write failed: {e}")))?;
        PersistedFile::stat(path, format, rows)
    }
}

fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            debug!("Could not remove {}: {}", path.display(), e);
        }
    }
}
