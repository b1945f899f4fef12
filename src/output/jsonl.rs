//! JSON Lines writer
//!
//! Writes records exactly as they were retrieved, one per line.

use crate::error::Result;
use crate::types::Record;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write records to a JSONL file, returning the number of lines written
pub fn write_jsonl(path: impl AsRef<Path>, records: &[Record]) -> Result<usize> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }

    writer.flush()?;
    Ok(records.len())
}

/// Read a JSONL file back into records
pub fn read_jsonl(path: impl AsRef<Path>) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}
