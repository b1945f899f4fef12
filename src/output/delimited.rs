//! Delimited text writer (TSV / CSV)

use crate::error::Result;
use crate::reconcile::ReconciledTable;
use serde_json::Value;
use std::path::Path;

/// Field delimiter for delimited output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    fn byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }
}

/// Render a reconciled cell as text
///
/// Nulls are empty, strings are written as-is and everything else is
/// JSON-encoded.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write a reconciled table as delimited text with a header row
///
/// Returns the number of data rows written.
pub fn write_delimited(
    path: impl AsRef<Path>,
    table: &ReconciledTable,
    delimiter: Delimiter,
) -> Result<usize> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter.byte())
        .from_path(path.as_ref())?;

    if table.columns.is_empty() {
        writer.flush()?;
        return Ok(0);
    }

    writer.write_record(table.column_names())?;
    for row in 0..table.row_count {
        writer.write_record(table.row(row).into_iter().map(cell_text))?;
    }

    writer.flush()?;
    Ok(table.row_count)
}
