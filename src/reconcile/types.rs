//! Reconciliation types

use crate::types::Record;
use serde::Serialize;
use serde_json::Value;

/// Shape of a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueShape {
    /// JSON null or a missing key
    Null,
    /// Empty string, empty list or empty map
    Empty,
    /// String, number or boolean
    Scalar,
    /// Non-empty list
    List,
    /// Non-empty map
    Structured,
}

impl ValueShape {
    /// Classify a value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::String(s) if s.is_empty() => Self::Empty,
            Value::Array(items) if items.is_empty() => Self::Empty,
            Value::Object(map) if map.is_empty() => Self::Empty,
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Self::Scalar,
            Value::Array(_) => Self::List,
            Value::Object(_) => Self::Structured,
        }
    }
}

/// Reconciled shape of a whole column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnShape {
    /// Every value is null
    Null,
    Scalar,
    List,
    Structured,
}

impl ColumnShape {
    /// Whether values are nested (list or map)
    pub fn is_nested(&self) -> bool {
        matches!(self, Self::List | Self::Structured)
    }

    /// Whether a value of `shape` survives reconciliation into this column
    pub fn keeps(&self, shape: ValueShape) -> bool {
        matches!(
            (self, shape),
            (Self::Scalar, ValueShape::Scalar)
                | (Self::List, ValueShape::List)
                | (Self::Structured, ValueShape::Structured)
        )
    }
}

impl std::fmt::Display for ColumnShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Scalar => "scalar",
            Self::List => "list",
            Self::Structured => "structured",
        };
        f.write_str(name)
    }
}

/// Per-shape value counts of a column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShapeCounts {
    pub null: usize,
    pub empty: usize,
    pub scalar: usize,
    pub list: usize,
    pub structured: usize,
}

impl ShapeCounts {
    /// Count one value
    pub fn add(&mut self, shape: ValueShape) {
        match shape {
            ValueShape::Null => self.null += 1,
            ValueShape::Empty => self.empty += 1,
            ValueShape::Scalar => self.scalar += 1,
            ValueShape::List => self.list += 1,
            ValueShape::Structured => self.structured += 1,
        }
    }

    /// Dominant shape; ties prefer scalar, then structured, then list
    pub fn dominant(&self) -> ColumnShape {
        if self.scalar >= self.structured && self.scalar >= self.list {
            ColumnShape::Scalar
        } else if self.structured >= self.list {
            ColumnShape::Structured
        } else {
            ColumnShape::List
        }
    }

    /// Values that are neither null nor empty
    pub fn real(&self) -> usize {
        self.scalar + self.list + self.structured
    }
}

/// What reconciliation did to one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnCoercion {
    /// Column name
    pub column: String,
    /// Shape the column was reconciled to
    pub dominant: ColumnShape,
    /// Values replaced by null (minority shapes and empty markers)
    pub nulled: usize,
    /// Shape counts before reconciliation
    pub counts: ShapeCounts,
}

/// One reconciled column
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledColumn {
    /// Column name
    pub name: String,
    /// Column shape
    pub shape: ColumnShape,
    /// One value per row; `Value::Null` for nulls
    pub values: Vec<Value>,
}

/// Result set with one consistent shape per column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledTable {
    /// Columns in first-seen order
    pub columns: Vec<ReconciledColumn>,
    /// Number of rows
    pub row_count: usize,
    /// Per-column diagnostics, same order as `columns`
    pub coercions: Vec<ColumnCoercion>,
}

impl ReconciledTable {
    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ReconciledColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Column names in order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Values of one row, in column order
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns
            .iter()
            .map(|column| &column.values[index])
            .collect()
    }

    /// Total number of values nulled across all columns
    pub fn total_nulled(&self) -> usize {
        self.coercions.iter().map(|c| c.nulled).sum()
    }

    /// Reconciled rows as records, nulls omitted
    pub fn to_records(&self) -> Vec<Record> {
        (0..self.row_count)
            .map(|index| {
                self.columns
                    .iter()
                    .filter(|column| !column.values[index].is_null())
                    .map(|column| (column.name.clone(), column.values[index].clone()))
                    .collect()
            })
            .collect()
    }

    /// Column shapes by name, for comparing runs
    pub fn shapes(&self) -> Vec<(String, ColumnShape)> {
        self.columns
            .iter()
            .map(|column| (column.name.clone(), column.shape))
            .collect()
    }
}
