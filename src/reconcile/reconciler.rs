//! Column type reconciliation
//!
//! Semi-structured sources return the same key as a string in one record, a
//! list in another and a map in a third. Columnar output needs one type per
//! column, so each column is reduced to its dominant shape and values of
//! other shapes become null. The raw records are left untouched; the
//! lossless copy is written from them.

use super::types::{
    ColumnCoercion, ColumnShape, ReconciledColumn, ReconciledTable, ShapeCounts, ValueShape,
};
use crate::types::Record;
use serde_json::Value;
use tracing::debug;

/// Reduces each column of a result set to a single shape
#[derive(Debug, Clone, Copy, Default)]
pub struct TypeReconciler;

impl TypeReconciler {
    /// Create a new reconciler
    pub fn new() -> Self {
        Self
    }

    /// Reconcile `records` into a table
    pub fn reconcile(&self, records: &[Record]) -> ReconciledTable {
        let names = column_names(records);
        let mut table = ReconciledTable {
            columns: Vec::with_capacity(names.len()),
            row_count: records.len(),
            coercions: Vec::with_capacity(names.len()),
        };

        for name in names {
            let (column, coercion) = reconcile_column(&name, records);
            if coercion.nulled > 0 {
                debug!(
                    "Column '{}' reconciled to {}: {} values nulled",
                    name, coercion.dominant, coercion.nulled
                );
            }
            table.columns.push(column);
            table.coercions.push(coercion);
        }

        table
    }
}

/// Union of record keys in first-seen order
fn column_names(records: &[Record]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    for record in records {
        for key in record.keys() {
            if seen.insert(key.as_str()) {
                names.push(key.clone());
            }
        }
    }
    names
}

fn reconcile_column(name: &str, records: &[Record]) -> (ReconciledColumn, ColumnCoercion) {
    let cells: Vec<&Value> = records
        .iter()
        .map(|record| record.get(name).unwrap_or(&Value::Null))
        .collect();

    let mut counts = ShapeCounts::default();
    for cell in &cells {
        counts.add(ValueShape::of(cell));
    }

    let pass_through = counts.null == cells.len() || uniform_primitive(&cells);
    let (shape, values, nulled) = if pass_through {
        let shape = if counts.null == cells.len() {
            ColumnShape::Null
        } else {
            ColumnShape::Scalar
        };
        (shape, cells.iter().map(|cell| (*cell).clone()).collect(), 0)
    } else {
        let dominant = counts.dominant();
        let mut nulled = 0;
        let values = cells
            .iter()
            .map(|cell| {
                let shape = ValueShape::of(cell);
                if dominant.keeps(shape) {
                    (*cell).clone()
                } else {
                    if shape != ValueShape::Null {
                        nulled += 1;
                    }
                    Value::Null
                }
            })
            .collect();
        (dominant, values, nulled)
    };

    (
        ReconciledColumn {
            name: name.to_string(),
            shape,
            values,
        },
        ColumnCoercion {
            column: name.to_string(),
            dominant: shape,
            nulled,
            counts,
        },
    )
}

/// Non-null values are all numbers, or all booleans
fn uniform_primitive(cells: &[&Value]) -> bool {
    let mut present = cells.iter().filter(|cell| !cell.is_null());
    match present.next() {
        Some(first) if first.is_number() => present.all(|cell| cell.is_number()),
        Some(first) if first.is_boolean() => present.all(|cell| cell.is_boolean()),
        _ => false,
    }
}
