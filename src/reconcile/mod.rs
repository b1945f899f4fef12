//! Type reconciliation module
//!
//! Turns heterogeneous records into a table with one shape per column.
//!
//! # Rules
//!
//! - Columns are the union of record keys, in first-seen order
//! - Empty strings, lists and maps count as empty markers, not values
//! - The most frequent shape wins; ties prefer scalar, then structured, then list
//! - Values of other shapes, and empty markers, become null
//! - Uniformly numeric or boolean columns pass through unchanged

mod reconciler;
mod types;

pub use reconciler::TypeReconciler;
pub use types::{
    ColumnCoercion, ColumnShape, ReconciledColumn, ReconciledTable, ShapeCounts, ValueShape,
};

#[cfg(test)]
mod tests;
