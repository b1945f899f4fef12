//! Arrow schema inference and table conversion
//!
//! Builds an Arrow RecordBatch from a [`ReconciledTable`]. Scalar columns are
//! typed from their values (conflicting scalar types fall back to Utf8), list
//! columns become `List`, and structured columns become `Struct` with the
//! field sets of all rows merged.

use crate::error::{Error, Result};
use crate::reconcile::ReconciledTable;
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, NullArray, StringArray,
    StructArray,
};
use arrow::buffer::{NullBuffer, OffsetBuffer};
use arrow::datatypes::{DataType, Field, Fields, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use serde_json::Value;
use std::sync::Arc;

/// How nested (list and structured) columns are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NestedEncoding {
    /// Native Arrow `List` / `Struct`
    #[default]
    Native,
    /// JSON text in a Utf8 column
    JsonText,
}

/// Infer the Arrow schema of a reconciled table
pub fn table_schema(table: &ReconciledTable, encoding: NestedEncoding) -> Schema {
    let fields: Vec<Field> = table
        .columns
        .iter()
        .map(|column| {
            let data_type = if encoding == NestedEncoding::JsonText && column.shape.is_nested() {
                DataType::Utf8
            } else {
                column_type(&column.values)
            };
            Field::new(&column.name, data_type, true)
        })
        .collect();

    Schema::new(fields)
}

/// Convert a reconciled table to a RecordBatch
pub fn table_to_batch(table: &ReconciledTable, encoding: NestedEncoding) -> Result<RecordBatch> {
    let schema = Arc::new(table_schema(table, encoding));

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(table.columns.len());
    for (column, field) in table.columns.iter().zip(schema.fields()) {
        let values: Vec<Option<&Value>> = column
            .values
            .iter()
            .map(|value| (!value.is_null()).then_some(value))
            .collect();
        columns.push(build_array(&values, field.data_type())?);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(table.row_count));
    RecordBatch::try_new_with_options(schema, columns, &options).map_err(|e| Error::Output {
        message: format!("Failed to create RecordBatch: {e}"),
    })
}

/// Merged, writable Arrow type of a column's values
fn column_type(values: &[Value]) -> DataType {
    let merged = values
        .iter()
        .filter(|value| !value.is_null())
        .map(infer_type)
        .reduce(|acc, next| merge_types(&acc, &next))
        .unwrap_or(DataType::Null);
    writable(merged)
}

/// Infer Arrow DataType from a JSON value
fn infer_type(value: &Value) -> DataType {
    match value {
        Value::Null => DataType::Null,
        Value::Bool(_) => DataType::Boolean,
        Value::Number(n) => {
            if n.is_i64() {
                DataType::Int64
            } else {
                DataType::Float64
            }
        }
        Value::String(_) => DataType::Utf8,
        Value::Array(arr) => {
            let element_type = arr
                .iter()
                .filter(|v| !v.is_null())
                .map(infer_type)
                .reduce(|acc, next| merge_types(&acc, &next))
                .unwrap_or(DataType::Null);
            list_of(element_type)
        }
        Value::Object(obj) => {
            let fields: Vec<Field> = obj
                .iter()
                .map(|(k, v)| Field::new(k, infer_type(v), true))
                .collect();
            DataType::Struct(Fields::from(fields))
        }
    }
}

fn list_of(element_type: DataType) -> DataType {
    DataType::List(Arc::new(Field::new("item", element_type, true)))
}

/// Merge two data types into a compatible type
fn merge_types(type1: &DataType, type2: &DataType) -> DataType {
    match (type1, type2) {
        (a, b) if a == b => a.clone(),

        (DataType::Null, other) | (other, DataType::Null) => other.clone(),

        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }

        (DataType::List(a), DataType::List(b)) => list_of(merge_types(a.data_type(), b.data_type())),

        (DataType::Struct(a), DataType::Struct(b)) => {
            let mut merged: Vec<Field> = a.iter().map(|f| f.as_ref().clone()).collect();
            for field in b {
                match merged.iter_mut().find(|f| f.name() == field.name()) {
                    Some(existing) => {
                        let data_type = merge_types(existing.data_type(), field.data_type());
                        *existing = Field::new(field.name(), data_type, true);
                    }
                    None => merged.push(field.as_ref().clone()),
                }
            }
            DataType::Struct(Fields::from(merged))
        }

        // Different types -> fall back to String (most flexible)
        _ => DataType::Utf8,
    }
}

/// Replace types Parquet cannot store: bare nulls and empty structs become Utf8
fn writable(data_type: DataType) -> DataType {
    match data_type {
        DataType::Null => DataType::Utf8,
        DataType::List(field) => list_of(writable(field.data_type().clone())),
        DataType::Struct(fields) if fields.is_empty() => DataType::Utf8,
        DataType::Struct(fields) => DataType::Struct(Fields::from(
            fields
                .iter()
                .map(|f| Field::new(f.name(), writable(f.data_type().clone()), true))
                .collect::<Vec<_>>(),
        )),
        other => other,
    }
}

/// Build an Arrow array from JSON values
fn build_array(values: &[Option<&Value>], data_type: &DataType) -> Result<ArrayRef> {
    match data_type {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),

        DataType::Boolean => {
            let arr: BooleanArray = values.iter().map(|v| v.and_then(Value::as_bool)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Int64 => {
            let arr: Int64Array = values.iter().map(|v| v.and_then(Value::as_i64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Float64 => {
            let arr: Float64Array = values.iter().map(|v| v.and_then(Value::as_f64)).collect();
            Ok(Arc::new(arr))
        }

        DataType::Utf8 => {
            let arr: StringArray = values
                .iter()
                .map(|v| {
                    v.filter(|v| !v.is_null()).map(|v| match v {
                        Value::String(s) => s.clone(),
                        _ => v.to_string(),
                    })
                })
                .collect();
            Ok(Arc::new(arr))
        }

        DataType::List(field) => build_list_array(values, field),

        DataType::Struct(fields) => build_struct_array(values, fields),

        other => Err(Error::Output {
            message: format!("Unsupported column type {other}"),
        }),
    }
}

/// Build a list array from JSON arrays
fn build_list_array(values: &[Option<&Value>], field: &Arc<Field>) -> Result<ArrayRef> {
    let mut all_items: Vec<Option<&Value>> = Vec::new();
    let mut offsets: Vec<i32> = vec![0];
    let mut validity: Vec<bool> = Vec::with_capacity(values.len());

    for value in values {
        if let Some(Value::Array(arr)) = value {
            all_items.extend(arr.iter().map(Some));
            validity.push(true);
        } else {
            validity.push(false);
        }
        let offset = i32::try_from(all_items.len()).map_err(|_| Error::Output {
            message: "Array too large for i32 offset".to_string(),
        })?;
        offsets.push(offset);
    }

    let items_array = build_array(&all_items, field.data_type())?;
    let offset_buffer = OffsetBuffer::new(offsets.into());

    let list_array = ListArray::try_new(
        Arc::clone(field),
        offset_buffer,
        items_array,
        Some(NullBuffer::from(validity)),
    )?;
    Ok(Arc::new(list_array))
}

/// Build a struct array from JSON objects
fn build_struct_array(values: &[Option<&Value>], fields: &Fields) -> Result<ArrayRef> {
    let mut child_arrays: Vec<ArrayRef> = Vec::with_capacity(fields.len());

    for field in fields {
        let child_values: Vec<Option<&Value>> = values
            .iter()
            .map(|v| v.and_then(|v| v.as_object()).and_then(|obj| obj.get(field.name())))
            .collect();

        child_arrays.push(build_array(&child_values, field.data_type())?);
    }

    let validity: Vec<bool> = values
        .iter()
        .map(|v| matches!(v, Some(Value::Object(_))))
        .collect();

    let struct_array =
        StructArray::try_new(fields.clone(), child_arrays, Some(NullBuffer::from(validity)))?;
    Ok(Arc::new(struct_array))
}

/// Convert an Arrow RecordBatch to JSON records
///
/// Returns one JSON object per row; null cells are omitted.
pub fn arrow_to_json(batch: &RecordBatch) -> Result<Vec<Value>> {
    let schema = batch.schema();
    let mut records = Vec::with_capacity(batch.num_rows());

    for row_idx in 0..batch.num_rows() {
        let mut record = serde_json::Map::new();

        for (col_idx, field) in schema.fields().iter().enumerate() {
            let value = array_value_to_json(batch.column(col_idx).as_ref(), row_idx)?;
            if !value.is_null() {
                record.insert(field.name().clone(), value);
            }
        }

        records.push(Value::Object(record));
    }

    Ok(records)
}

fn downcast<'a, T: 'static>(array: &'a dyn Array, name: &str) -> Result<&'a T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| Error::Output {
        message: format!("Failed to downcast to {name}"),
    })
}

/// Convert a single array element to JSON
fn array_value_to_json(array: &dyn Array, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }

    match array.data_type() {
        DataType::Null => Ok(Value::Null),

        DataType::Boolean => Ok(Value::Bool(
            downcast::<BooleanArray>(array, "BooleanArray")?.value(row),
        )),

        DataType::Int64 => Ok(Value::Number(
            downcast::<Int64Array>(array, "Int64Array")?.value(row).into(),
        )),

        DataType::Float64 => {
            let val = downcast::<Float64Array>(array, "Float64Array")?.value(row);
            Ok(serde_json::Number::from_f64(val).map_or(Value::Null, Value::Number))
        }

        DataType::Utf8 => Ok(Value::String(
            downcast::<StringArray>(array, "StringArray")?
                .value(row)
                .to_string(),
        )),

        DataType::List(_) => {
            let values = downcast::<ListArray>(array, "ListArray")?.value(row);
            let mut items = Vec::with_capacity(values.len());
            for i in 0..values.len() {
                items.push(array_value_to_json(values.as_ref(), i)?);
            }
            Ok(Value::Array(items))
        }

        DataType::Struct(_) => {
            let arr = downcast::<StructArray>(array, "StructArray")?;
            let mut obj = serde_json::Map::new();
            for (i, field) in arr.fields().iter().enumerate() {
                let val = array_value_to_json(arr.column(i).as_ref(), row)?;
                if !val.is_null() {
                    obj.insert(field.name().clone(), val);
                }
            }
            Ok(Value::Object(obj))
        }

        other => Ok(Value::String(format!("{other:?}"))),
    }
}
