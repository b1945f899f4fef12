//! Tests for output module

use super::*;
use crate::pagination::{PaginationPhase, ResultSet};
use crate::reconcile::{ReconciledTable, TypeReconciler};
use crate::types::{OutputFormat, Record};
use arrow::datatypes::DataType;
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::tempdir;
use test_case::test_case;

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .map(|value| value.as_object().cloned().unwrap())
        .collect()
}

fn reconcile(values: Vec<Value>) -> (Vec<Record>, ReconciledTable) {
    let records = records(values);
    let table = TypeReconciler::new().reconcile(&records);
    (records, table)
}

fn result_set(records: Vec<Record>) -> ResultSet {
    ResultSet {
        source: "works".to_string(),
        total_available: records.len() as u64,
        total_retrieved: records.len() as u64,
        pages_fetched: 1,
        phase: PaginationPhase::Done,
        records,
        ..Default::default()
    }
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test]
fn test_table_schema_scalar_types() {
    let (_, table) = reconcile(vec![
        json!({"id": 1, "score": 1.5, "open": true, "title": "a"}),
        json!({"id": 2, "score": 2.5, "open": false, "title": "b"}),
    ]);

    let schema = table_schema(&table, NestedEncoding::Native);

    assert_eq!(schema.field_with_name("id").unwrap().data_type(), &DataType::Int64);
    assert_eq!(
        schema.field_with_name("score").unwrap().data_type(),
        &DataType::Float64
    );
    assert_eq!(
        schema.field_with_name("open").unwrap().data_type(),
        &DataType::Boolean
    );
    assert_eq!(
        schema.field_with_name("title").unwrap().data_type(),
        &DataType::Utf8
    );
}

#[test]
fn test_mixed_numbers_promote_to_float() {
    let (_, table) = reconcile(vec![json!({"value": 42}), json!({"value": 3.5})]);
    let schema = table_schema(&table, NestedEncoding::Native);
    assert_eq!(
        schema.field_with_name("value").unwrap().data_type(),
        &DataType::Float64
    );
}

#[test]
fn test_conflicting_scalars_fall_back_to_text() {
    let (_, table) = reconcile(vec![json!({"year": "2020"}), json!({"year": 2021})]);

    let batch = table_to_batch(&table, NestedEncoding::Native).unwrap();
    assert_eq!(batch.schema().field(0).data_type(), &DataType::Utf8);

    let rows = arrow_to_json(&batch).unwrap();
    assert_eq!(rows[0]["year"], json!("2020"));
    assert_eq!(rows[1]["year"], json!("2021"));
}

#[test]
fn test_structured_column_merges_field_sets() {
    let (_, table) = reconcile(vec![
        json!({"venue": {"name": "A"}}),
        json!({"venue": {"name": "B", "issn": "1234"}}),
    ]);

    let schema = table_schema(&table, NestedEncoding::Native);
    match schema.field_with_name("venue").unwrap().data_type() {
        DataType::Struct(fields) => {
            let names: Vec<&str> = fields.iter().map(|f| f.name().as_str()).collect();
            assert_eq!(names, vec!["name", "issn"]);
        }
        other => panic!("Expected Struct, got {other}"),
    }
}

#[test]
fn test_list_column_is_native_list() {
    let (_, table) = reconcile(vec![json!({"tags": ["a", "b"]}), json!({"tags": ["c"]})]);

    let schema = table_schema(&table, NestedEncoding::Native);
    match schema.field_with_name("tags").unwrap().data_type() {
        DataType::List(item) => assert_eq!(item.data_type(), &DataType::Utf8),
        other => panic!("Expected List, got {other}"),
    }
}

#[test]
fn test_json_text_encoding_serializes_nested_columns() {
    let (_, table) = reconcile(vec![json!({"id": 1, "authors": [{"name": "Ada"}]})]);

    let batch = table_to_batch(&table, NestedEncoding::JsonText).unwrap();
    assert_eq!(batch.schema().field(1).data_type(), &DataType::Utf8);

    let rows = arrow_to_json(&batch).unwrap();
    assert_eq!(rows[0]["authors"], json!(r#"[{"name":"Ada"}]"#));
    assert_eq!(rows[0]["id"], json!(1));
}

#[test]
fn test_all_null_column_is_writable() {
    let (_, table) = reconcile(vec![json!({"id": 1, "note": null}), json!({"id": 2})]);

    let batch = table_to_batch(&table, NestedEncoding::Native).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.schema().field(1).data_type(), &DataType::Utf8);
}

#[test]
fn test_table_without_columns_keeps_row_count() {
    let (_, table) = reconcile(vec![json!({}), json!({})]);
    let batch = table_to_batch(&table, NestedEncoding::Native).unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 0);
}

// ============================================================================
// Parquet Writer Tests
// ============================================================================

#[test]
fn test_parquet_writer_config_builder() {
    let config = ParquetWriterConfig::new()
        .with_row_group_size(1000)
        .with_dictionary(false)
        .with_compression(ParquetCompression::Zstd);

    assert!(!config.is_dictionary_enabled());
    assert_eq!(config.row_group_size(), 1000);
    assert_eq!(
        config.compression(),
        parquet::basic::Compression::from(ParquetCompression::Zstd)
    );
}

#[test_case("\"none\"", ParquetCompression::None ; "none")]
#[test_case("\"snappy\"", ParquetCompression::Snappy ; "snappy")]
#[test_case("\"zstd\"", ParquetCompression::Zstd ; "zstd")]
#[test_case("\"gzip\"", ParquetCompression::Gzip ; "gzip")]
fn test_compression_from_config(text: &str, expected: ParquetCompression) {
    let codec: ParquetCompression = serde_json::from_str(text).unwrap();
    assert_eq!(codec, expected);
}

#[test]
fn test_parquet_writer_rows_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("writer.parquet");

    let (_, table) = reconcile(vec![json!({"id": 1}), json!({"id": 2})]);
    let batch = table_to_batch(&table, NestedEncoding::Native).unwrap();

    let config = ParquetWriterConfig::default();
    let mut writer = ParquetWriter::new(&path, batch.schema().as_ref(), &config).unwrap();
    assert_eq!(writer.rows_written(), 0);

    writer.write(&batch).unwrap();
    assert_eq!(writer.rows_written(), 2);
    assert_eq!(writer.close().unwrap(), 2);
}

#[test]
fn test_parquet_round_trip_keeps_nested_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("works.parquet");

    let (_, table) = reconcile(vec![
        json!({
            "id": "W1",
            "cited_by_count": 12,
            "is_oa": true,
            "authorships": [{"author": {"display_name": "Ada"}, "position": "first"}],
            "primary_location": {"source": {"display_name": "Nature"}}
        }),
        json!({
            "id": "W2",
            "cited_by_count": 3,
            "is_oa": false,
            "authorships": [
                {"author": {"display_name": "Grace"}, "position": "first"},
                {"author": {"display_name": "Alan"}, "position": "last"}
            ],
            "primary_location": {"source": {"display_name": "Science"}, "version": "published"}
        }),
    ]);

    let rows = write_parquet_table(&path, &table, &ParquetWriterConfig::default()).unwrap();
    assert_eq!(rows, 2);

    let batches = read_parquet(&path).unwrap();
    let read_back: Vec<Value> = batches
        .iter()
        .flat_map(|batch| arrow_to_json(batch).unwrap())
        .collect();
    let expected: Vec<Value> = table.to_records().into_iter().map(Value::Object).collect();

    assert_eq!(read_back, expected);
}

// ============================================================================
// JSONL / Delimited Tests
// ============================================================================

#[test]
fn test_jsonl_keeps_original_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.jsonl");

    let raw = records(vec![
        json!({"id": 1, "affiliation": {"name": "MIT"}}),
        json!({"id": 2, "affiliation": ["a", "b"], "notes": ""}),
    ]);

    assert_eq!(write_jsonl(&path, &raw).unwrap(), 2);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert_eq!(read_jsonl(&path).unwrap(), raw);
}

#[test_case(json!(null), "" ; "null")]
#[test_case(json!("text"), "text" ; "string")]
#[test_case(json!(7), "7" ; "number")]
#[test_case(json!(["a", 1]), r#"["a",1]"# ; "list")]
#[test_case(json!({"k": true}), r#"{"k":true}"# ; "map")]
fn test_cell_text(value: Value, expected: &str) {
    assert_eq!(cell_text(&value), expected);
}

#[test]
fn test_tsv_has_header_and_json_cells() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("rows.tsv");

    let (_, table) = reconcile(vec![
        json!({"id": 1, "concepts": ["x", "y"]}),
        json!({"id": 2, "title": "b"}),
    ]);

    assert_eq!(write_delimited(&path, &table, Delimiter::Tab).unwrap(), 2);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(&path)
        .unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, vec!["id", "concepts", "title"]);

    let rows: Vec<Vec<String>> = reader
        .records()
        .map(|row| row.unwrap().iter().map(String::from).collect())
        .collect();
    assert_eq!(rows[0], vec!["1", r#"["x","y"]"#, ""]);
    assert_eq!(rows[1], vec!["2", "", "b"]);
}

// ============================================================================
// Persister Tests
// ============================================================================

#[test_case(Some("machine learning"), "works_machinelearning_20240102_030405" ; "spaces removed")]
#[test_case(Some("a/b:c"), "works_abc_20240102_030405" ; "punctuation removed")]
#[test_case(Some(""), "works_20240102_030405" ; "empty query")]
#[test_case(Some("!!!"), "works_20240102_030405" ; "nothing left")]
#[test_case(None, "works_20240102_030405" ; "no query")]
#[test_case(
    Some("abcdefghijklmnopqrstuvwxyz0123456789"),
    "works_abcdefghijklmnopqrstuvwxyz0123_20240102_030405" ;
    "first thirty characters"
)]
fn test_file_stem(query: Option<&str>, expected: &str) {
    let timestamp = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(3, 4, 5)
        .unwrap();
    assert_eq!(file_stem("works", query, timestamp), expected);
}

#[test]
fn test_dual_persist_writes_parquet_and_raw_jsonl() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("nested").join("out");

    let mut rows: Vec<Value> = (0..8)
        .map(|i| json!({"id": i, "affiliation": {"name": format!("org {i}")}}))
        .collect();
    rows.push(json!({"id": 8, "affiliation": ["a", "b"]}));
    rows.push(json!({"id": 9, "affiliation": ["c"]}));
    let (raw, table) = reconcile(rows);
    let result = result_set(raw.clone());

    let persister = DualFormatPersister::new(&output_dir, OutputFormat::Dual);
    let files = persister
        .persist("works", Some("graphene"), &result, &table)
        .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].format, OutputFormat::Jsonl);
    assert_eq!(files[1].format, OutputFormat::Parquet);
    for file in &files {
        assert_eq!(file.rows, 10);
        assert!(file.size_bytes > 0);
        assert!(file.path.starts_with(&output_dir));
        let name = file.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("works_graphene_"), "{name}");
    }

    // The lossless copy keeps the minority list values
    let jsonl = read_jsonl(&files[0].path).unwrap();
    assert_eq!(jsonl, raw);
    assert_eq!(jsonl[8]["affiliation"], json!(["a", "b"]));

    // The typed table has them nulled
    let parquet: Vec<Value> = read_parquet(&files[1].path)
        .unwrap()
        .iter()
        .flat_map(|batch| arrow_to_json(batch).unwrap())
        .collect();
    assert_eq!(parquet.len(), 10);
    assert_eq!(parquet[0]["affiliation"], json!({"name": "org 0"}));
    assert_eq!(parquet[8], json!({"id": 8}));
}

#[test_case(OutputFormat::Parquet, "parquet" ; "parquet")]
#[test_case(OutputFormat::Jsonl, "jsonl" ; "jsonl")]
#[test_case(OutputFormat::Tsv, "tsv" ; "tsv")]
#[test_case(OutputFormat::Csv, "csv" ; "csv")]
fn test_single_format_persist(format: OutputFormat, extension: &str) {
    let dir = tempdir().unwrap();
    let (raw, table) = reconcile(vec![json!({"id": 1}), json!({"id": 2})]);
    let result = result_set(raw);

    let files = DualFormatPersister::new(dir.path(), format)
        .persist("pubs", None, &result, &table)
        .unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(files[0].format, format);
    assert_eq!(files[0].rows, 2);
    assert_eq!(files[0].path.extension().unwrap(), extension);
}

#[test]
fn test_empty_result_writes_nothing() {
    let dir = tempdir().unwrap();
    let output_dir = dir.path().join("never-created");

    let result = result_set(Vec::new());
    let table = TypeReconciler::new().reconcile(&result.records);

    let files = DualFormatPersister::new(&output_dir, OutputFormat::Dual)
        .persist("works", Some("q"), &result, &table)
        .unwrap();

    assert!(files.is_empty());
    assert!(!output_dir.exists());
}

#[test]
fn test_repeated_persist_never_shares_files() {
    let dir = tempdir().unwrap();
    let persister = DualFormatPersister::new(dir.path(), OutputFormat::Dual);

    let (small_raw, small_table) = reconcile((0..3).map(|i| json!({"id": i})).collect());
    let (large_raw, large_table) = reconcile((0..9).map(|i| json!({"id": i})).collect());

    let small = persister
        .persist("works", Some("alpha"), &result_set(small_raw), &small_table)
        .unwrap();
    let large = persister
        .persist("works", Some("alpha"), &result_set(large_raw), &large_table)
        .unwrap();

    for (a, b) in small.iter().zip(&large) {
        assert_ne!(a.path, b.path);
    }
    assert_eq!(read_jsonl(&small[0].path).unwrap().len(), 3);
    assert_eq!(read_jsonl(&large[0].path).unwrap().len(), 9);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);
}

#[test]
fn test_suffixed_stem_keeps_formats_together() {
    let dir = tempdir().unwrap();
    let persister = DualFormatPersister::new(dir.path(), OutputFormat::Dual);
    let (raw, table) = reconcile(vec![json!({"id": 1})]);
    let result = result_set(raw);

    let files: Vec<_> = (0..3)
        .flat_map(|_| persister.persist("works", None, &result, &table).unwrap())
        .collect();

    for pair in files.chunks(2) {
        assert_eq!(pair[0].path.file_stem(), pair[1].path.file_stem());
    }
    let mut paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), 6);
}

fn nested_table() -> ReconciledTable {
    reconcile(vec![
        json!({"id": "W1", "authorships": [{"position": "first"}], "venue": {"name": "Nature"}}),
        json!({"id": "W2", "authorships": [{"position": "last"}], "venue": {"name": "Cell"}}),
    ])
    .1
}

fn has_nested_columns(batch: &arrow::record_batch::RecordBatch) -> bool {
    batch
        .schema()
        .fields()
        .iter()
        .any(|field| matches!(field.data_type(), DataType::List(_) | DataType::Struct(_)))
}

#[test]
fn test_failed_native_write_retries_as_json_text() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("works.parquet");
    let attempts = std::cell::Cell::new(0);

    let rows = persister::write_parquet_table_with(&path, &nested_table(), |path, batch| {
        attempts.set(attempts.get() + 1);
        if has_nested_columns(batch) {
            return Err(crate::error::Error::Other("nested columns rejected".into()));
        }
        write_batch_to_parquet(path, batch, &ParquetWriterConfig::default())
    })
    .unwrap();

    assert_eq!(rows, 2);
    assert_eq!(attempts.get(), 2);

    let batches = read_parquet(&path).unwrap();
    let schema = batches[0].schema();
    assert_eq!(schema.field_with_name("venue").unwrap().data_type(), &DataType::Utf8);
    assert_eq!(schema.field_with_name("authorships").unwrap().data_type(), &DataType::Utf8);

    let read_back: Vec<Value> = batches
        .iter()
        .flat_map(|batch| arrow_to_json(batch).unwrap())
        .collect();
    let venue: Value = serde_json::from_str(read_back[0]["venue"].as_str().unwrap()).unwrap();
    assert_eq!(venue, json!({"name": "Nature"}));
}

#[test]
fn test_second_parquet_failure_is_persistence_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("works.parquet");
    let attempts = std::cell::Cell::new(0);

    let err = persister::write_parquet_table_with(&path, &nested_table(), |_, _| {
        attempts.set(attempts.get() + 1);
        Err(crate::error::Error::Other("disk full".into()))
    })
    .unwrap_err();

    assert_eq!(attempts.get(), 2);
    assert!(matches!(err, crate::error::Error::Persistence { .. }));
    assert!(err.to_string().contains("disk full"));
}
