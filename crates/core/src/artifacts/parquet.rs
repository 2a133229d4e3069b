//! Parquet encode/decode helpers for result artifacts.
//!
//! Workers produce two parquet artifacts per task (odds-path rows and field
//! explanations). The orchestrator does not impose a schema on them; it
//! decodes whatever columns are present into row-oriented JSON for clients.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Error type for artifact decoding/encoding.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("unsupported column type in artifact: {column} ({data_type})")]
    UnsupportedColumn { column: String, data_type: String },
}

/// Decode a parquet artifact into row-oriented JSON objects.
///
/// Supports the column types workers actually emit: Utf8, Int32, Int64,
/// Float32, Float64 and Boolean. Nulls become JSON nulls.
pub fn read_rows(bytes: &Bytes) -> Result<Vec<Value>, ArtifactError> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())
        .map_err(|e| ArtifactError::Parquet(format!("reader init failed: {e}")))?
        .build()
        .map_err(|e| ArtifactError::Parquet(format!("reader build failed: {e}")))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| ArtifactError::Parquet(format!("read batch failed: {e}")))?;
        decode_batch(&batch, &mut rows)?;
    }

    Ok(rows)
}

fn decode_batch(batch: &RecordBatch, rows: &mut Vec<Value>) -> Result<(), ArtifactError> {
    let schema = batch.schema();
    let start = rows.len();
    rows.resize_with(start + batch.num_rows(), || Value::Object(Map::new()));

    for (col_idx, field) in schema.fields().iter().enumerate() {
        let column = batch.column(col_idx);
        for row_idx in 0..batch.num_rows() {
            let value = if column.is_null(row_idx) {
                Value::Null
            } else {
                cell_value(field.name(), field.data_type(), column.as_ref(), row_idx)?
            };

            if let Value::Object(map) = &mut rows[start + row_idx] {
                map.insert(field.name().clone(), value);
            }
        }
    }

    Ok(())
}

fn cell_value(
    name: &str,
    data_type: &DataType,
    column: &dyn Array,
    row: usize,
) -> Result<Value, ArtifactError> {
    let unsupported = || ArtifactError::UnsupportedColumn {
        column: name.to_string(),
        data_type: data_type.to_string(),
    };

    match data_type {
        DataType::Utf8 => {
            let array = column
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(unsupported)?;
            Ok(Value::String(array.value(row).to_string()))
        }
        DataType::Int32 => {
            let array = column
                .as_any()
                .downcast_ref::<Int32Array>()
                .ok_or_else(unsupported)?;
            Ok(Value::Number(Number::from(array.value(row))))
        }
        DataType::Int64 => {
            let array = column
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(unsupported)?;
            Ok(Value::Number(Number::from(array.value(row))))
        }
        DataType::Float32 => {
            let array = column
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(unsupported)?;
            Ok(Number::from_f64(f64::from(array.value(row)))
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        DataType::Float64 => {
            let array = column
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(unsupported)?;
            Ok(Number::from_f64(array.value(row))
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        DataType::Boolean => {
            let array = column
                .as_any()
                .downcast_ref::<BooleanArray>()
                .ok_or_else(unsupported)?;
            Ok(Value::Bool(array.value(row)))
        }
        _ => Err(unsupported()),
    }
}

/// Column data for encoding a worker-shaped artifact (tests and tooling).
#[derive(Debug, Clone)]
pub enum ColumnData {
    Utf8(Vec<String>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Boolean(Vec<bool>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Boolean(_) => DataType::Boolean,
        }
    }

    fn into_array(self) -> Arc<dyn Array> {
        match self {
            ColumnData::Utf8(v) => Arc::new(StringArray::from(v)),
            ColumnData::Int64(v) => Arc::new(Int64Array::from(v)),
            ColumnData::Float64(v) => Arc::new(Float64Array::from(v)),
            ColumnData::Boolean(v) => Arc::new(BooleanArray::from(v)),
        }
    }
}

/// Encode columns into a single-batch parquet file.
pub fn write_rows(columns: Vec<(&str, ColumnData)>) -> Result<Bytes, ArtifactError> {
    if columns.is_empty() {
        return Err(ArtifactError::Parquet("no columns".to_string()));
    }

    let rows = columns[0].1.len();
    if columns.iter().any(|(_, data)| data.len() != rows) {
        return Err(ArtifactError::Parquet("column length mismatch".to_string()));
    }

    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, data)| Field::new(*name, data.data_type(), false))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<Arc<dyn Array>> = columns
        .into_iter()
        .map(|(_, data)| data.into_array())
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays)
        .map_err(|e| ArtifactError::Parquet(format!("record batch build failed: {e}")))?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, None)
        .map_err(|e| ArtifactError::Parquet(format!("writer init failed: {e}")))?;
    writer
        .write(&batch)
        .map_err(|e| ArtifactError::Parquet(format!("write failed: {e}")))?;
    writer
        .close()
        .map_err(|e| ArtifactError::Parquet(format!("close failed: {e}")))?;

    Ok(Bytes::from(cursor.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_worker_shaped_artifact() {
        let bytes = write_rows(vec![
            (
                "market",
                ColumnData::Utf8(vec!["1X2".to_string(), "over_under".to_string()]),
            ),
            ("line", ColumnData::Float64(vec![1.85, 2.10])),
            ("page", ColumnData::Int64(vec![3, 7])),
            ("suspended", ColumnData::Boolean(vec![false, true])),
        ])
        .unwrap();

        let rows = read_rows(&bytes).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0]["market"], "1X2");
        assert_eq!(rows[0]["line"], 1.85);
        assert_eq!(rows[1]["page"], 7);
        assert_eq!(rows[1]["suspended"], true);
    }

    #[test]
    fn test_empty_artifact_decodes_to_no_rows() {
        let bytes = write_rows(vec![("market", ColumnData::Utf8(vec![]))]).unwrap();
        assert!(read_rows(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_column_length_mismatch_rejected() {
        let result = write_rows(vec![
            ("a", ColumnData::Int64(vec![1, 2])),
            ("b", ColumnData::Int64(vec![1])),
        ]);
        assert!(matches!(result, Err(ArtifactError::Parquet(_))));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let result = read_rows(&Bytes::from_static(b"not a parquet file"));
        assert!(matches!(result, Err(ArtifactError::Parquet(_))));
    }
}
