// ai
//! 🏛️ Parquet objects — rows in, columns out, one parquet file per rollover.
//!
//! 🎬 *[row one walks in. it decides what every column will be, forever. row two walks in
//! wearing a different hat. row two is not let in.]*
//!
//! 🧠 Knowledge graph:
//! - A `Row` is an ordered JSON object. Field order of the first row is the column order.
//! - Column types come from the first row's values: bool → Boolean, integer → Int64,
//!   other numbers → Float64, string or null → Utf8, arrays/objects → JSON text in Utf8.
//! - The schema is sticky across rollovers. `reset` drops rows, never the schema.
//! - Later rows must carry the same field set. Nulls are always fine. Integers are fine in a
//!   Float64 column. Everything else that disagrees is a `SchemaMismatchError`, and the row
//!   is not buffered.
//! - `{}` can't establish a schema (zero columns encode to nothing). It is a mismatch too,
//!   and the next row with fields gets to decide.
//! - Every column is nullable. Analysts will thank us. Eventually.

use std::sync::Arc;

use arrow_array::{ArrayRef, BooleanArray, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use bytes::Bytes;
use object_store::ObjectStore;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{ObjectEncoder, RollingWriter};
use crate::error::{ConfigurationError, SchemaMismatchError, WriteError};
use crate::object_name::ObjectNameTemplate;
use crate::rollover::RolloverPolicy;

/// 🧾 One parquet row: an ordered JSON object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Row(map)
    }

    /// 🔀 A line that parses as a JSON object is the row. Anything else gets wrapped as
    /// `{"string": line}`, so plain text still lands somewhere sensible.
    pub fn from_line(line: &str) -> Self {
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Row(map),
            _ => {
                let mut map = Map::with_capacity(1);
                map.insert("string".to_string(), Value::String(line.to_string()));
                Row(map)
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl From<Map<String, Value>> for Row {
    fn from(value: Map<String, Value>) -> Self {
        Row(value)
    }
}

/// 🏷️ Column types a row can establish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Int64,
    Float64,
    Utf8,
    /// Nested arrays and objects, stored as JSON text.
    Json,
}

impl ColumnType {
    fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => ColumnType::Boolean,
            Value::Number(n) if n.is_i64() => ColumnType::Int64,
            Value::Number(_) => ColumnType::Float64,
            Value::String(_) | Value::Null => ColumnType::Utf8,
            Value::Array(_) | Value::Object(_) => ColumnType::Json,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Int64, Value::Number(n)) => n.is_i64(),
            // -- widening: ints ride along in float columns
            (ColumnType::Float64, Value::Number(_)) => true,
            (ColumnType::Utf8, Value::String(_)) => true,
            (ColumnType::Json, Value::Array(_) | Value::Object(_)) => true,
            _ => false,
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 | ColumnType::Json => DataType::Utf8,
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(n) if n.is_i64() => "an integer",
        Value::Number(_) => "a float",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// 🫁 Parquet page compression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParquetCompression {
    Uncompressed,
    #[default]
    Snappy,
    Gzip,
    Zstd,
}

impl ParquetCompression {
    fn codec(&self) -> Compression {
        match self {
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Gzip => Compression::GZIP(GzipLevel::default()),
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
        }
    }
}

/// 🔧 Everything a `ParquetWriter` needs besides the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ParquetWriterConfig {
    pub object: String,
    pub rollover: RolloverPolicy,
    pub compression: ParquetCompression,
}

impl ParquetWriterConfig {
    pub fn new(object: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            rollover: RolloverPolicy::default(),
            compression: ParquetCompression::default(),
        }
    }

    #[must_use]
    pub fn with_rollover(mut self, rollover: RolloverPolicy) -> Self {
        self.rollover = rollover;
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: ParquetCompression) -> Self {
        self.compression = compression;
        self
    }
}

struct Column {
    name: String,
    kind: ColumnType,
}

pub(crate) struct ParquetEncoder {
    columns: Option<Vec<Column>>,
    schema: Option<SchemaRef>,
    rows: Vec<Row>,
    estimated_bytes: usize,
    properties: WriterProperties,
}

impl ParquetEncoder {
    fn new(compression: ParquetCompression) -> Self {
        Self {
            columns: None,
            schema: None,
            rows: Vec::new(),
            estimated_bytes: 0,
            properties: WriterProperties::builder()
                .set_compression(compression.codec())
                .build(),
        }
    }

    fn establish(&mut self, row: &Row) -> Result<(), SchemaMismatchError> {
        // -- a zero-column table can't be encoded, so `{}` can't be the row that decides
        if row.is_empty() {
            return Err(SchemaMismatchError {
                reason: "the first row has no fields to build columns from".to_string(),
            });
        }
        let columns: Vec<Column> = row
            .0
            .iter()
            .map(|(name, value)| Column {
                name: name.clone(),
                kind: ColumnType::infer(value),
            })
            .collect();
        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(&c.name, c.kind.data_type(), true))
            .collect();
        self.schema = Some(Arc::new(Schema::new(fields)));
        self.columns = Some(columns);
        Ok(())
    }

    fn check(columns: &[Column], row: &Row) -> Result<(), SchemaMismatchError> {
        let same_fields =
            row.len() == columns.len() && columns.iter().all(|c| row.0.contains_key(&c.name));
        if !same_fields {
            let expected: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            let got: Vec<&str> = row.fields().collect();
            return Err(SchemaMismatchError {
                reason: format!("expected fields {expected:?}, got {got:?}"),
            });
        }
        for column in columns {
            if let Some(value) = row.get(&column.name) {
                if !column.kind.accepts(value) {
                    return Err(SchemaMismatchError {
                        reason: format!(
                            "field '{}' is {:?}, got {}",
                            column.name,
                            column.kind,
                            describe(value)
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn estimate(row: &Row) -> usize {
        row.0
            .iter()
            .map(|(name, value)| {
                name.len()
                    + match value {
                        Value::Null => 0,
                        Value::Bool(_) => 1,
                        Value::Number(_) => 8,
                        Value::String(s) => s.len(),
                        other => other.to_string().len(),
                    }
            })
            .sum()
    }

    fn column_array(&self, column: &Column) -> ArrayRef {
        let values = self.rows.iter().map(|row| row.get(&column.name));
        match column.kind {
            ColumnType::Boolean => Arc::new(BooleanArray::from(
                values.map(|v| v.and_then(Value::as_bool)).collect::<Vec<_>>(),
            )),
            ColumnType::Int64 => Arc::new(Int64Array::from(
                values.map(|v| v.and_then(Value::as_i64)).collect::<Vec<_>>(),
            )),
            ColumnType::Float64 => Arc::new(Float64Array::from(
                values.map(|v| v.and_then(Value::as_f64)).collect::<Vec<_>>(),
            )),
            ColumnType::Utf8 => Arc::new(StringArray::from(
                values
                    .map(|v| v.and_then(Value::as_str).map(str::to_string))
                    .collect::<Vec<Option<String>>>(),
            )),
            ColumnType::Json => Arc::new(StringArray::from(
                values
                    .map(|v| v.filter(|v| !v.is_null()).map(Value::to_string))
                    .collect::<Vec<Option<String>>>(),
            )),
        }
    }
}

impl ObjectEncoder for ParquetEncoder {
    type Item = Row;

    fn append(&mut self, row: Row) -> Result<(), WriteError> {
        if self.columns.is_none() {
            self.establish(&row)?;
        }
        if let Some(columns) = &self.columns {
            Self::check(columns, &row)?;
        }
        self.estimated_bytes += Self::estimate(&row);
        self.rows.push(row);
        Ok(())
    }

    fn buffered_records(&self) -> usize {
        self.rows.len()
    }

    fn buffered_bytes(&self) -> usize {
        self.estimated_bytes
    }

    fn encode(&self) -> Result<Bytes, WriteError> {
        let (Some(columns), Some(schema)) = (&self.columns, &self.schema) else {
            return Err(WriteError::Encode("no schema established yet".to_string()));
        };
        let arrays: Vec<ArrayRef> = columns.iter().map(|c| self.column_array(c)).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays)
            .map_err(|e| WriteError::Encode(format!("record batch: {e}")))?;

        let mut body = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut body, schema.clone(), Some(self.properties.clone()))
            .map_err(|e| WriteError::Encode(format!("parquet writer: {e}")))?;
        writer
            .write(&batch)
            .map_err(|e| WriteError::Encode(format!("parquet write: {e}")))?;
        writer
            .close()
            .map_err(|e| WriteError::Encode(format!("parquet close: {e}")))?;
        Ok(Bytes::from(body))
    }

    fn reset(&mut self) {
        self.rows.clear();
        self.estimated_bytes = 0;
    }
}

/// 🏛️ Batching parquet sink. Same rollover rules as `ObjectWriter`, columnar bodies.
pub struct ParquetWriter {
    inner: RollingWriter<ParquetEncoder>,
}

impl std::fmt::Debug for ParquetWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParquetWriter")
            .field("policy", &self.inner.policy())
            .field("objects_written", &self.inner.objects_written())
            .finish()
    }
}

impl ParquetWriter {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: ParquetWriterConfig,
    ) -> Result<Self, ConfigurationError> {
        let template = ObjectNameTemplate::parse(&config.object)?;
        let encoder = ParquetEncoder::new(config.compression);
        let inner = RollingWriter::new(store, template, config.rollover, encoder)?;
        Ok(Self { inner })
    }

    /// 📥 Append one row. `WriteError::SchemaMismatch` leaves the buffer exactly as it was.
    pub async fn write(&self, row: Row) -> Result<(), WriteError> {
        self.inner.write(row).await
    }

    pub async fn flush(&self) -> Result<Option<String>, WriteError> {
        self.inner.flush().await
    }

    pub async fn close(&mut self) -> Result<Option<String>, WriteError> {
        self.inner.close().await
    }

    pub async fn buffered_records(&self) -> usize {
        self.inner.buffered_records().await
    }

    pub fn objects_written(&self) -> u64 {
        self.inner.objects_written()
    }

    pub fn records_written(&self) -> u64 {
        self.inner.records_written()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::Array;
    use object_store::memory::InMemory;
    use object_store::path::Path as ObjectPath;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use serde_json::json;
    use std::time::Duration;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => Row::from_map(map),
            other => panic!("💀 test rows must be objects, got {other}"),
        }
    }

    async fn read_batches(store: &InMemory, key: &str) -> Vec<RecordBatch> {
        let the_bytes = store
            .get(&ObjectPath::from(key))
            .await
            .expect("💀 parquet object should exist")
            .bytes()
            .await
            .unwrap();
        ParquetRecordBatchReaderBuilder::try_new(the_bytes)
            .unwrap()
            .build()
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn the_one_where_plain_text_gets_wrapped_and_json_objects_pass_through() {
        assert_eq!(Row::from_line("Hello").get("string"), Some(&json!("Hello")));
        assert_eq!(Row::from_line("[1,2]").get("string"), Some(&json!("[1,2]")));
        let the_row = Row::from_line(r#"{"id": 7, "name": "x"}"#);
        assert_eq!(the_row.fields().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[tokio::test]
    async fn the_one_where_the_first_row_sets_the_columns_and_they_round_trip() {
        let the_store = Arc::new(InMemory::new());
        let mut the_writer = ParquetWriter::new(
            the_store.clone(),
            ParquetWriterConfig::new("/data/p%OBJECTNUM.parquet"),
        )
        .unwrap();

        the_writer
            .write(row(json!({"id": 1, "score": 1.5, "ok": true, "name": "a", "tags": ["x"]})))
            .await
            .unwrap();
        the_writer
            .write(row(json!({"id": 2, "score": 3, "ok": null, "name": "b", "tags": {"k": 1}})))
            .await
            .unwrap();
        the_writer.close().await.unwrap();

        let the_batches = read_batches(&the_store, "data/p0.parquet").await;
        assert_eq!(the_batches.len(), 1);
        let the_batch = &the_batches[0];
        assert_eq!(the_batch.num_rows(), 2);

        let the_schema = the_batch.schema();
        let the_types: Vec<&DataType> = the_schema.fields().iter().map(|f| f.data_type()).collect();
        assert_eq!(
            the_types,
            vec![
                &DataType::Int64,
                &DataType::Float64,
                &DataType::Boolean,
                &DataType::Utf8,
                &DataType::Utf8
            ]
        );

        let the_ids = the_batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(the_ids.value(1), 2);
        let the_scores = the_batch.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(the_scores.value(1), 3.0);
        let the_oks = the_batch.column(2).as_any().downcast_ref::<BooleanArray>().unwrap();
        assert!(the_oks.value(0));
        assert!(the_oks.is_null(1));
        let the_tags = the_batch.column(4).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(the_tags.value(0), r#"["x"]"#);
        assert_eq!(the_tags.value(1), r#"{"k":1}"#);
    }

    #[tokio::test]
    async fn the_one_where_a_mismatched_row_is_turned_away_at_the_door() {
        let the_store = Arc::new(InMemory::new());
        let the_writer =
            ParquetWriter::new(the_store.clone(), ParquetWriterConfig::new("m%OBJECTNUM")).unwrap();
        the_writer.write(row(json!({"id": 1}))).await.unwrap();

        let the_wrong_type = the_writer.write(row(json!({"id": "one"}))).await;
        assert!(matches!(the_wrong_type, Err(WriteError::SchemaMismatch(_))));
        let the_extra_field = the_writer.write(row(json!({"id": 2, "more": true}))).await;
        assert!(matches!(the_extra_field, Err(WriteError::SchemaMismatch(_))));
        let the_float_in_int = the_writer.write(row(json!({"id": 2.5}))).await;
        assert!(matches!(the_float_in_int, Err(WriteError::SchemaMismatch(_))));

        assert_eq!(the_writer.buffered_records().await, 1);
    }

    #[tokio::test]
    async fn the_one_where_an_empty_first_row_does_not_get_to_pick_the_columns() {
        let the_store = Arc::new(InMemory::new());
        let mut the_writer = ParquetWriter::new(
            the_store.clone(),
            ParquetWriterConfig::new("e%OBJECTNUM.parquet").with_rollover(RolloverPolicy::Count(1)),
        )
        .unwrap();

        let the_empty = the_writer.write(Row::from_line("{}")).await;
        assert!(matches!(the_empty, Err(WriteError::SchemaMismatch(_))));
        assert_eq!(the_writer.buffered_records().await, 0);
        assert_eq!(the_writer.objects_written(), 0);

        the_writer.write(row(json!({"id": 1}))).await.unwrap();
        assert_eq!(the_writer.objects_written(), 1);
        assert_eq!(the_writer.close().await.unwrap(), Some("e0.parquet".to_string()));

        let the_batches = read_batches(&the_store, "e0.parquet").await;
        assert_eq!(the_batches[0].num_rows(), 1);
        assert_eq!(the_batches[0].schema().field(0).name(), "id");
    }

    #[tokio::test]
    async fn the_one_where_the_schema_survives_rollover() {
        let the_store = Arc::new(InMemory::new());
        let the_writer = ParquetWriter::new(
            the_store.clone(),
            ParquetWriterConfig::new("r%OBJECTNUM.parquet")
                .with_rollover(RolloverPolicy::Count(1))
                .with_compression(ParquetCompression::Zstd),
        )
        .unwrap();
        the_writer.write(row(json!({"v": "a"}))).await.unwrap();
        assert_eq!(the_writer.objects_written(), 1);
        assert!(matches!(
            the_writer.write(row(json!({"w": "b"}))).await,
            Err(WriteError::SchemaMismatch(_))
        ));
        the_writer.write(row(json!({"v": "c"}))).await.unwrap();
        assert_eq!(the_writer.objects_written(), 2);

        let the_batches = read_batches(&the_store, "r1.parquet").await;
        let the_values = the_batches[0].column(0).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(the_values.value(0), "c");
    }

    #[tokio::test]
    async fn the_one_where_parquet_plays_by_the_same_granularity_rules() {
        let the_store = Arc::new(InMemory::new());
        let the_result = ParquetWriter::new(
            the_store,
            ParquetWriterConfig::new("g%OBJECTNUM")
                .with_rollover(RolloverPolicy::Time(Duration::from_millis(500))),
        );
        assert!(matches!(
            the_result,
            Err(ConfigurationError::UnsupportedGranularity { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_timer_writes_parquet_too() {
        let the_store = Arc::new(InMemory::new());
        let mut the_writer = ParquetWriter::new(
            the_store.clone(),
            ParquetWriterConfig::new("t%OBJECTNUM.parquet")
                .with_rollover(RolloverPolicy::Time(Duration::from_secs(2))),
        )
        .unwrap();
        the_writer.write(Row::from_line("tick")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(the_writer.objects_written(), 1);
        assert_eq!(read_batches(&the_store, "t0.parquet").await[0].num_rows(), 1);
        the_writer.close().await.unwrap();
    }
}
