use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Float32Type, Float64Type, Int32Type, Int64Type};
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::sync::Client;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::cache::DatasetCache;
use super::coerce::coerce;
use super::export::derived_source;
use super::model::{CellValue, Metric, RawTable, StreamerDataset, TextField, ID_FIELD};
use crate::config::{DataSource, MongoTarget};

// ---------------------------------------------------------------------------
// Errors surfaced at the loader boundary
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Missing or malformed connection parameters.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// Timeout, refused connection or failed query.
    #[error("Error connecting to MongoDB: {0}")]
    Connectivity(#[from] mongodb::error::Error),
    #[error("Failed to read snapshot {path}: {source:#}")]
    Snapshot {
        path: String,
        #[source]
        source: anyhow::Error,
    },
}

// ---------------------------------------------------------------------------
// Load results
// ---------------------------------------------------------------------------

/// A successfully loaded dataset together with where it came from.
#[derive(Debug, Clone, Default)]
pub struct Loaded {
    pub dataset: StreamerDataset,
    pub database: String,
    pub collection: String,
}

/// What the dashboard receives from the loader: always a dataset (possibly
/// empty) and, on failure, the error to display.
#[derive(Debug)]
pub struct LoadOutcome {
    pub loaded: Arc<Loaded>,
    pub error: Option<LoadError>,
}

impl LoadOutcome {
    pub fn dataset(&self) -> &StreamerDataset {
        &self.loaded.dataset
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load through the cache. Never fails: any error yields an empty dataset with
/// empty names plus the error.
pub fn load_dataset(
    source: &DataSource,
    timeout: Duration,
    ttl: Duration,
    cache: &mut DatasetCache<Loaded>,
) -> LoadOutcome {
    match cache.get_or_load(ttl, || fetch(source, timeout)) {
        Ok(loaded) => LoadOutcome {
            loaded,
            error: None,
        },
        Err(e) => {
            log::error!("Failed to load dataset: {e}");
            LoadOutcome {
                loaded: Arc::new(Loaded::default()),
                error: Some(e),
            }
        }
    }
}

/// Fetch and coerce a dataset from `source`, bypassing the cache.
pub fn fetch(source: &DataSource, timeout: Duration) -> Result<Loaded, LoadError> {
    match source {
        DataSource::Mongo(settings) => {
            let target = settings.resolve()?;
            let table = fetch_collection(&target, timeout)?;
            log::info!(
                "Loaded {} documents from {}.{} with columns {:?}",
                table.len(),
                target.database,
                target.collection,
                table.columns
            );
            Ok(Loaded {
                dataset: coerce(table),
                database: target.database,
                collection: target.collection,
            })
        }
        DataSource::Snapshot(path) => {
            let table = load_file(path).map_err(|source| LoadError::Snapshot {
                path: path.display().to_string(),
                source,
            })?;
            log::info!(
                "Loaded {} records from {} with columns {:?}",
                table.len(),
                path.display(),
                table.columns
            );
            let collection = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            Ok(Loaded {
                dataset: coerce(table),
                database: "snapshot".to_string(),
                collection,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// MongoDB
// ---------------------------------------------------------------------------

/// Read every document of the target collection. The client is shut down,
/// closing its connections, before returning on both success and failure.
pub fn fetch_collection(target: &MongoTarget, timeout: Duration) -> Result<RawTable, LoadError> {
    let mut options = ClientOptions::parse(target.uri.as_str())
        .run()
        .map_err(|e| LoadError::Configuration(format!("invalid MongoDB URI: {e}")))?;
    options.server_selection_timeout = Some(timeout);
    options.connect_timeout = Some(timeout);

    let client = Client::with_options(options)?;
    let documents = read_documents(&client, target);
    client.shutdown().run();
    log::debug!("Closed connection to {}.{}", target.database, target.collection);
    Ok(RawTable::from_ordered_rows(documents?))
}

/// The cursor is dropped here, so shutdown does not wait on it.
fn read_documents(
    client: &Client,
    target: &MongoTarget,
) -> mongodb::error::Result<Vec<Vec<(String, CellValue)>>> {
    let collection = client
        .database(&target.database)
        .collection::<Document>(&target.collection);
    let mut documents = Vec::new();
    for result in collection.find(doc! {}).run()? {
        documents.push(document_to_row(result?));
    }
    Ok(documents)
}

fn document_to_row(document: Document) -> Vec<(String, CellValue)> {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_cell(value)))
        .collect()
}

fn bson_to_cell(value: Bson) -> CellValue {
    match value {
        Bson::String(s) => CellValue::String(s),
        Bson::Int32(i) => CellValue::Integer(i64::from(i)),
        Bson::Int64(i) => CellValue::Integer(i),
        Bson::Double(f) => CellValue::Float(f),
        Bson::Boolean(b) => CellValue::Bool(b),
        Bson::Null | Bson::Undefined => CellValue::Null,
        Bson::ObjectId(oid) => CellValue::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => CellValue::String(s),
            Err(_) => CellValue::String(dt.to_string()),
        },
        other => CellValue::String(other.into_relaxed_extjson().to_string()),
    }
}

// ---------------------------------------------------------------------------
// Snapshot files
// ---------------------------------------------------------------------------

/// Load a snapshot of the collection from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.json`    – `[{ "username": "...", "is_live": "Yes", ... }, ...]`
///   (`mongoexport --jsonArray` output)
/// * `.csv`     – a file written by the CSV exporter
/// * `.parquet` – a file written by the Parquet exporter
pub fn load_file(path: &Path) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "json" => load_json(path),
        "csv" => {
            let file = std::fs::File::open(path).context("opening CSV")?;
            read_csv(file)
        }
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

fn load_json(path: &Path) -> Result<RawTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

/// Parse a JSON array of documents, keeping each document's key order.
pub fn parse_json(text: &str) -> Result<RawTable> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let mut documents = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        documents.push(
            obj.iter()
                .map(|(key, val)| (key.clone(), json_to_cell(val)))
                .collect(),
        );
    }

    Ok(RawTable::from_ordered_rows(documents))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Read a CSV document as written by the exporter.
///
/// The typed string columns are taken verbatim and metric columns are left to
/// coercion. Every other column gets one type for all its cells: numeric when
/// every non-empty cell is a number, boolean when every one is `true`/`false`,
/// text otherwise. Empty fields are null. Derived hour columns are dropped when
/// the minutes column they were computed from is present.
pub fn read_csv<R: Read>(input: R) -> Result<RawTable> {
    let mut reader = csv::Reader::from_reader(input);
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut raw_rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        raw_rows.push(result.with_context(|| format!("CSV row {row_no}"))?);
    }

    let kinds: Vec<CsvKind> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| column_kind(name, raw_rows.iter().filter_map(|r| r.get(i))))
        .collect();

    let documents = raw_rows
        .iter()
        .map(|record| {
            headers
                .iter()
                .zip(&kinds)
                .zip(record.iter())
                .map(|((name, kind), value)| (name.clone(), kind.cell(value)))
                .collect()
        })
        .collect();

    let mut table = RawTable::from_ordered_rows(documents);
    // A header-only file still declares its columns.
    if table.is_empty() {
        table.columns = headers.into_iter().filter(|h| h != ID_FIELD).collect();
    }
    Ok(strip_derived_columns(table))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsvKind {
    Text,
    Number,
    Bool,
}

impl CsvKind {
    fn cell(self, value: &str) -> CellValue {
        if value.is_empty() {
            return CellValue::Null;
        }
        match self {
            CsvKind::Text => CellValue::String(value.to_string()),
            CsvKind::Number => match value.parse::<i64>() {
                Ok(i) => CellValue::Integer(i),
                Err(_) => value
                    .parse::<f64>()
                    .map_or_else(|_| CellValue::String(value.to_string()), CellValue::Float),
            },
            CsvKind::Bool => CellValue::Bool(value == "true"),
        }
    }
}

/// Typed string and metric columns are always text; other columns take the
/// narrowest kind every non-empty cell fits.
fn column_kind<'a>(column: &str, values: impl Iterator<Item = &'a str>) -> CsvKind {
    if TextField::from_column(column).is_some() || Metric::from_column(column).is_some() {
        return CsvKind::Text;
    }
    let mut kind = None;
    for value in values.filter(|v| !v.is_empty()) {
        let this = if value.parse::<f64>().is_ok() {
            CsvKind::Number
        } else if value == "true" || value == "false" {
            CsvKind::Bool
        } else {
            return CsvKind::Text;
        };
        match kind {
            None => kind = Some(this),
            Some(k) if k == this => {}
            Some(_) => return CsvKind::Text,
        }
    }
    kind.unwrap_or(CsvKind::Text)
}

/// Drop exported hour columns whose minutes column is also present; they are
/// recomputed on every export.
fn strip_derived_columns(mut table: RawTable) -> RawTable {
    let derived: Vec<String> = table
        .columns
        .iter()
        .filter(|c| derived_source(c).is_some_and(|m| table.columns.iter().any(|o| o == m.column())))
        .cloned()
        .collect();
    if derived.is_empty() {
        return table;
    }
    table.columns.retain(|c| !derived.contains(c));
    for row in &mut table.rows {
        for column in &derived {
            row.remove(column);
        }
    }
    table
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file; every column becomes a document field.
fn load_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut documents = Vec::new();
    let mut columns = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();
        columns = schema.fields().iter().map(|f| f.name().clone()).collect();

        for row in 0..batch.num_rows() {
            let mut doc = Vec::with_capacity(columns.len());
            for (col_idx, name) in columns.iter().enumerate() {
                doc.push((name.clone(), extract_cell(batch.column(col_idx), row)));
            }
            documents.push(doc);
        }
    }

    let mut table = RawTable::from_ordered_rows(documents);
    if table.is_empty() {
        table.columns = columns.into_iter().filter(|c| c != ID_FIELD).collect();
    }
    Ok(strip_derived_columns(table))
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    match col.data_type() {
        DataType::Utf8 => CellValue::String(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => CellValue::Integer(i64::from(col.as_primitive::<Int32Type>().value(row))),
        DataType::Int64 => CellValue::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float32 => CellValue::Float(f64::from(col.as_primitive::<Float32Type>().value(row))),
        DataType::Float64 => CellValue::Float(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => CellValue::Bool(col.as_boolean().value(row)),
        other => CellValue::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MongoSettings;

    #[test]
    fn json_snapshot_keeps_key_order_and_strips_id() {
        let table = parse_json(
            r#"[
                {"_id": {"$oid": "65a1"}, "username": "a", "current_viewers": 10, "is_live": "Yes"},
                {"username": "b", "rank": 2.5, "is_live": "No"}
            ]"#,
        )
        .unwrap();
        assert_eq!(table.columns, vec!["username", "current_viewers", "is_live", "rank"]);
        assert_eq!(table.rows[1].get("rank"), Some(&CellValue::Float(2.5)));
    }

    #[test]
    fn json_snapshot_must_be_an_array() {
        assert!(parse_json(r#"{"username": "a"}"#).is_err());
        assert!(parse_json(r#"[1, 2]"#).is_err());
    }

    #[test]
    fn csv_reads_typed_columns_verbatim() {
        let text = "username,current_viewers,total_streaming_hours,total_streaming_minutes,rank\n\
                    007,12,1.5,90,3\n";
        let table = read_csv(text.as_bytes()).unwrap();
        assert_eq!(
            table.columns,
            vec!["username", "current_viewers", "total_streaming_minutes", "rank"]
        );
        let row = &table.rows[0];
        assert_eq!(row.get("username"), Some(&CellValue::String("007".into())));
        assert_eq!(row.get("rank"), Some(&CellValue::Integer(3)));
    }

    #[test]
    fn csv_column_with_any_text_stays_text() {
        let text = "username,twitter_id,flag\na,12345,true\nb,@bob,maybe\nc,,\n";
        let table = read_csv(text.as_bytes()).unwrap();
        assert_eq!(table.rows[0].get("twitter_id"), Some(&CellValue::String("12345".into())));
        assert_eq!(table.rows[0].get("flag"), Some(&CellValue::String("true".into())));
        assert_eq!(table.rows[2].get("twitter_id"), Some(&CellValue::Null));
    }

    #[test]
    fn csv_uniform_columns_are_typed() {
        let text = "username,rank,score,flag\na,1,2.5,true\nb,2,3.0,false\n";
        let table = read_csv(text.as_bytes()).unwrap();
        let row = &table.rows[1];
        assert_eq!(row.get("rank"), Some(&CellValue::Integer(2)));
        assert_eq!(row.get("score"), Some(&CellValue::Float(3.0)));
        assert_eq!(row.get("flag"), Some(&CellValue::Bool(false)));
    }

    #[test]
    fn csv_mixed_integer_and_float_cells_keep_their_own_type() {
        let text = "username,rank\na,1\nb,1.5\n";
        let table = read_csv(text.as_bytes()).unwrap();
        assert_eq!(table.rows[0].get("rank"), Some(&CellValue::Integer(1)));
        assert_eq!(table.rows[1].get("rank"), Some(&CellValue::Float(1.5)));
    }

    #[test]
    fn csv_keeps_derived_column_without_its_source() {
        let table = read_csv("username,total_streaming_hours\na,2.0\n".as_bytes()).unwrap();
        assert_eq!(table.columns, vec!["username", "total_streaming_hours"]);
    }

    #[test]
    fn unreachable_server_fails_within_timeout() {
        let target = MongoTarget {
            uri: "mongodb://127.0.0.1:1/?directConnection=true".into(),
            database: "twitch".into(),
            collection: "streamers".into(),
        };
        let started = std::time::Instant::now();
        let err = fetch_collection(&target, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, LoadError::Connectivity(_)));
        // Shutting the client down must not block past the selection timeout.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn malformed_uri_is_a_configuration_error() {
        let target = MongoTarget {
            uri: "not-a-uri".into(),
            database: "twitch".into(),
            collection: "streamers".into(),
        };
        let err = fetch_collection(&target, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, LoadError::Configuration(_)));
    }

    #[test]
    fn unsupported_snapshot_extension_is_an_error() {
        let err = load_file(Path::new("streamers.txt")).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }

    #[test]
    fn missing_configuration_yields_empty_dataset_and_error() {
        let source = DataSource::Mongo(MongoSettings::default());
        let mut cache = DatasetCache::new();
        let outcome = load_dataset(
            &source,
            Duration::from_secs(5),
            Duration::from_secs(300),
            &mut cache,
        );
        assert!(outcome.dataset().is_empty());
        assert!(outcome.loaded.database.is_empty());
        assert!(outcome.loaded.collection.is_empty());
        assert!(matches!(outcome.error, Some(LoadError::Configuration(_))));
        assert!(!cache.is_loaded());
    }

    #[test]
    fn missing_snapshot_file_is_reported_not_raised() {
        let source = DataSource::Snapshot("/nonexistent/streamers.json".into());
        let mut cache = DatasetCache::new();
        let outcome = load_dataset(
            &source,
            Duration::from_secs(5),
            Duration::from_secs(300),
            &mut cache,
        );
        assert!(outcome.dataset().is_empty());
        assert!(matches!(outcome.error, Some(LoadError::Snapshot { .. })));
    }

    #[test]
    fn snapshot_names_collection_after_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamers.json");
        std::fs::write(&path, r#"[{"username": "a", "views": "12"}]"#).unwrap();

        let loaded = fetch(&DataSource::Snapshot(path), Duration::from_secs(5)).unwrap();
        assert_eq!(loaded.collection, "streamers");
        assert_eq!(loaded.dataset.records[0].metric(Metric::Views), 12.0);
    }
}
