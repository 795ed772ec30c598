use std::fmt;
use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Local};
use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::Workbook;

use super::model::{CellValue, Metric, StreamerDataset, StreamerRecord};

/// Columns that lead every export, each only when present.
pub const PRIORITY_COLUMNS: [&str; 10] = [
    "username",
    "is_live",
    "current_viewers",
    "game_name",
    "language",
    "isVerified",
    "total_streaming_hours",
    "daily_streaming_hours",
    "followers_count",
    "twitter_verified",
];

/// Hour columns computed from a minutes metric at export time.
const DERIVED_HOURS: [(&str, Metric); 2] = [
    ("total_streaming_hours", Metric::TotalStreamingMinutes),
    ("daily_streaming_hours", Metric::DailyStreamingMinutes),
];

pub const DEFAULT_SHEET_NAME: &str = "Streamers";

/// The minutes metric an exported hour column is derived from.
pub fn derived_source(column: &str) -> Option<Metric> {
    DERIVED_HOURS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, metric)| *metric)
}

/// `minutes / 60`, rounded to two decimals.
pub fn minutes_to_hours(minutes: f64) -> f64 {
    (minutes / 60.0 * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ExportColumn {
    Source(String),
    Hours { name: &'static str, from: Metric },
}

impl ExportColumn {
    pub fn name(&self) -> &str {
        match self {
            ExportColumn::Source(name) => name.as_str(),
            ExportColumn::Hours { name, .. } => *name,
        }
    }

    pub fn cell(&self, record: &StreamerRecord) -> CellValue {
        match self {
            ExportColumn::Source(name) => record.cell(name),
            ExportColumn::Hours { from, .. } => CellValue::Float(minutes_to_hours(record.metric(*from))),
        }
    }
}

/// Priority columns first, then every remaining column in dataset order.
pub fn export_columns(dataset: &StreamerDataset) -> Vec<ExportColumn> {
    let derived: Vec<ExportColumn> = DERIVED_HOURS
        .iter()
        .filter(|(_, metric)| dataset.has_metric(*metric))
        .map(|(name, metric)| ExportColumn::Hours {
            name: *name,
            from: *metric,
        })
        .collect();

    let mut columns: Vec<ExportColumn> = Vec::new();
    for name in PRIORITY_COLUMNS {
        if let Some(hours) = derived.iter().find(|c| c.name() == name) {
            columns.push(hours.clone());
        } else if dataset.has_column(name) {
            columns.push(ExportColumn::Source(name.to_string()));
        }
    }
    for name in &dataset.columns {
        if !columns.iter().any(|c| c.name() == name) {
            columns.push(ExportColumn::Source(name.clone()));
        }
    }
    columns
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Excel,
    Parquet,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Excel, ExportFormat::Parquet];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("CSV"),
            ExportFormat::Excel => f.write_str("Excel"),
            ExportFormat::Parquet => f.write_str("Parquet"),
        }
    }
}

/// `streamers_export_YYYYmmdd_HHMMSS.<ext>`
pub fn timestamped_filename(format: ExportFormat, now: DateTime<Local>) -> String {
    format!(
        "streamers_export_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Serialize `dataset` in `format`. `sheet` names the spreadsheet tab.
pub fn export_bytes(dataset: &StreamerDataset, format: ExportFormat, sheet: &str) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Csv => {
            let mut out = Vec::new();
            write_csv(dataset, &mut out)?;
            Ok(out)
        }
        ExportFormat::Excel => to_xlsx(dataset, sheet),
        ExportFormat::Parquet => {
            let mut out = Vec::new();
            write_parquet(dataset, &mut out)?;
            Ok(out)
        }
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn write_csv<W: Write>(dataset: &StreamerDataset, out: W) -> Result<()> {
    let columns = export_columns(dataset);
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(columns.iter().map(|c| c.name()))
        .context("writing CSV header")?;
    for (row_no, record) in dataset.records.iter().enumerate() {
        writer
            .write_record(columns.iter().map(|c| c.cell(record).to_field()))
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

pub fn to_csv_string(dataset: &StreamerDataset) -> Result<String> {
    let mut out = Vec::new();
    write_csv(dataset, &mut out)?;
    String::from_utf8(out).context("CSV output is not UTF-8")
}

// ---------------------------------------------------------------------------
// Spreadsheet
// ---------------------------------------------------------------------------

/// Excel's hard row limit, header included.
const XLSX_MAX_ROWS: usize = 1_048_576;

/// Excel reserves this name for its change-tracking sheet.
const RESERVED_SHEET_NAME: &str = "History";

/// Sheet names are at most 31 characters and may not contain `[]:*?/\`.
pub fn sheet_name(collection: &str) -> String {
    let cleaned: String = collection
        .chars()
        .filter(|&c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .take(31)
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim().to_string();
    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case(RESERVED_SHEET_NAME) {
        DEFAULT_SHEET_NAME.to_string()
    } else {
        cleaned
    }
}

pub fn to_xlsx(dataset: &StreamerDataset, sheet: &str) -> Result<Vec<u8>> {
    if dataset.len() + 1 > XLSX_MAX_ROWS {
        bail!(
            "{} records exceed the spreadsheet limit of {} rows",
            dataset.len(),
            XLSX_MAX_ROWS - 1
        );
    }
    let columns = export_columns(dataset);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name(sheet))?;

    for (col, column) in columns.iter().enumerate() {
        let col = u16::try_from(col).context("too many columns for a spreadsheet")?;
        worksheet.write_string(0, col, column.name())?;
        for (row, record) in dataset.records.iter().enumerate() {
            // Bounded by XLSX_MAX_ROWS above.
            let row = row as u32 + 1;
            match column.cell(record) {
                CellValue::String(s) => worksheet.write_string(row, col, &s)?,
                CellValue::Integer(i) => worksheet.write_number(row, col, i as f64)?,
                CellValue::Float(f) => worksheet.write_number(row, col, f)?,
                CellValue::Bool(b) => worksheet.write_boolean(row, col, b)?,
                CellValue::Null => continue,
            };
        }
    }

    workbook.save_to_buffer().context("serializing workbook")
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
}

/// Narrowest Arrow type holding every non-null cell of a column.
fn infer_kind(cells: &[CellValue]) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for cell in cells {
        let this = match cell {
            CellValue::Null => continue,
            CellValue::Integer(_) => ColumnKind::Int,
            CellValue::Float(_) => ColumnKind::Float,
            CellValue::Bool(_) => ColumnKind::Bool,
            CellValue::String(_) => return ColumnKind::Text,
        };
        kind = Some(match (kind, this) {
            (None, k) => k,
            (Some(a), b) if a == b => a,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

fn column_array(cells: &[CellValue]) -> (DataType, ArrayRef) {
    match infer_kind(cells) {
        ColumnKind::Int => {
            let values: Int64Array = cells
                .iter()
                .map(|c| match c {
                    CellValue::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(values))
        }
        ColumnKind::Float => {
            let values: Float64Array = cells
                .iter()
                .map(|c| match c {
                    CellValue::Integer(i) => Some(*i as f64),
                    CellValue::Float(f) => Some(*f),
                    _ => None,
                })
                .collect();
            (DataType::Float64, Arc::new(values))
        }
        ColumnKind::Bool => {
            let values: BooleanArray = cells
                .iter()
                .map(|c| match c {
                    CellValue::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(values))
        }
        ColumnKind::Text => {
            let values: StringArray = cells.iter().map(|c| c.as_text()).collect();
            (DataType::Utf8, Arc::new(values))
        }
    }
}

pub fn write_parquet<W: Write + Send>(dataset: &StreamerDataset, out: W) -> Result<()> {
    let columns = export_columns(dataset);
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());

    for column in &columns {
        let cells: Vec<CellValue> = dataset.records.iter().map(|r| column.cell(r)).collect();
        let (data_type, array) = column_array(&cells);
        fields.push(Field::new(column.name(), data_type, true));
        arrays.push(array);
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let mut writer = ArrowWriter::try_new(out, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
