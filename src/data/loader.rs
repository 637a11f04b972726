use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, UInt32Type,
};
use calamine::{Data, Reader, open_workbook_auto};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::model::{RawTable, RawValue};

// ---------------------------------------------------------------------------
// Source description
// ---------------------------------------------------------------------------

/// Which rows of a source count as valid records.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowPredicate {
    /// Keep every row.
    Always,
    /// Keep rows where the column is not null (e.g. `Number`).
    NotNull(String),
    /// Keep rows where the column equals the flag value (e.g. `HomeLeisure == 1`).
    FlagEquals(String, i64),
}

impl RowPredicate {
    fn column(&self) -> Option<&str> {
        match self {
            RowPredicate::Always => None,
            RowPredicate::NotNull(col) | RowPredicate::FlagEquals(col, _) => Some(col),
        }
    }

    fn matches(&self, value: Option<&RawValue>) -> bool {
        match (self, value) {
            (RowPredicate::Always, _) => true,
            (RowPredicate::NotNull(_), Some(v)) => !v.is_null(),
            (RowPredicate::FlagEquals(_, flag), Some(v)) => v.as_f64() == Some(*flag as f64),
            (_, None) => false,
        }
    }
}

/// A source file, the columns to keep and the validity predicate.
///
/// Also the cache key of [`super::store::DataStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadSpec {
    pub path: PathBuf,
    /// Worksheet for spreadsheet sources; the first sheet when `None`.
    pub sheet: Option<String>,
    /// Columns to keep, in output order. Empty keeps every column.
    pub columns: Vec<String>,
    pub predicate: RowPredicate,
}

impl LoadSpec {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
            columns: Vec::new(),
            predicate: RowPredicate::Always,
        }
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_predicate(mut self, predicate: RowPredicate) -> Self {
        self.predicate = predicate;
        self
    }
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load a source, drop invalid rows and keep only the requested columns.
///
/// A missing file or a missing required column is an error; there is no
/// fallback.
pub fn load_source(spec: &LoadSpec) -> Result<RawTable> {
    let table = match spec.sheet.as_deref() {
        Some(sheet) => load_file_sheet(&spec.path, Some(sheet)),
        None => load_file(&spec.path),
    }
    .with_context(|| format!("loading {}", spec.path.display()))?;

    let keep: Vec<String> = if spec.columns.is_empty() {
        table.columns.clone()
    } else {
        spec.columns.clone()
    };

    let mut keep_idx = Vec::with_capacity(keep.len());
    for col in &keep {
        let idx = table
            .column_index(col)
            .with_context(|| format!("{}: missing required column '{col}'", spec.path.display()))?;
        keep_idx.push(idx);
    }

    let predicate_idx = match spec.predicate.column() {
        Some(col) => Some(table.column_index(col).with_context(|| {
            format!("{}: missing predicate column '{col}'", spec.path.display())
        })?),
        None => None,
    };

    let total = table.len();
    let mut out = RawTable::new(keep);
    for row in table.rows {
        let flag = predicate_idx.and_then(|i| row.get(i));
        if predicate_idx.is_some() && !spec.predicate.matches(flag) {
            continue;
        }
        let projected = keep_idx
            .iter()
            .map(|&i| row.get(i).cloned().unwrap_or(RawValue::Null))
            .collect();
        out.rows.push(projected);
    }

    log::info!(
        "Loaded {} of {} rows from {} ({:?})",
        out.len(),
        total,
        spec.path.display(),
        spec.predicate
    );
    Ok(out)
}

/// Load a whole table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`              – header row, comma-delimited
/// * `.parquet` / `.pq`  – flat columns (strings, ints, floats, bools)
/// * `.xlsx` / `.xlsm` / `.xls` – first sheet, first row is the header
pub fn load_file(path: &Path) -> Result<RawTable> {
    load_file_sheet(path, None)
}

/// Like [`load_file`], reading the named worksheet of a spreadsheet.
fn load_file_sheet(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_csv(path),
        "parquet" | "pq" => load_parquet(path),
        "xlsx" | "xlsm" | "xls" => load_spreadsheet(path, sheet),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut table = RawTable::new(headers);
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        table.rows.push(record.iter().map(guess_value_type).collect());
    }
    Ok(table)
}

/// Cell texts read as missing values.
fn is_null_marker(s: &str) -> bool {
    matches!(
        s,
        "#N/A"
            | "#N/A N/A"
            | "#NA"
            | "-1.#IND"
            | "-1.#QNAN"
            | "-NaN"
            | "-nan"
            | "1.#IND"
            | "1.#QNAN"
            | "<NA>"
            | "N/A"
            | "NA"
            | "NULL"
            | "NaN"
            | "None"
            | "n/a"
            | "nan"
            | "null"
    )
}

fn guess_value_type(s: &str) -> RawValue {
    let s = s.trim();
    if s.is_empty() || is_null_marker(s) {
        return RawValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return RawValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return RawValue::Float(f);
    }
    match s {
        "True" | "true" => RawValue::Bool(true),
        "False" | "false" => RawValue::Bool(false),
        _ => RawValue::Text(s.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with flat columns (MDS extracts, `generate_sample`).
/// Nested or unsupported column types are read as their type name.
fn load_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let columns: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut table = RawTable::new(columns);
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let values = batch
                .columns()
                .iter()
                .map(|col| extract_value(col, row))
                .collect();
            table.rows.push(values);
        }
    }
    Ok(table)
}

/// Extract a single value from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> RawValue {
    if col.is_null(row) {
        return RawValue::Null;
    }
    let value = match col.data_type() {
        DataType::Utf8 => col
            .as_string_opt::<i32>()
            .map(|s| RawValue::Text(s.value(row).to_string())),
        DataType::LargeUtf8 => col
            .as_string_opt::<i64>()
            .map(|s| RawValue::Text(s.value(row).to_string())),
        DataType::Int16 => col
            .as_primitive_opt::<Int16Type>()
            .map(|a| RawValue::Integer(a.value(row) as i64)),
        DataType::Int32 => col
            .as_primitive_opt::<Int32Type>()
            .map(|a| RawValue::Integer(a.value(row) as i64)),
        DataType::Int64 => col
            .as_primitive_opt::<Int64Type>()
            .map(|a| RawValue::Integer(a.value(row))),
        DataType::UInt32 => col
            .as_primitive_opt::<UInt32Type>()
            .map(|a| RawValue::Integer(a.value(row) as i64)),
        DataType::Float32 => col
            .as_primitive_opt::<Float32Type>()
            .map(|a| RawValue::Float(a.value(row) as f64)),
        DataType::Float64 => col
            .as_primitive_opt::<Float64Type>()
            .map(|a| RawValue::Float(a.value(row))),
        DataType::Boolean => col.as_boolean_opt().map(|a| RawValue::Bool(a.value(row))),
        other => Some(RawValue::Text(format!("{other:?}"))),
    };
    value.unwrap_or(RawValue::Null)
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

fn load_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .context("Workbook contains no sheets")?,
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("reading sheet '{sheet_name}'"))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .with_context(|| format!("sheet '{sheet_name}' is empty"))?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let mut table = RawTable::new(headers);
    for row in rows {
        table.rows.push(row.iter().map(cell_to_value).collect());
    }
    Ok(table)
}

fn cell_to_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Null,
        Data::String(s) => guess_value_type(s),
        Data::Float(f) => RawValue::Float(*f),
        Data::Int(i) => RawValue::Integer(*i),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::Error(_) => RawValue::Null,
        Data::DateTime(dt) => RawValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
    }
}
