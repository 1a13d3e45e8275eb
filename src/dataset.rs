//! In-memory tabular data the assistant is briefed on.
//!
//! The assistant only needs a read-only view: column names, a row count,
//! descriptive statistics and a few sample rows. [`Table`] is the concrete
//! column store the CLI builds from a JSON records file.

use std::collections::HashSet;

use comfy_table::presets::NOTHING;
use comfy_table::{CellAlignment, ContentArrangement};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DatasetError;

/// Read-only view over a dataset, as consumed by the context builder.
pub trait DatasetView {
    fn column_names(&self) -> Vec<String>;

    fn row_count(&self) -> usize;

    /// Descriptive statistics of the numeric columns rendered as a text table.
    fn describe(&self) -> Result<String, DatasetError>;

    /// The first `n` rows rendered as a text table.
    fn head(&self, n: usize) -> String;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), data: ColumnData::Numeric(values) }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self { name: name.into(), data: ColumnData::Text(values) }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self.data {
            ColumnData::Numeric(_) => "float64",
            ColumnData::Text(_) => "object",
        }
    }

    fn cell(&self, row: usize) -> String {
        match &self.data {
            ColumnData::Numeric(values) => match values[row] {
                Some(v) if !v.is_nan() => v.to_string(),
                _ => "NaN".to_string(),
            },
            ColumnData::Text(values) => values[row].clone().unwrap_or_else(|| "None".to_string()),
        }
    }

    fn json_cell(&self, row: usize) -> Value {
        match &self.data {
            ColumnData::Numeric(values) => values[row]
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnData::Text(values) => values[row].clone().map(Value::String).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnType {
    pub name: String,
    pub dtype: String,
}

/// Shape and types of a table, plus a handful of rows.
#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub dtypes: Vec<ColumnType>,
    pub sample: Vec<Map<String, Value>>,
}

const SUMMARY_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Build a table; every column must have the same number of rows and a unique name.
    pub fn new(columns: Vec<Column>) -> Result<Self, DatasetError> {
        let rows = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();

        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DatasetError::DuplicateColumn(column.name.clone()));
            }
            if column.len() != rows {
                return Err(DatasetError::LengthMismatch {
                    column: column.name.clone(),
                    expected: rows,
                    actual: column.len(),
                });
            }
        }

        Ok(Self { columns, rows })
    }

    /// Parse a JSON array of flat objects.
    ///
    /// Columns appear in first-seen key order. A column is numeric when every
    /// non-null value in it is a JSON number; anything else is kept as text.
    pub fn from_json_records(json: &str) -> Result<Self, DatasetError> {
        let value: Value = serde_json::from_str(json)?;
        let records = match value {
            Value::Array(records) => records,
            other => return Err(DatasetError::NotRecords(format!("found {}", json_kind(&other)))),
        };

        let mut objects = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            match record {
                Value::Object(map) => objects.push(map),
                other => {
                    return Err(DatasetError::NotRecords(format!(
                        "record {} is {}",
                        i,
                        json_kind(&other)
                    )))
                }
            }
        }

        let mut names: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !names.contains(key) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let cells: Vec<Option<&Value>> = objects
                    .iter()
                    .map(|object| object.get(&name).filter(|v| !v.is_null()))
                    .collect();
                column_from_cells(name, cells)
            })
            .collect();

        Self::new(columns)
    }

    #[cfg(test)]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn summary(&self) -> DataSummary {
        let sample = (0..self.rows.min(SUMMARY_SAMPLE_ROWS))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.json_cell(row)))
                    .collect::<Map<String, Value>>()
            })
            .collect();

        DataSummary {
            rows: self.rows,
            columns: self.column_names(),
            dtypes: self
                .columns
                .iter()
                .map(|c| ColumnType { name: c.name.clone(), dtype: c.dtype().to_string() })
                .collect(),
            sample,
        }
    }
}

impl DatasetView for Table {
    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    fn row_count(&self) -> usize {
        self.rows
    }

    fn describe(&self) -> Result<String, DatasetError> {
        let numeric: Vec<(&str, ColumnStats)> = self
            .columns
            .iter()
            .filter_map(|c| match &c.data {
                ColumnData::Numeric(values) => Some((c.name.as_str(), ColumnStats::compute(values))),
                ColumnData::Text(_) => None,
            })
            .collect();

        if numeric.is_empty() {
            return Err(DatasetError::NoNumericColumns);
        }

        let mut header = vec![String::new()];
        header.extend(numeric.iter().map(|(name, _)| name.to_string()));

        let rows = ColumnStats::LABELS
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let mut row = vec![label.to_string()];
                row.extend(numeric.iter().map(|(_, stats)| format_stat(stats.values()[i])));
                row
            })
            .collect::<Vec<_>>();

        Ok(render_table(header, rows))
    }

    fn head(&self, n: usize) -> String {
        let mut header = vec![String::new()];
        header.extend(self.columns.iter().map(|c| c.name.clone()));

        let rows = (0..self.rows.min(n))
            .map(|row| {
                let mut cells = vec![row.to_string()];
                cells.extend(self.columns.iter().map(|c| c.cell(row)));
                cells
            })
            .collect::<Vec<_>>();

        render_table(header, rows)
    }
}

/// pandas-style `describe()` figures for one numeric column; nulls and NaN are skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnStats {
    count: f64,
    mean: f64,
    std: f64,
    min: f64,
    q25: f64,
    q50: f64,
    q75: f64,
    max: f64,
}

impl ColumnStats {
    const LABELS: [&'static str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

    fn compute(values: &[Option<f64>]) -> Self {
        let mut sorted: Vec<f64> = values.iter().flatten().copied().filter(|v| !v.is_nan()).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let mean = if n == 0 { f64::NAN } else { sorted.iter().sum::<f64>() / n as f64 };
        let std = if n < 2 {
            f64::NAN
        } else {
            let sum_sq: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
            (sum_sq / (n - 1) as f64).sqrt()
        };

        Self {
            count: n as f64,
            mean,
            std,
            min: sorted.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&sorted, 0.25),
            q50: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }

    fn values(&self) -> [f64; 8] {
        [self.count, self.mean, self.std, self.min, self.q25, self.q50, self.q75, self.max]
    }
}

/// Linear interpolation between closest ranks; `sorted` must be ascending.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn format_stat(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.6}", value)
    }
}

/// Borderless, right-aligned text table in the spirit of pandas' `to_string()`.
fn render_table(header: Vec<String>, rows: Vec<Vec<String>>) -> String {
    let mut table = comfy_table::Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(header);

    for row in rows {
        table.add_row(row);
    }
    for column in table.column_iter_mut() {
        column.set_cell_alignment(CellAlignment::Right);
    }

    table.to_string()
}

fn column_from_cells(name: String, cells: Vec<Option<&Value>>) -> Column {
    let has_values = cells.iter().any(Option::is_some);
    let all_numeric = cells.iter().flatten().all(|v| v.is_number());

    if has_values && all_numeric {
        Column::numeric(name, cells.into_iter().map(|c| c.and_then(Value::as_f64)).collect())
    } else {
        let values = cells
            .into_iter()
            .map(|c| {
                c.map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
            .collect();
        Column::text(name, values)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
