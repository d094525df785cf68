//! Tabular Dataset Model and CSV Loading

use crate::error::ProfileError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Reserved column holding the outcome to predict
pub const EVENT_LABEL: &str = "EVENT_LABEL";

/// Reserved column holding the event time
pub const EVENT_TIMESTAMP: &str = "EVENT_TIMESTAMP";

/// Cell contents treated as missing when loading CSV
const NULL_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// Effective type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    Integer,
    Float,
    Boolean,
    Timestamp,
    Text,
}

impl Dtype {
    /// Integer or floating point
    pub fn is_numeric(self) -> bool {
        matches!(self, Dtype::Integer | Dtype::Float)
    }

    /// Free-form text
    pub fn is_text(self) -> bool {
        matches!(self, Dtype::Text)
    }

    /// Storage-type name as data frame tooling prints it
    pub fn as_str(self) -> &'static str {
        match self {
            Dtype::Integer => "int64",
            Dtype::Float => "float64",
            Dtype::Boolean => "bool",
            Dtype::Timestamp => "datetime64",
            Dtype::Text => "object",
        }
    }
}

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Hashable identity used for distinct counting; `None` for nulls
    fn distinct_key(&self) -> Option<DistinctKey<'_>> {
        match self {
            Value::Null => None,
            Value::Integer(v) => Some(DistinctKey::Integer(*v)),
            // -0.0 and 0.0 are the same value
            Value::Float(v) => Some(DistinctKey::Float(if *v == 0.0 { 0 } else { v.to_bits() })),
            Value::Boolean(v) => Some(DistinctKey::Boolean(*v)),
            Value::Timestamp(v) => Some(DistinctKey::Timestamp(*v)),
            Value::Text(v) => Some(DistinctKey::Text(v)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Boolean(true) => f.write_str("True"),
            Value::Boolean(false) => f.write_str("False"),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Text(v) => f.write_str(v),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
enum DistinctKey<'a> {
    Integer(i64),
    Float(u64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Text(&'a str),
}

/// A named column of homogeneous values
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    dtype: Dtype,
    values: Vec<Value>,
    /// Cell text as loaded; `None` for missing cells
    raw: Vec<Option<String>>,
}

impl Column {
    /// Create a column from already-typed values
    pub fn new(name: impl Into<String>, dtype: Dtype, values: Vec<Value>) -> Self {
        let raw = values
            .iter()
            .map(|v| (!v.is_null()).then(|| v.to_string()))
            .collect();
        Self {
            name: name.into(),
            dtype,
            values,
            raw,
        }
    }

    /// Create a column from raw text cells, inferring the dtype
    pub fn from_raw<S: AsRef<str>>(name: impl Into<String>, cells: &[S]) -> Self {
        let cells: Vec<Option<&str>> = cells
            .iter()
            .map(|c| {
                let c = c.as_ref().trim();
                if NULL_MARKERS.contains(&c) {
                    None
                } else {
                    Some(c)
                }
            })
            .collect();

        let dtype = infer_dtype(&cells);
        let values = cells
            .iter()
            .map(|cell| match cell {
                None => Value::Null,
                Some(raw) => parse_as(raw, dtype),
            })
            .collect();

        Self {
            name: name.into(),
            dtype,
            values,
            raw: cells.iter().map(|c| c.map(str::to_string)).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Cell text exactly as it appears in the source, trimmed
    pub fn raw_values(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        self.raw.iter().map(Option::as_deref)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of missing cells
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Number of distinct non-null values
    pub fn unique_count(&self) -> usize {
        self.values
            .iter()
            .filter_map(Value::distinct_key)
            .collect::<HashSet<_>>()
            .len()
    }
}

fn infer_dtype(cells: &[Option<&str>]) -> Dtype {
    let present: Vec<&str> = cells.iter().flatten().copied().collect();

    // An all-missing column behaves like an empty float column
    if present.is_empty() {
        return Dtype::Float;
    }
    if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        Dtype::Integer
    } else if present.iter().all(|c| c.parse::<f64>().is_ok()) {
        Dtype::Float
    } else if present.iter().all(|c| parse_bool(c).is_some()) {
        Dtype::Boolean
    } else if present.iter().all(|c| parse_timestamp(c).is_some()) {
        Dtype::Timestamp
    } else {
        Dtype::Text
    }
}

fn parse_as(raw: &str, dtype: Dtype) -> Value {
    let parsed = match dtype {
        Dtype::Integer => raw.parse().ok().map(Value::Integer),
        Dtype::Float => raw.parse().ok().map(Value::Float),
        Dtype::Boolean => parse_bool(raw).map(Value::Boolean),
        Dtype::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
        Dtype::Text => None,
    };
    parsed.unwrap_or_else(|| Value::Text(raw.to_string()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A table of equally long, uniquely named columns
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Assemble a dataset, checking column lengths and name uniqueness
    pub fn new(columns: Vec<Column>) -> Result<Self, ProfileError> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != row_count {
                return Err(ProfileError::InvalidShape(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name(),
                    column.len(),
                    row_count
                )));
            }
            if !seen.insert(column.name()) {
                return Err(ProfileError::InvalidShape(format!(
                    "duplicate column '{}'",
                    column.name()
                )));
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Load a dataset from CSV with a header row
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, ProfileError> {
        let mut csv = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let headers: Vec<String> = csv.headers()?.iter().map(str::to_string).collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in csv.records() {
            let record = record?;
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column::from_raw(name, &raw))
            .collect();
        let dataset = Self::new(columns)?;

        debug!(
            "Loaded dataset: {} rows x {} columns",
            dataset.row_count,
            dataset.columns.len()
        );
        Ok(dataset)
    }

    /// Load a dataset from a CSV file
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}
