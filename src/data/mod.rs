//! Tabular data model
//!
//! A [`Dataset`] is an ordered list of [`Column`]s. Each column is typed once
//! at ingestion as either numeric or categorical ([`ColumnData`]) so later
//! stages never re-derive types from values.

mod loader;

pub use loader::{DataLoader, FileFormat, ParseMode};

use crate::error::{PipelineError, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Column names that are suggested as target when present (case-insensitive)
pub const TARGET_SYNONYMS: [&str; 5] = ["target", "label", "class", "y", "outcome"];

/// Text values treated as missing
const MISSING_MARKERS: [&str; 13] = [
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// A single decoded cell, before the owning column is typed
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number { value: f64, integer: bool },
    Bool(bool),
    Text(String),
}

impl Cell {
    fn normalized(self) -> Cell {
        match self {
            Cell::Text(s) if MISSING_MARKERS.contains(&s.trim()) => Cell::Missing,
            Cell::Number { value, .. } if value.is_nan() => Cell::Missing,
            other => other,
        }
    }

    fn as_number(&self) -> Option<(f64, bool)> {
        match self {
            Cell::Number { value, integer } => Some((*value, *integer)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Some((i as f64, true))
                } else {
                    trimmed.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| (v, false))
                }
            }
            _ => None,
        }
    }

    fn into_text(self) -> Option<String> {
        match self {
            Cell::Missing => None,
            Cell::Number { value, integer: true } => Some(format!("{}", value as i64)),
            Cell::Number { value, integer: false } => Some(format_float(value)),
            Cell::Bool(true) => Some("True".to_string()),
            Cell::Bool(false) => Some("False".to_string()),
            Cell::Text(s) => Some(s),
        }
    }
}

/// Typed column storage
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    /// Numeric values; `integer` holds when every value is an integer and none is missing
    Numeric { values: Vec<Option<f64>>, integer: bool },
    /// Any non-numeric column (text, booleans, dates), stored as strings
    Categorical(Vec<Option<String>>),
}

/// Named, typed column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        let integer = values
            .iter()
            .all(|v| v.map_or(false, |x| x.fract() == 0.0 && x.abs() < i64::MAX as f64));
        Self {
            name: name.into(),
            data: ColumnData::Numeric { values, integer },
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Categorical(values),
        }
    }

    /// Type a column from its decoded cells.
    ///
    /// The column is numeric when every non-missing cell is a number or text
    /// that parses as one; otherwise every cell is kept as text.
    pub fn from_cells(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let cells: Vec<Cell> = cells.into_iter().map(Cell::normalized).collect();

        let numeric: Option<Vec<Option<(f64, bool)>>> = cells
            .iter()
            .map(|c| match c {
                Cell::Missing => Some(None),
                other => other.as_number().map(Some),
            })
            .collect();

        match numeric {
            Some(parsed) => {
                let integer = parsed.iter().all(|v| matches!(v, Some((_, true))));
                Self {
                    name: name.into(),
                    data: ColumnData::Numeric {
                        values: parsed.into_iter().map(|v| v.map(|(x, _)| x)).collect(),
                        integer,
                    },
                }
            }
            None => Self::categorical(name, cells.into_iter().map(Cell::into_text).collect()),
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Numeric { values, .. } => values.len(),
            ColumnData::Categorical(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Numeric { .. })
    }

    pub fn is_missing(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Numeric { values, .. } => values[row].is_none(),
            ColumnData::Categorical(values) => values[row].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_missing(i)).count()
    }

    /// JSON rendering of one cell; missing values become `null`
    pub fn json_value(&self, row: usize) -> Value {
        match &self.data {
            ColumnData::Numeric { values, integer } => match values[row] {
                Some(v) if *integer => Value::from(v as i64),
                Some(v) => serde_json::Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
                None => Value::Null,
            },
            ColumnData::Categorical(values) => values[row]
                .as_ref()
                .map_or(Value::Null, |s| Value::String(s.clone())),
        }
    }

    /// Number of distinct non-missing values
    pub fn n_unique(&self) -> usize {
        match &self.data {
            ColumnData::Numeric { values, .. } => {
                let mut seen: Vec<f64> = values.iter().flatten().copied().collect();
                seen.sort_by(|a, b| a.total_cmp(b));
                seen.dedup();
                seen.len()
            }
            ColumnData::Categorical(values) => {
                let mut seen: Vec<&String> = values.iter().flatten().collect();
                seen.sort();
                seen.dedup();
                seen.len()
            }
        }
    }

    /// Column values as class labels, or `None` when any value is missing
    pub fn labels(&self) -> Option<Vec<Label>> {
        match &self.data {
            ColumnData::Numeric { values, integer } => values
                .iter()
                .map(|v| v.map(|x| if *integer { Label::Int(x as i64) } else { Label::Float(x) }))
                .collect(),
            ColumnData::Categorical(values) => {
                values.iter().map(|v| v.clone().map(Label::Text)).collect()
            }
        }
    }

    fn take_rows(&self, rows: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Numeric { values, integer } => ColumnData::Numeric {
                values: rows.iter().map(|&i| values[i]).collect(),
                integer: *integer,
            },
            ColumnData::Categorical(values) => {
                ColumnData::Categorical(rows.iter().map(|&i| values[i].clone()).collect())
            }
        };
        Column {
            name: self.name.clone(),
            data,
        }
    }
}

/// In-memory table with ordered, typed columns
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl Dataset {
    /// Build a dataset; every column must have the same length
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, Column::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != n_rows) {
            return Err(PipelineError::DataError(format!(
                "column '{}' has {} rows, expected {}",
                bad.name,
                bad.len(),
                n_rows
            )));
        }
        Ok(Self { columns, n_rows })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    /// First `limit` rows as records keyed by column name
    pub fn preview(&self, limit: usize) -> Vec<Map<String, Value>> {
        (0..self.n_rows.min(limit))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.json_value(row)))
                    .collect()
            })
            .collect()
    }

    /// Target column suggestion: first synonym match, else the last column
    pub fn suggested_target(&self) -> Option<String> {
        self.columns
            .iter()
            .find(|c| TARGET_SYNONYMS.contains(&c.name.to_lowercase().as_str()))
            .or_else(|| self.columns.last())
            .map(|c| c.name.clone())
    }

    /// Copy of the dataset without any row that has a missing value
    pub fn drop_missing_rows(&self) -> Dataset {
        let keep: Vec<usize> = (0..self.n_rows)
            .filter(|&row| self.columns.iter().all(|c| !c.is_missing(row)))
            .collect();
        self.take_rows(&keep)
    }

    pub fn take_rows(&self, rows: &[usize]) -> Dataset {
        Dataset {
            columns: self.columns.iter().map(|c| c.take_rows(rows)).collect(),
            n_rows: rows.len(),
        }
    }
}

/// Raw target value used as a class label.
///
/// Numeric labels order numerically and sort before text labels.
#[derive(Debug, Clone)]
pub enum Label {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Label {
    fn numeric(&self) -> Option<f64> {
        match self {
            Label::Int(i) => Some(*i as f64),
            Label::Float(f) => Some(*f),
            Label::Text(_) => None,
        }
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Label::Int(a), Label::Int(b)) => a.cmp(b),
            (Label::Text(a), Label::Text(b)) => a.cmp(b),
            (Label::Text(_), _) => Ordering::Greater,
            (_, Label::Text(_)) => Ordering::Less,
            (a, b) => match (a.numeric(), b.numeric()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => Ordering::Equal,
            },
        }
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Label {}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(i) => write!(f, "{}", i),
            Label::Float(v) => write!(f, "{}", format_float(*v)),
            Label::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Label::Int(i) => serializer.serialize_i64(*i),
            Label::Float(v) => serializer.serialize_f64(*v),
            Label::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Sorted distinct labels
pub fn distinct_labels(labels: &[Label]) -> Vec<Label> {
    let mut classes = labels.to_vec();
    classes.sort();
    classes.dedup();
    classes
}

/// Occurrences per distinct label, in label order
pub fn label_counts(labels: &[Label]) -> BTreeMap<Label, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(label.clone()).or_insert(0) += 1;
    }
    counts
}

/// Floats print with a trailing `.0` when integral, like `1.0`
pub(crate) fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}
