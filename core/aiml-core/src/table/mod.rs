//! In-memory tabular payload used by workspace entries and project datasets.
//!
//! A [`Table`] is a column-labelled grid of JSON values with a row index,
//! mirroring the "split" orientation used on disk:
//!
//! ```json
//! { "columns": ["a", "b"], "data": [[1, "x"], [2, "y"]], "index": [0, 1] }
//! ```
//!
//! Tables are plain values. Registries copy them in on insert and out on read,
//! so a caller never holds an alias into stored state.

pub mod io;
pub mod query;
pub mod select;

use crate::error::{AimlError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Split-orientation frame: column labels, row-major data, row index labels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SplitFrame {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Value>>,
    #[serde(default)]
    pub index: Vec<Value>,
}

/// Serialized payload: split frame plus the dtype hints needed to restore it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TablePayload {
    pub data: SplitFrame,
    #[serde(default)]
    pub dtypes: BTreeMap<String, String>,
    #[serde(default)]
    pub index_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    index: Vec<Value>,
    data: Vec<Vec<Value>>,
    index_name: Option<String>,
}

impl Table {
    // ─────────────────────────────────────────────────────────────────────────────
    // Construction
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates an empty table with the given column labels.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Builds a table from `(label, values)` pairs. All columns must have the same length.
    pub fn from_columns<S: Into<String>>(
        columns: impl IntoIterator<Item = (S, Vec<Value>)>,
    ) -> Result<Self> {
        let (labels, values): (Vec<String>, Vec<Vec<Value>>) = columns
            .into_iter()
            .map(|(label, values)| (label.into(), values))
            .unzip();

        let n_rows = values.first().map_or(0, Vec::len);
        if let Some((pos, col)) = values.iter().enumerate().find(|(_, c)| c.len() != n_rows) {
            return Err(AimlError::ShapeMismatch(format!(
                "column '{}' has {} values, expected {}",
                labels[pos],
                col.len(),
                n_rows
            )));
        }

        let mut columns = values.into_iter().map(Vec::into_iter).collect::<Vec<_>>();
        let data = (0..n_rows)
            .map(|_| {
                columns
                    .iter_mut()
                    .map(|c| c.next().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(Self {
            columns: labels,
            index: default_index(n_rows),
            data,
            index_name: None,
        })
    }

    /// Builds a table from row-major data. Every row must have one value per column.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        check_rows(&columns, &rows)?;
        Ok(Self {
            index: default_index(rows.len()),
            columns,
            data: rows,
            index_name: None,
        })
    }

    /// Rebuilds a table from its split orientation. An empty index means `0..n`.
    pub fn from_split(frame: SplitFrame) -> Result<Self> {
        check_rows(&frame.columns, &frame.data)?;
        let index = if frame.index.is_empty() {
            default_index(frame.data.len())
        } else if frame.index.len() == frame.data.len() {
            frame.index
        } else {
            return Err(AimlError::ShapeMismatch(format!(
                "index has {} labels for {} rows",
                frame.index.len(),
                frame.data.len()
            )));
        };
        Ok(Self {
            columns: frame.columns,
            index,
            data: frame.data,
            index_name: None,
        })
    }

    /// Restores a table from a payload, re-applying dtype hints and the index name.
    pub fn from_payload(payload: TablePayload) -> Result<Self> {
        let mut table = Self::from_split(payload.data)?;
        table.coerce_dtypes(&payload.dtypes);
        table.index_name = payload.index_name;
        Ok(table)
    }

    pub fn to_split(&self) -> SplitFrame {
        SplitFrame {
            columns: self.columns.clone(),
            data: self.data.clone(),
            index: self.index.clone(),
        }
    }

    pub fn to_payload(&self) -> TablePayload {
        TablePayload {
            data: self.to_split(),
            dtypes: self.dtypes(),
            index_name: self.index_name.clone(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn n_rows(&self) -> usize {
        self.data.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let pos = self.column_position(name)?;
        Some(self.data.iter().map(|row| &row[pos]).collect())
    }

    pub fn row(&self, position: usize) -> Option<&[Value]> {
        self.data.get(position).map(Vec::as_slice)
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.data
    }

    pub fn cell(&self, position: usize, column: &str) -> Option<&Value> {
        let col = self.column_position(column)?;
        self.data.get(position).map(|row| &row[col])
    }

    pub fn index(&self) -> &[Value] {
        &self.index
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn set_index_name(&mut self, name: Option<String>) {
        self.index_name = name;
    }

    /// Overwrites one cell. Returns `false` when the position or column is unknown.
    pub fn set_cell(&mut self, position: usize, column: &str, value: Value) -> bool {
        match (self.column_position(column), self.data.get_mut(position)) {
            (Some(col), Some(row)) => {
                row[col] = value;
                true
            }
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Footprint & dtypes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Deterministic estimate of the table's in-memory footprint in bytes.
    ///
    /// Numeric and null cells count 8 bytes, booleans 1, strings their UTF-8
    /// length plus 8, nested values their serialized length. Each index label
    /// counts 8 bytes.
    pub fn memory_usage_bytes(&self) -> u64 {
        let cells: u64 = self
            .data
            .iter()
            .flat_map(|row| row.iter())
            .map(value_footprint)
            .sum();
        cells + 8 * self.index.len() as u64
    }

    /// Inferred dtype per column: `int64`, `float64`, `bool` or `object`.
    pub fn dtypes(&self) -> BTreeMap<String, String> {
        self.columns
            .iter()
            .enumerate()
            .map(|(pos, name)| {
                let dtype = infer_dtype(self.data.iter().map(|row| &row[pos]));
                (name.clone(), dtype.to_string())
            })
            .collect()
    }

    /// Re-applies dtype hints from a snapshot.
    ///
    /// Integer, float and bool columns are converted cell by cell; cells that
    /// cannot be converted become null. `category`, `datetime` and `object`
    /// hints leave the column untouched.
    pub fn coerce_dtypes(&mut self, dtypes: &BTreeMap<String, String>) {
        for (column, dtype) in dtypes {
            let Some(pos) = self.column_position(column) else {
                continue;
            };
            let dtype = dtype.to_lowercase();
            let convert: fn(&Value) -> Value = if dtype.contains("category") {
                continue;
            } else if dtype.contains("int") {
                to_int
            } else if dtype.contains("float") {
                to_float
            } else if dtype.contains("bool") {
                |v| Value::Bool(truthy(v))
            } else {
                continue;
            };
            for row in &mut self.data {
                row[pos] = convert(&row[pos]);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transformations
    // ─────────────────────────────────────────────────────────────────────────────

    /// Returns the rows at the given positions, in order, keeping their index labels.
    pub fn take_rows(&self, positions: &[usize]) -> Result<Table> {
        if let Some(&bad) = positions.iter().find(|&&p| p >= self.data.len()) {
            return Err(AimlError::InvalidRowSelection(format!(
                "position {} is out of bounds for {} rows",
                bad,
                self.data.len()
            )));
        }
        Ok(Table {
            columns: self.columns.clone(),
            index: positions.iter().map(|&p| self.index[p].clone()).collect(),
            data: positions.iter().map(|&p| self.data[p].clone()).collect(),
            index_name: self.index_name.clone(),
        })
    }

    /// Stable multi-column sort. `ascending` is matched to `by` positionally;
    /// missing entries default to ascending. Nulls sort last in either direction.
    pub fn sort_by(&self, by: &[String], ascending: &[bool]) -> Result<Table> {
        let keys = by
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let pos = self
                    .column_position(name)
                    .ok_or_else(|| AimlError::ColumnNotFound(name.clone()))?;
                Ok((pos, ascending.get(i).copied().unwrap_or(true)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut order: Vec<usize> = (0..self.data.len()).collect();
        order.sort_by(|&a, &b| {
            keys.iter()
                .map(|&(col, asc)| compare_for_sort(&self.data[a][col], &self.data[b][col], asc))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        self.take_rows(&order)
    }

    /// Keeps the rows for which `expr` holds. See [`query`] for the syntax.
    pub fn query(&self, expr: &str) -> Result<Table> {
        query::filter(self, expr)
    }

    /// Selects rows by a `a:b`, `a,b,c` or `n` specification. See [`select`].
    pub fn select_rows(&self, selection: &str) -> Result<Table> {
        let positions = select::parse_row_selection(selection, self.n_rows())?;
        self.take_rows(&positions)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Value helpers
// ─────────────────────────────────────────────────────────────────────────────

fn default_index(n: usize) -> Vec<Value> {
    (0..n).map(|i| Value::from(i as u64)).collect()
}

fn check_rows(columns: &[String], rows: &[Vec<Value>]) -> Result<()> {
    match rows.iter().position(|r| r.len() != columns.len()) {
        Some(pos) => Err(AimlError::ShapeMismatch(format!(
            "row {} has {} values, expected {}",
            pos,
            rows[pos].len(),
            columns.len()
        ))),
        None => Ok(()),
    }
}

fn value_footprint(value: &Value) -> u64 {
    match value {
        Value::Null | Value::Number(_) => 8,
        Value::Bool(_) => 1,
        Value::String(s) => s.len() as u64 + 8,
        other => other.to_string().len() as u64,
    }
}

fn infer_dtype<'a>(values: impl Iterator<Item = &'a Value>) -> &'static str {
    let mut seen_any = false;
    let mut all_int = true;
    let mut all_number = true;
    let mut all_bool = true;
    for value in values.filter(|v| !v.is_null()) {
        seen_any = true;
        all_int &= value.is_i64() || value.is_u64();
        all_number &= value.is_number();
        all_bool &= value.is_boolean();
    }
    match (seen_any, all_int, all_number, all_bool) {
        (false, ..) => "object",
        (true, true, _, _) => "int64",
        (true, _, true, _) => "float64",
        (true, _, _, true) => "bool",
        _ => "object",
    }
}

fn to_int(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => value.clone(),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| Value::from(f as i64))
            .unwrap_or(Value::Null),
        Value::Bool(b) => Value::from(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn to_float(value: &Value) -> Value {
    let f = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    f.and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Truthiness of a cell: null, false, zero and empty values are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) | Value::Object(_) => 4,
    }
}

/// Total order over cells: null < bool < number < string < nested.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i.cmp(&j),
            _ => x
                .as_f64()
                .unwrap_or(f64::NAN)
                .partial_cmp(&y.as_f64().unwrap_or(f64::NAN))
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match type_rank(a).cmp(&type_rank(b)) {
            Ordering::Equal => a.to_string().cmp(&b.to_string()),
            other => other,
        },
    }
}

fn compare_for_sort(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ if ascending => compare_values(a, b),
        _ => compare_values(b, a),
    }
}

/// Human-readable size string: B below 1 KiB, then KB/MB/GB with two decimals.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < KB * KB {
        format!("{:.2} KB", b / KB)
    } else if b < KB * KB * KB {
        format!("{:.2} MB", b / (KB * KB))
    } else {
        format!("{:.2} GB", b / (KB * KB * KB))
    }
}
