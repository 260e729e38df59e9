//! CSV, JSON and binary codecs for [`Table`].

use super::{SplitFrame, Table, TablePayload};
use crate::binary::{self, BinaryKind};
use crate::error::{AimlError, Result};
use serde_json::{Map, Number, Value};

fn csv_error(context: &str, source: csv::Error) -> AimlError {
    AimlError::Csv {
        context: context.to_string(),
        source,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CSV
// ─────────────────────────────────────────────────────────────────────────────

/// Parses a CSV document with a header row.
///
/// Cells are typed as integer, float, boolean (`True`/`true`/`TRUE` and the
/// `False` forms), null (empty or `nan`) or string, in that order.
pub fn read_csv(bytes: &[u8]) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error("reading CSV header", e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error("reading CSV record", e))?;
        rows.push(record.iter().map(parse_cell).collect());
    }
    Table::from_rows(columns, rows)
}

fn parse_cell(text: &str) -> Value {
    if text.is_empty() || text.eq_ignore_ascii_case("nan") {
        return Value::Null;
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }
    if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    match text {
        "True" | "true" | "TRUE" => Value::Bool(true),
        "False" | "false" | "FALSE" => Value::Bool(false),
        _ => Value::String(text.to_string()),
    }
}

/// Writes the header and rows without the index column.
pub fn write_csv(table: &Table) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(table.column_names())
        .map_err(|e| csv_error("writing CSV header", e))?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(render_cell))
            .map_err(|e| csv_error("writing CSV record", e))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AimlError::io("flushing CSV writer", e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| AimlError::InvalidUpload(format!("CSV output is not UTF-8: {}", e)))
}

fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON
// ─────────────────────────────────────────────────────────────────────────────

/// Parses the JSON table layouts produced by common exporters:
///
/// * records: `[{"a": 1, "b": 2}, ...]`
/// * values: `[[1, 2], ...]` (columns named `0`, `1`, ...)
/// * split: `{"columns": [...], "data": [[...]], "index": [...]}`
/// * columns: `{"a": [1, 2]}` or `{"a": {"0": 1, "1": 2}}`
pub fn read_json(bytes: &[u8]) -> Result<Table> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| AimlError::json("parsing JSON table", e))?;
    match value {
        Value::Array(items) => from_array(items),
        Value::Object(map) if map.contains_key("columns") && map.contains_key("data") => {
            let frame: SplitFrame = serde_json::from_value(Value::Object(map))
                .map_err(|e| AimlError::json("parsing split-oriented JSON", e))?;
            Table::from_split(frame)
        }
        Value::Object(map) => from_column_object(map),
        other => Err(AimlError::InvalidUpload(format!(
            "expected a JSON array or object, found {}",
            other
        ))),
    }
}

fn from_array(items: Vec<Value>) -> Result<Table> {
    if items.iter().all(Value::is_object) {
        let mut columns: Vec<String> = Vec::new();
        for item in &items {
            if let Value::Object(record) = item {
                for key in record.keys() {
                    if !columns.contains(key) {
                        columns.push(key.clone());
                    }
                }
            }
        }
        let rows = items
            .iter()
            .map(|item| {
                columns
                    .iter()
                    .map(|col| item.get(col).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        return Table::from_rows(columns, rows);
    }

    if items.iter().all(Value::is_array) {
        let rows: Vec<Vec<Value>> = items
            .into_iter()
            .filter_map(|item| match item {
                Value::Array(row) => Some(row),
                _ => None,
            })
            .collect();
        let width = rows.first().map_or(0, Vec::len);
        return Table::from_rows((0..width).map(|i| i.to_string()), rows);
    }

    Err(AimlError::InvalidUpload(
        "JSON array must contain only records or only rows".to_string(),
    ))
}

fn from_column_object(map: Map<String, Value>) -> Result<Table> {
    let index_labels: Option<Vec<String>> = map.values().find_map(|v| match v {
        Value::Object(cells) => Some(cells.keys().cloned().collect()),
        _ => None,
    });

    let mut columns = Vec::with_capacity(map.len());
    for (name, values) in map {
        let values = match (values, &index_labels) {
            (Value::Array(values), _) => values,
            (Value::Object(cells), Some(labels)) => labels
                .iter()
                .map(|label| cells.get(label).cloned().unwrap_or(Value::Null))
                .collect(),
            (other, _) => {
                return Err(AimlError::InvalidUpload(format!(
                    "column '{}' must be an array or an object, found {}",
                    name, other
                )))
            }
        };
        columns.push((name, values));
    }

    let table = Table::from_columns(columns)?;
    match index_labels {
        Some(labels) => Table::from_split(SplitFrame {
            index: labels.iter().map(|l| index_label(l)).collect(),
            ..table.to_split()
        }),
        None => Ok(table),
    }
}

fn index_label(label: &str) -> Value {
    label
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(label.to_string()))
}

/// Pretty-printed array of records, one object per row.
pub fn write_json_records(table: &Table) -> Result<String> {
    let records: Vec<Value> = table
        .rows()
        .iter()
        .map(|row| {
            Value::Object(
                table
                    .column_names()
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect(),
            )
        })
        .collect();
    serde_json::to_string_pretty(&records).map_err(|e| AimlError::json("writing JSON records", e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Binary
// ─────────────────────────────────────────────────────────────────────────────

pub fn write_binary(table: &Table) -> Result<Vec<u8>> {
    binary::encode(BinaryKind::Table, &table.to_payload())
}

pub fn read_binary(bytes: &[u8]) -> Result<Table> {
    let payload: TablePayload = binary::decode(BinaryKind::Table, bytes)?;
    Table::from_payload(payload)
}
