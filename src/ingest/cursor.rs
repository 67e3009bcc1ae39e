//! Row sources for index builds

use std::collections::BTreeMap;
use std::io::BufRead;

use serde_json::Value;
use thiserror::Error;

/// Failure reading from a record source
pub type CursorError = Box<dyn std::error::Error + Send + Sync>;

/// A raw column value as the source delivered it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordValue {
    Null,
    Integer(i64),
    Text(String),
}

impl From<i64> for RecordValue {
    fn from(v: i64) -> Self {
        RecordValue::Integer(v)
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::Text(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::Text(s)
    }
}

/// One source row: column name to value
pub type Record = BTreeMap<String, RecordValue>;

/// Forward-only source of records.
///
/// `Ok(None)` marks the end of the rows; `Err` is a read failure.
pub trait RecordCursor {
    fn next_record(&mut self) -> Result<Option<Record>, CursorError>;
}

impl<C: RecordCursor + ?Sized> RecordCursor for &mut C {
    fn next_record(&mut self) -> Result<Option<Record>, CursorError> {
        (**self).next_record()
    }
}

/// Cursor over records held in memory
#[derive(Debug, Default)]
pub struct VecCursor {
    records: std::vec::IntoIter<Record>,
}

impl VecCursor {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

impl RecordCursor for VecCursor {
    fn next_record(&mut self) -> Result<Option<Record>, CursorError> {
        Ok(self.records.next())
    }
}

/// Line-level decode failure of a JSON-lines source
#[derive(Debug, Error)]
#[error("line {line}: {reason}")]
pub struct JsonLineError {
    pub line: u64,
    pub reason: String,
}

/// Cursor over a JSON-lines stream, one object per line.
///
/// Integers become `Integer`, strings `Text`, null `Null`. Booleans and
/// floats are kept as their JSON text; nested values as compact JSON.
/// Blank lines are skipped.
pub struct JsonLinesCursor<R> {
    reader: R,
    line: u64,
    buf: String,
}

impl<R: BufRead> JsonLinesCursor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Lines consumed so far
    pub fn line(&self) -> u64 {
        self.line
    }
}

impl<R: BufRead> RecordCursor for JsonLinesCursor<R> {
    fn next_record(&mut self) -> Result<Option<Record>, CursorError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(text).map_err(|e| JsonLineError {
                line: self.line,
                reason: e.to_string(),
            })?;
            let object = match value {
                Value::Object(object) => object,
                other => {
                    return Err(Box::new(JsonLineError {
                        line: self.line,
                        reason: format!("expected a JSON object, found {}", json_kind(&other)),
                    }))
                }
            };

            let record = object
                .into_iter()
                .map(|(column, value)| (column, record_value(value)))
                .collect();
            return Ok(Some(record));
        }
    }
}

fn record_value(value: Value) -> RecordValue {
    match value {
        Value::Null => RecordValue::Null,
        Value::String(s) => RecordValue::Text(s),
        Value::Number(n) => match n.as_i64() {
            Some(v) => RecordValue::Integer(v),
            None => RecordValue::Text(n.to_string()),
        },
        Value::Bool(b) => RecordValue::Text(b.to_string()),
        other => RecordValue::Text(other.to_string()),
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
