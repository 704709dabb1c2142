//! Store-agnostic parameter and row representation.
//!
//! The gateway speaks `(sql, positional params) -> rows` so the same
//! repositories run against Postgres and against test executors.

use jobtrail_core::error::CoreError;
use jobtrail_core::types::{DbId, Timestamp};

/// A single positional parameter or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
    Bool(bool),
    Timestamp(Timestamp),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Timestamp> for SqlValue {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

/// One decoded result row, columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.push(name, value.into());
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: SqlValue) {
        self.columns.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    fn require(&self, name: &str) -> Result<&SqlValue, CoreError> {
        self.get(name)
            .ok_or_else(|| CoreError::Internal(format!("Missing column '{name}' in result row")))
    }

    pub fn get_i64(&self, name: &str) -> Result<DbId, CoreError> {
        match self.require(name)? {
            SqlValue::Int(v) => Ok(*v),
            other => Err(type_mismatch(name, "integer", other)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<&str, CoreError> {
        match self.require(name)? {
            SqlValue::Text(v) => Ok(v),
            other => Err(type_mismatch(name, "text", other)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, CoreError> {
        match self.require(name)? {
            SqlValue::Bool(v) => Ok(*v),
            other => Err(type_mismatch(name, "boolean", other)),
        }
    }

    pub fn get_timestamp(&self, name: &str) -> Result<Timestamp, CoreError> {
        match self.require(name)? {
            SqlValue::Timestamp(v) => Ok(*v),
            other => Err(type_mismatch(name, "timestamp", other)),
        }
    }
}

fn type_mismatch(name: &str, expected: &str, found: &SqlValue) -> CoreError {
    CoreError::Internal(format!(
        "Column '{name}' expected {expected}, found {found:?}"
    ))
}

/// Result of one statement.
///
/// For row-returning statements `row_count == rows.len()`; for plain
/// `UPDATE`/`DELETE` it is the number of affected rows and `rows` is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub row_count: u64,
}

impl RowSet {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    pub fn affected(row_count: u64) -> Self {
        Self {
            rows: Vec::new(),
            row_count,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }
}
