//! Record store abstraction.
//!
//! All durable state goes through [`RecordStore`]: create/read/update/delete
//! against one of the three tables, filtered by a conjunction of exact-match
//! or IS-NULL tests. No range queries -- day scoping is done with a dedicated
//! `created_day` column so "today" stays an equality test.

use std::collections::HashMap;

use crate::error::StoreError;

/// Tables known to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Users,
    Timers,
    Sessions,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Timers => "timers",
            Table::Sessions => "sessions",
        }
    }
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Real(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Option<i64>> for Value {
    fn from(n: Option<i64>) -> Self {
        n.map(Value::Integer).unwrap_or(Value::Null)
    }
}

impl From<Option<String>> for Value {
    fn from(s: Option<String>) -> Self {
        s.map(Value::Text).unwrap_or(Value::Null)
    }
}

/// One test within a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTest {
    Eq(Value),
    IsNull,
}

/// Conjunction of field tests. An empty predicate matches every row.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    tests: Vec<(&'static str, FieldTest)>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.tests.push((field, FieldTest::Eq(value.into())));
        self
    }

    pub fn is_null(mut self, field: &'static str) -> Self {
        self.tests.push((field, FieldTest::IsNull));
        self
    }

    pub fn tests(&self) -> &[(&'static str, FieldTest)] {
        &self.tests
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// A row read back from the store: its id plus a column/value map.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: i64,
    fields: HashMap<String, Value>,
}

impl Row {
    pub fn new(id: i64, fields: HashMap<String, Value>) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Required integer column.
    pub fn i64_field(&self, field: &'static str) -> Result<i64, StoreError> {
        match self.fields.get(field) {
            Some(Value::Integer(n)) => Ok(*n),
            Some(other) => Err(StoreError::BadValue {
                column: field,
                message: format!("expected integer, got {other:?}"),
            }),
            None => Err(StoreError::MissingColumn { column: field }),
        }
    }

    /// Optional integer column (NULL decodes to None).
    pub fn opt_i64_field(&self, field: &'static str) -> Result<Option<i64>, StoreError> {
        match self.fields.get(field) {
            Some(Value::Integer(n)) => Ok(Some(*n)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(StoreError::BadValue {
                column: field,
                message: format!("expected integer, got {other:?}"),
            }),
        }
    }

    /// Required text column.
    pub fn text_field(&self, field: &'static str) -> Result<&str, StoreError> {
        match self.fields.get(field) {
            Some(Value::Text(s)) => Ok(s),
            Some(other) => Err(StoreError::BadValue {
                column: field,
                message: format!("expected text, got {other:?}"),
            }),
            None => Err(StoreError::MissingColumn { column: field }),
        }
    }

    /// Optional text column (NULL decodes to None).
    pub fn opt_text_field(&self, field: &'static str) -> Result<Option<&str>, StoreError> {
        match self.fields.get(field) {
            Some(Value::Text(s)) => Ok(Some(s)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(StoreError::BadValue {
                column: field,
                message: format!("expected text, got {other:?}"),
            }),
        }
    }
}

/// Durable storage interface.
///
/// Implementations must be safe to share across threads; callers serialize
/// mutations per user above this layer. `read` returns rows in ascending
/// id order, which is insertion order for the schema used here.
pub trait RecordStore: Send + Sync {
    /// Insert a row, returning its id. A unique-constraint collision maps
    /// to [`StoreError::Conflict`].
    fn create(&self, table: Table, fields: &[(&'static str, Value)]) -> Result<i64, StoreError>;

    /// Read rows matching the predicate, oldest first.
    fn read(
        &self,
        table: Table,
        filter: &Predicate,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, StoreError>;

    /// Apply field changes to matching rows, returning the affected count.
    fn update(
        &self,
        table: Table,
        changes: &[(&'static str, Value)],
        filter: &Predicate,
    ) -> Result<usize, StoreError>;

    /// Delete matching rows, returning the affected count.
    fn delete(&self, table: Table, filter: &Predicate) -> Result<usize, StoreError>;
}
