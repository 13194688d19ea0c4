//! SQLite-backed record store.
//!
//! Stores user accounts, timer definitions and work sessions in
//! `~/.config/worklog/worklog.db`. The connection sits behind a mutex so
//! the gateway can be shared across threads; per-user serialization of
//! mutations happens above this layer.

use std::collections::HashMap;
use std::sync::Mutex;

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::Connection;

use super::data_dir;
use super::gateway::{FieldTest, Predicate, RecordStore, Row, Table, Value};
use crate::error::StoreError;

impl rusqlite::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
        })
    }
}

/// SQLite implementation of [`RecordStore`].
pub struct SqliteGateway {
    conn: Mutex<Connection>,
}

impl SqliteGateway {
    /// Open the database at `~/.config/worklog/worklog.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("worklog.db");
        let conn = Connection::open(path)?;
        let gw = Self {
            conn: Mutex::new(conn),
        };
        gw.migrate()?;
        Ok(gw)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, Box<dyn std::error::Error>> {
        let conn = Connection::open_in_memory()?;
        let gw = Self {
            conn: Mutex::new(conn),
        };
        gw.migrate()?;
        Ok(gw)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.lock().execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id      INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL UNIQUE,
                crm_id  INTEGER,
                name    TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS timers (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id       INTEGER NOT NULL,
                name          TEXT NOT NULL,
                total_seconds INTEGER NOT NULL DEFAULT 0,
                task_id       INTEGER,
                note          TEXT,
                created_day   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          INTEGER NOT NULL,
                timer_name       TEXT NOT NULL,
                started_at       TEXT NOT NULL,
                ended_at         TEXT,
                duration_seconds INTEGER
            );

            -- One timer per (user, name, day); open-session and per-timer scans
            CREATE UNIQUE INDEX IF NOT EXISTS idx_timers_user_name_day
                ON timers(user_id, name, created_day);
            CREATE INDEX IF NOT EXISTS idx_sessions_user_open
                ON sessions(user_id, ended_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_user_timer
                ON sessions(user_id, timer_name);",
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Render a predicate as a WHERE clause with `?` placeholders, collecting
/// the values to bind. IS-NULL tests bind nothing.
fn where_clause<'a>(filter: &'a Predicate) -> (String, Vec<&'a Value>) {
    if filter.is_empty() {
        return (String::new(), Vec::new());
    }
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for (field, test) in filter.tests() {
        match test {
            FieldTest::Eq(value) => {
                parts.push(format!("{field} = ?"));
                params.push(value);
            }
            FieldTest::IsNull => parts.push(format!("{field} IS NULL")),
        }
    }
    (format!(" WHERE {}", parts.join(" AND ")), params)
}

fn map_constraint_err(table: Table, err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict {
                table: table.name(),
            }
        }
        _ => StoreError::Sqlite(err),
    }
}

impl RecordStore for SqliteGateway {
    fn create(&self, table: Table, fields: &[(&'static str, Value)]) -> Result<i64, StoreError> {
        let columns: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        let placeholders: Vec<&str> = fields.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.name(),
            columns.join(", "),
            placeholders.join(", "),
        );

        let conn = self.lock();
        conn.execute(
            &sql,
            rusqlite::params_from_iter(fields.iter().map(|(_, value)| value)),
        )
        .map_err(|e| map_constraint_err(table, e))?;
        Ok(conn.last_insert_rowid())
    }

    fn read(
        &self,
        table: Table,
        filter: &Predicate,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, StoreError> {
        let (clause, params) = where_clause(filter);
        let mut sql = format!("SELECT * FROM {}{clause} ORDER BY id ASC", table.name());
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut fields = HashMap::new();
            let mut id = 0i64;
            for (i, column) in columns.iter().enumerate() {
                let value = match row.get_ref(i)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(n) => Value::Integer(n),
                    ValueRef::Real(f) => Value::Real(f),
                    ValueRef::Text(bytes) => {
                        Value::Text(String::from_utf8_lossy(bytes).into_owned())
                    }
                    ValueRef::Blob(_) => {
                        return Err(StoreError::BadValue {
                            column: "blob",
                            message: format!("unexpected blob column in {}", table.name()),
                        })
                    }
                };
                if column == "id" {
                    id = value.as_i64().ok_or(StoreError::MissingColumn { column: "id" })?;
                } else {
                    fields.insert(column.clone(), value);
                }
            }
            out.push(Row::new(id, fields));
        }
        Ok(out)
    }

    fn update(
        &self,
        table: Table,
        changes: &[(&'static str, Value)],
        filter: &Predicate,
    ) -> Result<usize, StoreError> {
        let assignments: Vec<String> = changes
            .iter()
            .map(|(name, _)| format!("{name} = ?"))
            .collect();
        let (clause, where_params) = where_clause(filter);
        let sql = format!(
            "UPDATE {} SET {}{clause}",
            table.name(),
            assignments.join(", "),
        );

        let params = changes
            .iter()
            .map(|(_, value)| value)
            .chain(where_params.into_iter());
        let affected = self
            .lock()
            .execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(affected)
    }

    fn delete(&self, table: Table, filter: &Predicate) -> Result<usize, StoreError> {
        let (clause, params) = where_clause(filter);
        let sql = format!("DELETE FROM {}{clause}", table.name());
        let affected = self
            .lock()
            .execute(&sql, rusqlite::params_from_iter(params))?;
        Ok(affected)
    }
}
