//! Typed records for the three stored shapes.
//!
//! Rows come out of the record store as loose column/value maps; the
//! constructors here validate them at the boundary (non-negative totals,
//! well-formed timestamps and dates) so the rest of the library works
//! with real types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::gateway::Row;
use crate::error::{StoreError, TimerError};

/// External chat id of a user. This is the key everything is scoped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Fixed classification attached to a timer at creation.
///
/// The numeric codes come over the wire; `Unmarked` leaves the note empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryTag {
    Qc,
    NonQc,
    Bugs,
    Unmarked,
}

impl CategoryTag {
    /// Decode a wire code. Unknown codes are rejected here, before any
    /// record is touched.
    pub fn from_code(code: i64) -> Result<Self, TimerError> {
        match code {
            3 => Ok(CategoryTag::Qc),
            2 => Ok(CategoryTag::NonQc),
            1 => Ok(CategoryTag::Bugs),
            0 => Ok(CategoryTag::Unmarked),
            other => Err(TimerError::UnknownCategory(other)),
        }
    }

    /// Display note for the tag, if any.
    pub fn note(&self) -> Option<&'static str> {
        match self {
            CategoryTag::Qc => Some("qc"),
            CategoryTag::NonQc => Some("non-qc"),
            CategoryTag::Bugs => Some("bugs"),
            CategoryTag::Unmarked => None,
        }
    }
}

/// Split whole seconds into truncated (hours, minutes).
pub fn split_hours_minutes(total_seconds: i64) -> (i64, i64) {
    (total_seconds / 3600, (total_seconds % 3600) / 60)
}

fn parse_utc(raw: &str, column: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::BadValue {
            column,
            message: format!("bad timestamp '{raw}': {e}"),
        })
}

/// A chat user and their linkage to the external CRM account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub chat_id: UserId,
    pub crm_id: Option<i64>,
    pub name: String,
}

impl UserAccount {
    pub fn from_row(row: &Row) -> Result<Self, StoreError> {
        Ok(Self {
            id: row.id,
            chat_id: UserId(row.i64_field("chat_id")?),
            crm_id: row.opt_i64_field("crm_id")?,
            name: row.text_field("name")?.to_string(),
        })
    }
}

/// A named, per-user, per-day work-time counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerDef {
    pub id: i64,
    pub user: UserId,
    pub name: String,
    pub total_seconds: i64,
    pub task_id: Option<i64>,
    pub note: Option<String>,
    pub created_day: NaiveDate,
}

impl TimerDef {
    pub fn from_row(row: &Row) -> Result<Self, StoreError> {
        let total_seconds = row.i64_field("total_seconds")?;
        if total_seconds < 0 {
            return Err(StoreError::BadValue {
                column: "total_seconds",
                message: format!("negative total {total_seconds}"),
            });
        }
        let raw_day = row.text_field("created_day")?;
        let created_day =
            NaiveDate::parse_from_str(raw_day, "%Y-%m-%d").map_err(|e| StoreError::BadValue {
                column: "created_day",
                message: format!("bad date '{raw_day}': {e}"),
            })?;
        Ok(Self {
            id: row.id,
            user: UserId(row.i64_field("user_id")?),
            name: row.text_field("name")?.to_string(),
            total_seconds,
            task_id: row.opt_i64_field("task_id")?,
            note: row.opt_text_field("note")?.map(str::to_string),
            created_day,
        })
    }

    /// Display label: the name, with the category note appended when set.
    pub fn label(&self) -> String {
        match &self.note {
            Some(note) => format!("{} ({note})", self.name),
            None => self.name.clone(),
        }
    }

    /// Accumulated total as truncated (hours, minutes).
    pub fn hours_minutes(&self) -> (i64, i64) {
        split_hours_minutes(self.total_seconds)
    }
}

/// One contiguous interval during which a timer accumulates time.
/// `ended_at = None` means the session is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSession {
    pub id: i64,
    pub user: UserId,
    pub timer_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl WorkSession {
    pub fn from_row(row: &Row) -> Result<Self, StoreError> {
        let started_at = parse_utc(row.text_field("started_at")?, "started_at")?;
        let ended_at = match row.opt_text_field("ended_at")? {
            Some(raw) => Some(parse_utc(raw, "ended_at")?),
            None => None,
        };
        let duration_seconds = row.opt_i64_field("duration_seconds")?;
        if let Some(d) = duration_seconds {
            if d < 0 {
                return Err(StoreError::BadValue {
                    column: "duration_seconds",
                    message: format!("negative duration {d}"),
                });
            }
        }
        Ok(Self {
            id: row.id,
            user: UserId(row.i64_field("user_id")?),
            timer_name: row.text_field("timer_name")?.to_string(),
            started_at,
            ended_at,
            duration_seconds,
        })
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::gateway::Value;
    use std::collections::HashMap;

    fn row(fields: Vec<(&str, Value)>) -> Row {
        let map: HashMap<String, Value> =
            fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        Row::new(1, map)
    }

    #[test]
    fn category_codes_map_to_notes() {
        assert_eq!(CategoryTag::from_code(3).unwrap().note(), Some("qc"));
        assert_eq!(CategoryTag::from_code(2).unwrap().note(), Some("non-qc"));
        assert_eq!(CategoryTag::from_code(1).unwrap().note(), Some("bugs"));
        assert_eq!(CategoryTag::from_code(0).unwrap().note(), None);
        assert!(matches!(
            CategoryTag::from_code(9),
            Err(TimerError::UnknownCategory(9))
        ));
    }

    #[test]
    fn split_truncates_not_rounds() {
        assert_eq!(split_hours_minutes(0), (0, 0));
        assert_eq!(split_hours_minutes(5400), (1, 30));
        assert_eq!(split_hours_minutes(3659), (1, 0));
        assert_eq!(split_hours_minutes(119), (0, 1));
    }

    #[test]
    fn timer_from_row_rejects_negative_total() {
        let r = row(vec![
            ("user_id", Value::Integer(7)),
            ("name", Value::from("design")),
            ("total_seconds", Value::Integer(-5)),
            ("task_id", Value::Null),
            ("note", Value::Null),
            ("created_day", Value::from("2026-08-21")),
        ]);
        assert!(TimerDef::from_row(&r).is_err());
    }

    #[test]
    fn timer_label_includes_note() {
        let r = row(vec![
            ("user_id", Value::Integer(7)),
            ("name", Value::from("design")),
            ("total_seconds", Value::Integer(0)),
            ("task_id", Value::Null),
            ("note", Value::from("non-qc")),
            ("created_day", Value::from("2026-08-21")),
        ]);
        let def = TimerDef::from_row(&r).unwrap();
        assert_eq!(def.label(), "design (non-qc)");
    }

    #[test]
    fn session_from_row_parses_timestamps() {
        let r = row(vec![
            ("user_id", Value::Integer(7)),
            ("timer_name", Value::from("design")),
            ("started_at", Value::from("2026-08-21T08:00:00+00:00")),
            ("ended_at", Value::Null),
            ("duration_seconds", Value::Null),
        ]);
        let s = WorkSession::from_row(&r).unwrap();
        assert!(s.is_open());
        assert_eq!(s.started_at.to_rfc3339(), "2026-08-21T08:00:00+00:00");
    }

    #[test]
    fn session_from_row_rejects_garbage_timestamp() {
        let r = row(vec![
            ("user_id", Value::Integer(7)),
            ("timer_name", Value::from("design")),
            ("started_at", Value::from("yesterday")),
            ("ended_at", Value::Null),
            ("duration_seconds", Value::Null),
        ]);
        assert!(WorkSession::from_row(&r).is_err());
    }
}
