//! Timer definitions: creation, lookup, duration accumulation, deletion.
//!
//! Timers are scoped to the calendar day they were created on; every
//! public operation here works on "today" (UTC) and delegates to an
//! `_on` sibling that takes the day explicitly, which tests drive with
//! fixed dates.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::error::{Result, StoreError, TimerError};
use crate::storage::{CategoryTag, Predicate, RecordStore, Table, TimerDef, UserId, Value};

/// Owns timer definitions per user.
#[derive(Clone)]
pub struct TimerCatalog {
    store: Arc<dyn RecordStore>,
}

impl TimerCatalog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Look up a timer by name, scoped to today.
    pub fn get(&self, user: UserId, name: &str) -> Result<TimerDef> {
        self.get_on(user, name, Utc::now().date_naive())
    }

    /// Look up a timer by name on the given day.
    pub fn get_on(&self, user: UserId, name: &str, day: NaiveDate) -> Result<TimerDef> {
        let filter = Predicate::new()
            .eq("user_id", user.0)
            .eq("name", name)
            .eq("created_day", day.to_string());
        let rows = self.store.read(Table::Timers, &filter, Some(1))?;
        match rows.first() {
            Some(row) => Ok(TimerDef::from_row(row).map_err(TimerError::Store)?),
            None => Err(TimerError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    /// All timers created today for the user, in insertion order.
    pub fn list_today(&self, user: UserId) -> Result<Vec<TimerDef>> {
        self.list_on(user, Utc::now().date_naive())
    }

    /// All timers created on the given day, in insertion order.
    pub fn list_on(&self, user: UserId, day: NaiveDate) -> Result<Vec<TimerDef>> {
        let filter = Predicate::new()
            .eq("user_id", user.0)
            .eq("created_day", day.to_string());
        let rows = self.store.read(Table::Timers, &filter, None)?;
        rows.iter()
            .map(|row| TimerDef::from_row(row).map_err(TimerError::Store))
            .collect()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a timer for today. The category tag becomes the stored note.
    pub fn create(
        &self,
        user: UserId,
        name: &str,
        task_id: Option<i64>,
        tag: CategoryTag,
    ) -> Result<TimerDef> {
        self.create_on(user, name, task_id, tag, Utc::now().date_naive())
    }

    /// Create a timer on the given day.
    pub fn create_on(
        &self,
        user: UserId,
        name: &str,
        task_id: Option<i64>,
        tag: CategoryTag,
        day: NaiveDate,
    ) -> Result<TimerDef> {
        let note = tag.note().map(str::to_string);
        let fields = [
            ("user_id", Value::Integer(user.0)),
            ("name", Value::from(name)),
            ("total_seconds", Value::Integer(0)),
            ("task_id", Value::from(task_id)),
            ("note", Value::from(note.clone())),
            ("created_day", Value::from(day.to_string())),
        ];
        let id = match self.store.create(Table::Timers, &fields) {
            Ok(id) => id,
            Err(StoreError::Conflict { .. }) => {
                return Err(TimerError::AlreadyExists {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(TimerDef {
            id,
            user,
            name: name.to_string(),
            total_seconds: 0,
            task_id,
            note,
            created_day: day,
        })
    }

    /// Add `delta_seconds` to the timer's accumulated total.
    ///
    /// A missing timer is a no-op; callers that care check existence first.
    pub fn add_duration(&self, user: UserId, name: &str, delta_seconds: i64) -> Result<()> {
        self.add_duration_on(user, name, delta_seconds, Utc::now().date_naive())
    }

    /// Add duration to a timer on the given day.
    pub fn add_duration_on(
        &self,
        user: UserId,
        name: &str,
        delta_seconds: i64,
        day: NaiveDate,
    ) -> Result<()> {
        let def = match self.get_on(user, name, day) {
            Ok(def) => def,
            Err(TimerError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        let filter = Predicate::new()
            .eq("user_id", user.0)
            .eq("name", name)
            .eq("created_day", day.to_string());
        self.store.update(
            Table::Timers,
            &[(
                "total_seconds",
                Value::Integer(def.total_seconds + delta_seconds),
            )],
            &filter,
        )?;
        Ok(())
    }

    /// Set the external task reference on today's timer.
    /// A missing timer is a no-op.
    pub fn set_task_id(&self, user: UserId, name: &str, task_id: i64) -> Result<()> {
        let filter = self.today_filter(user, name);
        self.store.update(
            Table::Timers,
            &[("task_id", Value::Integer(task_id))],
            &filter,
        )?;
        Ok(())
    }

    /// Set the category note on today's timer. A missing timer is a no-op.
    pub fn set_note(&self, user: UserId, name: &str, note: &str) -> Result<()> {
        let filter = self.today_filter(user, name);
        self.store
            .update(Table::Timers, &[("note", Value::from(note))], &filter)?;
        Ok(())
    }

    /// Delete today's timer and every session recorded under its name.
    ///
    /// Open sessions must be force-closed before calling this, so elapsed
    /// time is credited and no session row outlives its timer.
    pub fn delete(&self, user: UserId, name: &str) -> Result<()> {
        let filter = self.today_filter(user, name);
        let affected = self.store.delete(Table::Timers, &filter)?;
        if affected == 0 {
            return Err(TimerError::NotFound {
                name: name.to_string(),
            });
        }
        let sessions = Predicate::new().eq("user_id", user.0).eq("timer_name", name);
        self.store.delete(Table::Sessions, &sessions)?;
        Ok(())
    }

    fn today_filter(&self, user: UserId, name: &str) -> Predicate {
        Predicate::new()
            .eq("user_id", user.0)
            .eq("name", name)
            .eq("created_day", Utc::now().date_naive().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteGateway;

    fn catalog() -> TimerCatalog {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteGateway::open_memory().unwrap());
        TimerCatalog::new(store)
    }

    const USER: UserId = UserId(7);

    #[test]
    fn create_stores_category_note() {
        let cat = catalog();
        let def = cat.create(USER, "design", None, CategoryTag::NonQc).unwrap();
        assert_eq!(def.note.as_deref(), Some("non-qc"));
        assert_eq!(def.total_seconds, 0);
        assert_eq!(def.label(), "design (non-qc)");

        let fetched = cat.get(USER, "design").unwrap();
        assert_eq!(fetched.note.as_deref(), Some("non-qc"));
    }

    #[test]
    fn duplicate_create_reports_already_exists() {
        let cat = catalog();
        cat.create(USER, "design", None, CategoryTag::Unmarked).unwrap();
        let err = cat.create(USER, "design", None, CategoryTag::Qc).unwrap_err();
        assert!(matches!(err, TimerError::AlreadyExists { .. }));
    }

    #[test]
    fn get_is_scoped_to_the_day() {
        let cat = catalog();
        let yesterday = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        cat.create_on(USER, "design", None, CategoryTag::Unmarked, yesterday)
            .unwrap();

        assert!(cat.get_on(USER, "design", today).is_err());
        assert!(cat.get_on(USER, "design", yesterday).is_ok());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let cat = catalog();
        let day = NaiveDate::from_ymd_opt(2026, 8, 21).unwrap();
        for name in ["review", "design", "calls"] {
            cat.create_on(USER, name, None, CategoryTag::Unmarked, day)
                .unwrap();
        }
        let names: Vec<String> = cat
            .list_on(USER, day)
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["review", "design", "calls"]);
    }

    #[test]
    fn add_duration_accumulates() {
        let cat = catalog();
        cat.create(USER, "design", None, CategoryTag::Unmarked).unwrap();
        cat.add_duration(USER, "design", 90 * 60).unwrap();
        cat.add_duration(USER, "design", 30).unwrap();
        let def = cat.get(USER, "design").unwrap();
        assert_eq!(def.total_seconds, 90 * 60 + 30);
        assert_eq!(def.hours_minutes(), (1, 30));
    }

    #[test]
    fn add_duration_on_missing_timer_is_a_noop() {
        let cat = catalog();
        cat.add_duration(USER, "ghost", 600).unwrap();
        assert!(cat.get(USER, "ghost").is_err());
    }

    #[test]
    fn field_setters_update_today_timer() {
        let cat = catalog();
        cat.create(USER, "design", None, CategoryTag::Unmarked).unwrap();
        cat.set_task_id(USER, "design", 4242).unwrap();
        cat.set_note(USER, "design", "bugs").unwrap();
        let def = cat.get(USER, "design").unwrap();
        assert_eq!(def.task_id, Some(4242));
        assert_eq!(def.note.as_deref(), Some("bugs"));
    }

    #[test]
    fn delete_removes_timer_and_sessions() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteGateway::open_memory().unwrap());
        let cat = TimerCatalog::new(store.clone());
        cat.create(USER, "design", None, CategoryTag::Unmarked).unwrap();
        store
            .create(
                Table::Sessions,
                &[
                    ("user_id", Value::Integer(USER.0)),
                    ("timer_name", Value::from("design")),
                    ("started_at", Value::from("2026-08-21T08:00:00+00:00")),
                    ("ended_at", Value::from("2026-08-21T09:00:00+00:00")),
                    ("duration_seconds", Value::Integer(3600)),
                ],
            )
            .unwrap();

        cat.delete(USER, "design").unwrap();

        assert!(cat.get(USER, "design").is_err());
        let sessions = store
            .read(Table::Sessions, &Predicate::new().eq("user_id", USER.0), None)
            .unwrap();
        assert!(sessions.is_empty());
    }

    #[test]
    fn delete_missing_timer_reports_not_found() {
        let cat = catalog();
        assert!(matches!(
            cat.delete(USER, "ghost").unwrap_err(),
            TimerError::NotFound { .. }
        ));
    }
}
