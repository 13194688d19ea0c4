//! Session lifecycle: Closed -> Open -> Closed, per (user, timer name).
//!
//! The tracker enforces the single-open-session invariant by scanning the
//! user's open sessions before starting a new one. Callers must serialize
//! all session mutations for a given user (the event router's per-user
//! lock does this); the tracker itself does not take locks.
//!
//! Every public operation has an `*_at` sibling taking the timestamp
//! explicitly. The public form passes `Utc::now()`; tests drive the `_at`
//! forms with fixed clocks.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Result, TimerError};
use crate::storage::{
    split_hours_minutes, Predicate, RecordStore, Table, UserId, Value, WorkSession,
};
use crate::timer::TimerCatalog;

/// What `stop` hands back: the elapsed interval just credited and the
/// timer's new accumulated total.
#[derive(Debug, Clone)]
pub struct StopSummary {
    pub name: String,
    pub elapsed_seconds: i64,
    pub total_seconds: i64,
}

impl StopSummary {
    /// Elapsed time in minutes; display rounds to one decimal.
    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed_seconds as f64 / 60.0
    }

    /// Accumulated total as truncated (hours, minutes).
    pub fn hours_minutes(&self) -> (i64, i64) {
        split_hours_minutes(self.total_seconds)
    }
}

/// Owns the start/stop lifecycle of timers.
#[derive(Clone)]
pub struct SessionTracker {
    store: Arc<dyn RecordStore>,
    catalog: TimerCatalog,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            catalog: TimerCatalog::new(store.clone()),
            store,
        }
    }

    /// Open a session for today's timer `name`.
    pub fn start(&self, user: UserId, name: &str) -> Result<WorkSession> {
        self.start_at(user, name, Utc::now())
    }

    pub fn start_at(&self, user: UserId, name: &str, now: DateTime<Utc>) -> Result<WorkSession> {
        // NotFound if the timer doesn't exist for the day.
        self.catalog.get_on(user, name, now.date_naive())?;

        let open = self.list_open(user)?;
        if open.iter().any(|s| s.timer_name == name) {
            return Err(TimerError::AlreadyRunning {
                name: name.to_string(),
            });
        }

        let fields = [
            ("user_id", Value::Integer(user.0)),
            ("timer_name", Value::from(name)),
            ("started_at", Value::from(now.to_rfc3339())),
            ("ended_at", Value::Null),
            ("duration_seconds", Value::Null),
        ];
        let id = self.store.create(Table::Sessions, &fields)?;
        Ok(WorkSession {
            id,
            user,
            timer_name: name.to_string(),
            started_at: now,
            ended_at: None,
            duration_seconds: None,
        })
    }

    /// Close the open session for `name`, crediting elapsed time to the
    /// timer's total.
    pub fn stop(&self, user: UserId, name: &str) -> Result<StopSummary> {
        self.stop_at(user, name, Utc::now())
    }

    pub fn stop_at(&self, user: UserId, name: &str, now: DateTime<Utc>) -> Result<StopSummary> {
        let filter = Predicate::new()
            .eq("user_id", user.0)
            .eq("timer_name", name)
            .is_null("ended_at");
        let rows = self.store.read(Table::Sessions, &filter, None)?;
        let sessions: Vec<WorkSession> = rows
            .iter()
            .map(|row| WorkSession::from_row(row).map_err(TimerError::Store))
            .collect::<Result<_>>()?;

        match sessions.len() {
            0 => Err(TimerError::NotRunning {
                name: name.to_string(),
            }),
            1 => self.close_session(&sessions[0], now),
            count => Err(TimerError::OpenSessionInvariant {
                name: name.to_string(),
                count,
            }),
        }
    }

    /// All currently open sessions for the user, oldest first. At most one
    /// per timer name.
    pub fn list_open(&self, user: UserId) -> Result<Vec<WorkSession>> {
        let filter = Predicate::new().eq("user_id", user.0).is_null("ended_at");
        let rows = self.store.read(Table::Sessions, &filter, None)?;
        rows.iter()
            .map(|row| WorkSession::from_row(row).map_err(TimerError::Store))
            .collect()
    }

    /// Stop every open session for the user. Each close follows the same
    /// elapsed-computation path as `stop`.
    pub fn force_close_all(&self, user: UserId) -> Result<Vec<StopSummary>> {
        self.force_close_all_at(user, Utc::now())
    }

    pub fn force_close_all_at(
        &self,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<StopSummary>> {
        let open = self.list_open(user)?;
        let mut summaries = Vec::with_capacity(open.len());
        for session in &open {
            summaries.push(self.close_session(session, now)?);
        }
        Ok(summaries)
    }

    fn close_session(&self, session: &WorkSession, now: DateTime<Utc>) -> Result<StopSummary> {
        let elapsed = (now - session.started_at).num_seconds();
        if elapsed < 0 {
            return Err(TimerError::ClockAnomaly {
                started_at: session.started_at,
                ended_at: now,
            });
        }

        // The timer row lives on the day the session started; a stop after
        // midnight still credits that row.
        let day = session.started_at.date_naive();
        self.catalog
            .add_duration_on(session.user, &session.timer_name, elapsed, day)?;

        self.store.update(
            Table::Sessions,
            &[
                ("ended_at", Value::from(now.to_rfc3339())),
                ("duration_seconds", Value::Integer(elapsed)),
            ],
            &Predicate::new().eq("id", session.id),
        )?;

        let total_seconds = self
            .catalog
            .get_on(session.user, &session.timer_name, day)?
            .total_seconds;

        Ok(StopSummary {
            name: session.timer_name.clone(),
            elapsed_seconds: elapsed,
            total_seconds,
        })
    }
}
