//! Inbound event surface. One handler per user action; each returns the
//! lines to display plus the control layout the transport should offer
//! next. All handlers for one user run under that user's cell lock, so
//! dialog state and timer writes never interleave, while different
//! users proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use indoc::indoc;

use crate::crm::TimeSink;
use crate::error::{Result, TimerError};
use crate::report::{DialogStart, ReportDialog};
use crate::stats::StatisticsEngine;
use crate::storage::{
    split_hours_minutes, CategoryTag, Predicate, RecordStore, Table, UserAccount, UserId, Value,
};
use crate::timer::{SessionTracker, TimerCatalog};

/// Controls the transport should render after a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSurface {
    /// A session is running: offer a single stop control for it.
    Stop { timer: String },
    /// Nothing is running: offer a start control per timer, plus the
    /// report entry point when there is anything to report.
    Start {
        timers: Vec<String>,
        offer_report: bool,
    },
}

/// Outcome of one inbound event.
#[derive(Debug, Clone)]
pub struct Reply {
    pub messages: Vec<String>,
    pub controls: ControlSurface,
}

#[derive(Default)]
struct UserCell {
    dialog: Option<ReportDialog>,
}

fn lock_cell(cell: &Arc<Mutex<UserCell>>) -> MutexGuard<'_, UserCell> {
    cell.lock().unwrap_or_else(|e| e.into_inner())
}

/// An in-progress dialog is dropped whenever a top-level event arrives.
/// Field edits already persisted stay on the timers.
fn cancel_dialog(cell: &mut UserCell) -> Vec<String> {
    if cell.dialog.take().is_some() {
        vec!["Report cancelled.".to_string()]
    } else {
        Vec::new()
    }
}

pub struct EventRouter {
    catalog: TimerCatalog,
    tracker: SessionTracker,
    stats: StatisticsEngine,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn TimeSink>,
    cells: Mutex<HashMap<UserId, Arc<Mutex<UserCell>>>>,
}

impl EventRouter {
    pub fn new(store: Arc<dyn RecordStore>, sink: Arc<dyn TimeSink>) -> Self {
        Self {
            catalog: TimerCatalog::new(store.clone()),
            tracker: SessionTracker::new(store.clone()),
            stats: StatisticsEngine::new(store.clone()),
            store,
            sink,
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &TimerCatalog {
        &self.catalog
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn stats(&self) -> &StatisticsEngine {
        &self.stats
    }

    fn cell(&self, user: UserId) -> Arc<Mutex<UserCell>> {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.entry(user).or_default().clone()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Record (or refresh) the mapping from this user to a CRM account.
    pub fn on_link_account(&self, user: UserId, crm_id: i64, name: &str) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        match self.link_account(user, crm_id, name) {
            Ok(msg) => messages.push(msg),
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    /// Entry point greeting: force-close whatever is still running and
    /// show the help text.
    pub fn on_reset_sessions(&self, user: UserId) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        match self.tracker.force_close_all(user) {
            Ok(closed) if !closed.is_empty() => {
                messages.push(format!("Closed {} open session(s).", closed.len()));
            }
            Ok(_) => {}
            Err(e) => messages.push(self.fail(e)),
        }
        messages.push(
            indoc! {"
                Work log ready.

                Create timers for today's tasks, start a session when you
                begin working and stop it when you pause. Each timer keeps
                a running total for the day.

                When the day is done, run the report to submit every
                timer's time to the task tracker."}
            .to_string(),
        );
        self.reply(user, messages)
    }

    pub fn on_create_timer(
        &self,
        user: UserId,
        name: &str,
        task_id: Option<i64>,
        tag_code: i64,
    ) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        let created = CategoryTag::from_code(tag_code)
            .and_then(|tag| self.catalog.create(user, name, task_id, tag));
        match created {
            Ok(def) => messages.push(format!("Timer '{}' created.", def.label())),
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    pub fn on_start_timer(&self, user: UserId, name: &str) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        match self.tracker.start(user, name) {
            Ok(_) => messages.push(format!("Timer '{name}' started!")),
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    pub fn on_stop_timer(&self, user: UserId, name: &str) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        match self.tracker.stop(user, name) {
            Ok(summary) => {
                let (h, m) = summary.hours_minutes();
                messages.push(format!(
                    "Timer '{name}' stopped: {:.1} min. Total: {h}h {m}m.",
                    summary.elapsed_minutes()
                ));
            }
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    /// Delete a timer. A still-running session is stopped first so its
    /// time is accounted for in the stop notice, then the timer and its
    /// session history go away together.
    pub fn on_delete_timer(&self, user: UserId, name: &str) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        match self.tracker.stop(user, name) {
            Ok(summary) => {
                let (h, m) = summary.hours_minutes();
                messages.push(format!(
                    "Timer '{name}' stopped: {:.1} min. Total: {h}h {m}m.",
                    summary.elapsed_minutes()
                ));
            }
            Err(TimerError::NotRunning { .. }) => {}
            Err(e) => messages.push(self.fail(e)),
        }
        match self.catalog.delete(user, name) {
            Ok(()) => messages.push(format!("Timer '{name}' deleted.")),
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    /// Credit extra minutes onto a timer without running a session.
    pub fn on_add_minutes(&self, user: UserId, name: &str, minutes: i64) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        if minutes <= 0 {
            messages.push("Minutes must be a positive number.".to_string());
            return self.reply(user, messages);
        }
        match self.add_minutes(user, name, minutes) {
            Ok(msg) => messages.push(msg),
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    pub fn on_request_statistics(&self, user: UserId) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        match self.stats.daily_summary(user) {
            Ok(text) => messages.push(text),
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    pub fn on_request_detail(&self, user: UserId, name: &str) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);
        match self.stats.detail(user, name) {
            Ok(text) => messages.push(text),
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    /// Start the report dialog for today's timers. Restarts from scratch
    /// if one was already in progress.
    pub fn on_begin_report(&self, user: UserId) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let mut messages = cancel_dialog(&mut guard);

        let crm_user = match self.account(user) {
            Ok(Some(account)) => match account.crm_id {
                Some(id) => id,
                None => {
                    messages.push(
                        "Your account has no CRM user attached, ask an admin to finish the link."
                            .to_string(),
                    );
                    return self.reply(user, messages);
                }
            },
            Ok(None) => {
                messages.push("No linked account. Link your CRM account first.".to_string());
                return self.reply(user, messages);
            }
            Err(e) => {
                messages.push(self.fail(e));
                return self.reply(user, messages);
            }
        };

        match ReportDialog::begin(&self.catalog, self.sink.as_ref(), user, crm_user) {
            Ok(DialogStart::NoTimers) => {
                messages.push("No timers for today, nothing to report.".to_string());
            }
            Ok(DialogStart::Started { dialog, turn }) => {
                messages.extend(turn.messages);
                if !turn.finished {
                    guard.dialog = Some(dialog);
                }
            }
            Err(e) => messages.push(self.fail(e)),
        }
        self.reply(user, messages)
    }

    /// Free-form text goes to the active dialog, if there is one.
    pub fn on_dialog_text_reply(&self, user: UserId, text: &str) -> Reply {
        let cell = self.cell(user);
        let mut guard = lock_cell(&cell);
        let messages = match guard.dialog.take() {
            None => vec!["Nothing is waiting for a reply.".to_string()],
            Some(mut dialog) => {
                match dialog.handle_reply(&self.catalog, self.sink.as_ref(), text) {
                    Ok(turn) => {
                        if !turn.finished {
                            guard.dialog = Some(dialog);
                        }
                        turn.messages
                    }
                    Err(e) => {
                        // Keep the dialog; the reply can be retried.
                        guard.dialog = Some(dialog);
                        vec![self.fail(e)]
                    }
                }
            }
        };
        self.reply(user, messages)
    }

    pub fn dialog_active(&self, user: UserId) -> bool {
        let cell = self.cell(user);
        let guard = lock_cell(&cell);
        guard.dialog.is_some()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn link_account(&self, user: UserId, crm_id: i64, name: &str) -> Result<String> {
        let filter = Predicate::new().eq("chat_id", user.0);
        let rows = self
            .store
            .read(Table::Users, &filter, Some(1))
            .map_err(TimerError::Store)?;
        let changes = [
            ("crm_id", Value::Integer(crm_id)),
            ("name", Value::from(name)),
        ];
        if rows.is_empty() {
            self.store
                .create(
                    Table::Users,
                    &[
                        ("chat_id", Value::Integer(user.0)),
                        ("crm_id", Value::Integer(crm_id)),
                        ("name", Value::from(name)),
                    ],
                )
                .map_err(TimerError::Store)?;
        } else {
            self.store
                .update(Table::Users, &changes, &filter)
                .map_err(TimerError::Store)?;
        }
        Ok(format!("Account linked: {name} (CRM user {crm_id})."))
    }

    /// The stored account for this user, if any.
    pub fn account(&self, user: UserId) -> Result<Option<UserAccount>> {
        let filter = Predicate::new().eq("chat_id", user.0);
        let rows = self
            .store
            .read(Table::Users, &filter, Some(1))
            .map_err(TimerError::Store)?;
        match rows.first() {
            Some(row) => Ok(Some(UserAccount::from_row(row).map_err(TimerError::Store)?)),
            None => Ok(None),
        }
    }

    fn add_minutes(&self, user: UserId, name: &str, minutes: i64) -> Result<String> {
        let def = self.catalog.get(user, name)?;
        self.catalog.add_duration(user, name, minutes * 60)?;
        let (h, m) = split_hours_minutes(def.total_seconds + minutes * 60);
        Ok(format!("Added {minutes} min to '{name}'. Total: {h}h {m}m."))
    }

    fn reply(&self, user: UserId, messages: Vec<String>) -> Reply {
        Reply {
            messages,
            controls: self.controls_for(user),
        }
    }

    /// Derive the control layout from current state: a running session
    /// wins, otherwise one start control per timer created today.
    pub fn controls_for(&self, user: UserId) -> ControlSurface {
        match self.try_controls(user) {
            Ok(controls) => controls,
            Err(e) => {
                tracing::error!(error = %e, "control lookup failed");
                ControlSurface::Start {
                    timers: Vec::new(),
                    offer_report: false,
                }
            }
        }
    }

    fn try_controls(&self, user: UserId) -> Result<ControlSurface> {
        if let Some(open) = self.tracker.list_open(user)?.into_iter().next() {
            return Ok(ControlSurface::Stop {
                timer: open.timer_name,
            });
        }
        let timers = self.catalog.list_today(user)?;
        Ok(ControlSurface::Start {
            offer_report: !timers.is_empty(),
            timers: timers.into_iter().map(|t| t.label()).collect(),
        })
    }

    fn fail(&self, err: TimerError) -> String {
        match err {
            TimerError::NotFound { name } => format!("No timer named '{name}' today."),
            TimerError::AlreadyExists { name } => format!("Timer '{name}' already exists today."),
            TimerError::AlreadyRunning { name } => format!("Timer '{name}' is already running."),
            TimerError::NotRunning { name } => format!("Timer '{name}' is not running."),
            TimerError::UnknownCategory(code) => {
                format!("Unknown category tag {code}. Use 0 to 3.")
            }
            TimerError::Store(e) => {
                tracing::error!(error = %e, "storage failure");
                "Storage trouble, please try again.".to_string()
            }
            other => format!("{other}."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrmError;
    use crate::storage::SqliteGateway;

    const USER: UserId = UserId(100);

    struct NullSink;

    impl TimeSink for NullSink {
        fn name(&self) -> &str {
            "null"
        }

        fn is_authenticated(&self) -> bool {
            false
        }

        fn submit_elapsed_time(&self, _: i64, _: i64, _: i64, _: &str) -> Result<(), CrmError> {
            Err(CrmError::NotAuthenticated { service: "null" })
        }
    }

    fn router() -> EventRouter {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteGateway::open_memory().unwrap());
        EventRouter::new(store, Arc::new(NullSink))
    }

    #[test]
    fn controls_follow_session_state() {
        let router = router();
        router.on_create_timer(USER, "design", None, 2);
        router.on_create_timer(USER, "review", None, 0);

        assert_eq!(
            router.controls_for(USER),
            ControlSurface::Start {
                timers: vec!["design (non-qc)".to_string(), "review".to_string()],
                offer_report: true,
            }
        );

        router.on_start_timer(USER, "design");
        assert_eq!(
            router.controls_for(USER),
            ControlSurface::Stop {
                timer: "design".to_string()
            }
        );

        router.on_stop_timer(USER, "design");
        assert!(matches!(
            router.controls_for(USER),
            ControlSurface::Start { .. }
        ));
    }

    #[test]
    fn top_level_event_abandons_dialog() {
        let router = router();
        router.on_link_account(USER, 555, "jay");
        router.on_create_timer(USER, "design", None, 0);

        let reply = router.on_begin_report(USER);
        assert_eq!(
            reply.messages,
            vec!["Enter the task id for 'design':".to_string()]
        );
        assert!(router.dialog_active(USER));

        let reply = router.on_request_statistics(USER);
        assert_eq!(reply.messages[0], "Report cancelled.");
        assert!(!router.dialog_active(USER));

        let reply = router.on_dialog_text_reply(USER, "42");
        assert_eq!(reply.messages, vec!["Nothing is waiting for a reply.".to_string()]);
    }

    #[test]
    fn report_needs_a_linked_account() {
        let router = router();
        router.on_create_timer(USER, "design", None, 0);

        let reply = router.on_begin_report(USER);
        assert_eq!(
            reply.messages,
            vec!["No linked account. Link your CRM account first.".to_string()]
        );
        assert!(!router.dialog_active(USER));

        // A row without a CRM id is just as unusable.
        router
            .store
            .create(
                Table::Users,
                &[
                    ("chat_id", Value::Integer(USER.0)),
                    ("crm_id", Value::Null),
                    ("name", Value::from("jay")),
                ],
            )
            .unwrap();
        let reply = router.on_begin_report(USER);
        assert!(reply.messages[0].contains("no CRM user attached"));
    }

    #[test]
    fn add_minutes_rejects_non_positive_amounts() {
        let router = router();
        router.on_create_timer(USER, "design", None, 0);

        let reply = router.on_add_minutes(USER, "design", 0);
        assert_eq!(
            reply.messages,
            vec!["Minutes must be a positive number.".to_string()]
        );

        let reply = router.on_add_minutes(USER, "missing", 15);
        assert_eq!(
            reply.messages,
            vec!["No timer named 'missing' today.".to_string()]
        );

        let reply = router.on_add_minutes(USER, "design", 90);
        assert_eq!(
            reply.messages,
            vec!["Added 90 min to 'design'. Total: 1h 30m.".to_string()]
        );
    }
}
