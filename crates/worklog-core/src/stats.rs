//! Daily aggregates over timers and sessions, rendered for display.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::storage::{split_hours_minutes, RecordStore, TimerDef, UserId};
use crate::timer::{SessionTracker, TimerCatalog};

/// Read-only view composing catalog and tracker state.
#[derive(Clone)]
pub struct StatisticsEngine {
    catalog: TimerCatalog,
    tracker: SessionTracker,
}

/// `1.50h (1h 30m)` -- fractional hours plus the truncated breakdown.
fn fmt_total(total_seconds: i64) -> String {
    let (hours, minutes) = split_hours_minutes(total_seconds);
    format!(
        "{:.2}h ({hours}h {minutes}m)",
        total_seconds as f64 / 3600.0
    )
}

fn fmt_line(def: &TimerDef, running: bool) -> String {
    let glyph = if running { '⏳' } else { '⏹' };
    format!("{glyph} [{}] {}", def.name, fmt_total(def.total_seconds))
}

impl StatisticsEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            catalog: TimerCatalog::new(store.clone()),
            tracker: SessionTracker::new(store),
        }
    }

    /// One line per today-timer with a running/stopped glyph, then the
    /// day total. Ordering follows the catalog's insertion order.
    pub fn daily_summary(&self, user: UserId) -> Result<String> {
        let timers = self.catalog.list_today(user)?;
        if timers.is_empty() {
            return Ok("No timers for today.".to_string());
        }

        let open: HashSet<String> = self
            .tracker
            .list_open(user)?
            .into_iter()
            .map(|s| s.timer_name)
            .collect();

        let mut out = String::from("📊 Today's work:\n");
        let mut day_total = 0i64;
        for def in &timers {
            day_total += def.total_seconds;
            out.push_str(&fmt_line(def, open.contains(&def.name)));
            out.push('\n');
        }
        out.push_str(&format!("\n📈 Day total: {}", fmt_total(day_total)));
        Ok(out)
    }

    /// Single-timer view: status line plus task reference and note when set.
    pub fn detail(&self, user: UserId, name: &str) -> Result<String> {
        let def = self.catalog.get(user, name)?;
        let running = self
            .tracker
            .list_open(user)?
            .iter()
            .any(|s| s.timer_name == name);

        let mut out = fmt_line(&def, running);
        if let Some(task_id) = def.task_id {
            out.push_str(&format!("\nTask: {task_id}"));
        }
        if let Some(note) = &def.note {
            out.push_str(&format!("\nNote: {note}"));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CategoryTag, SqliteGateway};

    const USER: UserId = UserId(7);

    fn setup() -> (TimerCatalog, SessionTracker, StatisticsEngine) {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteGateway::open_memory().unwrap());
        (
            TimerCatalog::new(store.clone()),
            SessionTracker::new(store.clone()),
            StatisticsEngine::new(store),
        )
    }

    #[test]
    fn empty_day_reports_no_timers() {
        let (_, _, stats) = setup();
        assert_eq!(stats.daily_summary(USER).unwrap(), "No timers for today.");
    }

    #[test]
    fn summary_shows_glyphs_order_and_day_total() {
        let (cat, tracker, stats) = setup();
        cat.create(USER, "design", None, CategoryTag::NonQc).unwrap();
        cat.create(USER, "review", None, CategoryTag::Unmarked).unwrap();
        cat.add_duration(USER, "design", 5400).unwrap();
        cat.add_duration(USER, "review", 600).unwrap();
        tracker.start(USER, "review").unwrap();

        let report = stats.daily_summary(USER).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines[0], "📊 Today's work:");
        assert_eq!(lines[1], "⏹ [design] 1.50h (1h 30m)");
        assert_eq!(lines[2], "⏳ [review] 0.17h (0h 10m)");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "📈 Day total: 1.67h (1h 40m)");
    }

    #[test]
    fn detail_includes_task_and_note_when_set() {
        let (cat, _, stats) = setup();
        cat.create(USER, "design", Some(4242), CategoryTag::Bugs).unwrap();
        cat.add_duration(USER, "design", 3600).unwrap();

        let detail = stats.detail(USER, "design").unwrap();
        assert_eq!(detail, "⏹ [design] 1.00h (1h 0m)\nTask: 4242\nNote: bugs");
    }

    #[test]
    fn detail_omits_unset_fields() {
        let (cat, _, stats) = setup();
        cat.create(USER, "design", None, CategoryTag::Unmarked).unwrap();
        let detail = stats.detail(USER, "design").unwrap();
        assert_eq!(detail, "⏹ [design] 0.00h (0h 0m)");
    }

    #[test]
    fn detail_of_missing_timer_is_not_found() {
        let (_, _, stats) = setup();
        assert!(stats.detail(USER, "ghost").is_err());
    }
}
