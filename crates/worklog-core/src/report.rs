//! Report dialog: make sure every one of today's timers carries a task
//! reference and a note, then submit each one's accumulated time to the
//! CRM, exactly once per timer per run.
//!
//! The dialog is an explicit state machine driven one inbound event at a
//! time. It never blocks between steps: `begin` and each reply return a
//! [`DialogTurn`] and the dialog suspends until the next event for this
//! user. Field edits are persisted as they are collected, so abandoning
//! the dialog keeps them.

use crate::crm::TimeSink;
use crate::error::{Result, TimerError};
use crate::storage::{split_hours_minutes, UserId};
use crate::timer::TimerCatalog;

/// What one dialog step hands back: display lines, and whether the
/// dialog just finished.
#[derive(Debug, Clone)]
pub struct DialogTurn {
    pub messages: Vec<String>,
    pub finished: bool,
}

/// Outcome of [`ReportDialog::begin`].
pub enum DialogStart {
    /// Nothing to report today; no dialog state was created.
    NoTimers,
    /// The dialog is live, or ran to completion in one turn when every
    /// timer was already complete.
    Started {
        dialog: ReportDialog,
        turn: DialogTurn,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    TaskRef,
    Note,
}

/// Per-user sequential report workflow.
pub struct ReportDialog {
    user: UserId,
    crm_user: i64,
    queue: Vec<String>,
    index: usize,
    awaiting: Option<Awaiting>,
    submitted: Vec<String>,
    failed: Vec<String>,
}

impl ReportDialog {
    /// Capture today's timers as the work queue and advance to the first
    /// prompt or straight through the submissions.
    pub fn begin(
        catalog: &TimerCatalog,
        sink: &dyn TimeSink,
        user: UserId,
        crm_user: i64,
    ) -> Result<DialogStart> {
        let timers = catalog.list_today(user)?;
        if timers.is_empty() {
            return Ok(DialogStart::NoTimers);
        }

        let mut dialog = ReportDialog {
            user,
            crm_user,
            queue: timers.into_iter().map(|t| t.name).collect(),
            index: 0,
            awaiting: None,
            submitted: Vec::new(),
            failed: Vec::new(),
        };
        let mut messages = Vec::new();
        let finished = dialog.advance(catalog, sink, &mut messages)?;
        Ok(DialogStart::Started {
            dialog,
            turn: DialogTurn { messages, finished },
        })
    }

    /// Feed one user reply into the dialog.
    pub fn handle_reply(
        &mut self,
        catalog: &TimerCatalog,
        sink: &dyn TimeSink,
        text: &str,
    ) -> Result<DialogTurn> {
        let text = text.trim();
        let name = match self.queue.get(self.index) {
            Some(n) => n.clone(),
            None => {
                // Queue already exhausted; just summarize.
                let mut messages = Vec::new();
                let finished = self.advance(catalog, sink, &mut messages)?;
                return Ok(DialogTurn { messages, finished });
            }
        };

        let mut messages = Vec::new();
        match self.awaiting {
            Some(Awaiting::TaskRef) => {
                let task_id: i64 = match text.parse() {
                    Ok(id) => id,
                    Err(_) => {
                        // Reprompt without advancing.
                        return Ok(DialogTurn {
                            messages: vec![format!(
                                "That doesn't look like a task id. Enter the task id for '{name}':"
                            )],
                            finished: false,
                        });
                    }
                };
                catalog.set_task_id(self.user, &name, task_id)?;
                self.awaiting = None;
                messages.push("Task id saved.".to_string());
            }
            Some(Awaiting::Note) => {
                if text.is_empty() {
                    return Ok(DialogTurn {
                        messages: vec![format!("Enter a note for '{name}':")],
                        finished: false,
                    });
                }
                catalog.set_note(self.user, &name, text)?;
                self.awaiting = None;
                messages.push("Note saved.".to_string());
            }
            None => {}
        }

        let finished = self.advance(catalog, sink, &mut messages)?;
        Ok(DialogTurn { messages, finished })
    }

    /// Walk the queue: prompt for the first missing field of the current
    /// timer, or submit it and move to the next. Returns true when the
    /// queue is exhausted and the summary has been emitted.
    fn advance(
        &mut self,
        catalog: &TimerCatalog,
        sink: &dyn TimeSink,
        messages: &mut Vec<String>,
    ) -> Result<bool> {
        loop {
            let name = match self.queue.get(self.index) {
                Some(n) => n.clone(),
                None => {
                    messages.push(self.summary());
                    return Ok(true);
                }
            };

            // Re-read the timer: fields may have been filled in since the
            // queue was captured, and the timer may be gone entirely.
            let def = match catalog.get(self.user, &name) {
                Ok(def) => def,
                Err(TimerError::NotFound { .. }) => {
                    messages.push(format!("Timer '{name}' is gone, skipping."));
                    self.index += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match (def.task_id, def.note.as_deref()) {
                (None, _) => {
                    messages.push(format!("Enter the task id for '{name}':"));
                    self.awaiting = Some(Awaiting::TaskRef);
                    return Ok(false);
                }
                (Some(_), None) => {
                    messages.push(format!("Enter a note for '{name}':"));
                    self.awaiting = Some(Awaiting::Note);
                    return Ok(false);
                }
                (Some(task_id), Some(note)) => {
                    match sink.submit_elapsed_time(
                        task_id,
                        self.crm_user,
                        def.total_seconds,
                        note,
                    ) {
                        Ok(()) => {
                            let (h, m) = split_hours_minutes(def.total_seconds);
                            messages.push(format!("Submitted '{name}': {h}h {m}m."));
                            self.submitted.push(name);
                        }
                        Err(e) => {
                            tracing::warn!(timer = %name, error = %e, "time submission failed");
                            messages.push(format!("Failed to submit '{name}': {e}"));
                            self.failed.push(name);
                        }
                    }
                    self.index += 1;
                }
            }
        }
    }

    fn summary(&self) -> String {
        if self.submitted.is_empty() && self.failed.is_empty() {
            return "Report finished. Nothing to submit.".to_string();
        }
        let mut out = String::from("Report finished.");
        if !self.submitted.is_empty() {
            out.push_str(&format!(" Submitted: {}.", self.submitted.join(", ")));
        }
        if !self.failed.is_empty() {
            out.push_str(&format!(" Failed: {}.", self.failed.join(", ")));
        }
        out
    }

    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }
}
