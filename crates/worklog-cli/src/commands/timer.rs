use std::error::Error;

use clap::Subcommand;
use worklog_core::UserId;

use super::{open_router, print_messages};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Create a timer for today
    New {
        /// Timer name
        name: String,
        /// CRM task id to pre-fill
        #[arg(long)]
        task: Option<i64>,
        /// Category tag: 3 = qc, 2 = non-qc, 1 = bugs, 0 = none
        #[arg(long, default_value_t = 0)]
        tag: i64,
    },
    /// Start a work session on a timer
    Start { name: String },
    /// Stop the open session on a timer
    Stop { name: String },
    /// Close every open session and show the greeting
    StopAll,
    /// Add minutes to a timer without running a session
    Add { name: String, minutes: i64 },
    /// Delete a timer and its session history
    Delete { name: String },
    /// List today's timers, one label per line
    List,
}

pub fn run(action: TimerAction, user: UserId) -> Result<(), Box<dyn Error>> {
    let router = open_router()?;
    match action {
        TimerAction::New { name, task, tag } => {
            print_messages(&router.on_create_timer(user, &name, task, tag).messages);
        }
        TimerAction::Start { name } => {
            print_messages(&router.on_start_timer(user, &name).messages);
        }
        TimerAction::Stop { name } => {
            print_messages(&router.on_stop_timer(user, &name).messages);
        }
        TimerAction::StopAll => {
            print_messages(&router.on_reset_sessions(user).messages);
        }
        TimerAction::Add { name, minutes } => {
            print_messages(&router.on_add_minutes(user, &name, minutes).messages);
        }
        TimerAction::Delete { name } => {
            print_messages(&router.on_delete_timer(user, &name).messages);
        }
        TimerAction::List => {
            for def in router.catalog().list_today(user)? {
                println!("{}", def.label());
            }
        }
    }
    Ok(())
}
