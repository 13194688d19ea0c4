use std::error::Error;

use clap::Subcommand;
use worklog_core::UserId;

use super::{open_router, print_messages};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's timers with totals and the day total
    Today,
    /// One timer's total, status, and report fields
    Detail {
        /// Timer name
        name: String,
    },
}

pub fn run(action: StatsAction, user: UserId) -> Result<(), Box<dyn Error>> {
    let router = open_router()?;
    match action {
        StatsAction::Today => {
            print_messages(&router.on_request_statistics(user).messages);
        }
        StatsAction::Detail { name } => {
            print_messages(&router.on_request_detail(user, &name).messages);
        }
    }
    Ok(())
}
