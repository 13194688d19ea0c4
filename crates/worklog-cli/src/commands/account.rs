use std::error::Error;

use clap::Subcommand;
use worklog_core::UserId;

use super::{open_router, print_messages};

#[derive(Subcommand)]
pub enum AccountAction {
    /// Attach a CRM user id and display name to this chat id
    Link {
        /// CRM user id that submitted time is booked under
        crm_id: i64,
        /// Display name
        name: String,
    },
    /// Print the stored account as JSON
    Show,
}

pub fn run(action: AccountAction, user: UserId) -> Result<(), Box<dyn Error>> {
    let router = open_router()?;
    match action {
        AccountAction::Link { crm_id, name } => {
            print_messages(&router.on_link_account(user, crm_id, &name).messages);
        }
        AccountAction::Show => match router.account(user)? {
            Some(account) => println!("{}", serde_json::to_string_pretty(&account)?),
            None => println!("No linked account."),
        },
    }
    Ok(())
}
