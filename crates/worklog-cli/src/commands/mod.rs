use std::error::Error;
use std::sync::Arc;

use worklog_core::{BitrixClient, Config, EventRouter, RecordStore, SqliteGateway};

pub mod account;
pub mod auth;
pub mod report;
pub mod stats;
pub mod timer;

/// Open the store and CRM client, wired into the event surface.
pub fn open_router() -> Result<EventRouter, Box<dyn Error>> {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteGateway::open()?);
    let config = Config::load_or_default();
    let sink = Arc::new(BitrixClient::new(&config.crm)?);
    Ok(EventRouter::new(store, sink))
}

pub fn print_messages(messages: &[String]) {
    for message in messages {
        println!("{message}");
    }
}
