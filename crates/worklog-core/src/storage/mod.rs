mod config;
pub mod gateway;
pub mod records;
pub mod sqlite;

pub use config::{Config, CrmConfig};
pub use gateway::{FieldTest, Predicate, RecordStore, Row, Table, Value};
pub use records::{
    split_hours_minutes, CategoryTag, TimerDef, UserAccount, UserId, WorkSession,
};
pub use sqlite::SqliteGateway;

use std::path::PathBuf;

/// Returns `~/.config/worklog[-dev]/` based on WORKLOG_ENV.
///
/// Set WORKLOG_ENV=dev to use a development data directory, or
/// WORKLOG_DATA_DIR to point somewhere else entirely (tests do this).
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(dir) = std::env::var("WORKLOG_DATA_DIR") {
        let dir = PathBuf::from(dir);
        std::fs::create_dir_all(&dir)?;
        return Ok(dir);
    }

    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("WORKLOG_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("worklog-dev")
    } else {
        base_dir.join("worklog")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
