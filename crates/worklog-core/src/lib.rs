//! # Worklog Core Library
//!
//! This library provides the core business logic for the Worklog time
//! tracker. It implements a CLI-first philosophy where all operations are
//! available via a standalone CLI binary, with any chat transport being a
//! thin event layer over the same core library.
//!
//! ## Architecture
//!
//! - **Timer Catalog**: Per-user, per-day named timers with accumulated totals
//! - **Session Tracker**: Wall-clock work sessions, at most one open per timer
//! - **Report Dialog**: Step-by-step collection of task ids and notes, then
//!   one submission per timer to the CRM
//! - **Storage**: SQLite-backed record store and TOML-based configuration
//! - **CRM**: Bitrix24 time submission with OAuth token refresh
//!
//! ## Key Components
//!
//! - [`EventRouter`]: Inbound event surface, one handler per user action
//! - [`TimerCatalog`] / [`SessionTracker`]: Timer lifecycle
//! - [`ReportDialog`]: Report submission state machine
//! - [`BitrixClient`]: CRM client implementing [`TimeSink`]
//! - [`Config`]: Application configuration management

pub mod timer;
pub mod storage;
pub mod stats;
pub mod report;
pub mod router;
pub mod crm;
pub mod error;

pub use timer::{SessionTracker, StopSummary, TimerCatalog};
pub use storage::{
    CategoryTag, Config, CrmConfig, RecordStore, SqliteGateway, TimerDef, UserAccount, UserId,
    WorkSession,
};
pub use stats::StatisticsEngine;
pub use report::{DialogStart, DialogTurn, ReportDialog};
pub use router::{ControlSurface, EventRouter, Reply};
pub use crm::{BitrixClient, BitrixTokens, TimeSink};
pub use error::{ConfigError, CrmError, StoreError, TimerError};
