//! Core error types for worklog-core.
//!
//! This module defines the error hierarchy used across the library.
//! Storage, configuration and CRM failures each get their own enum;
//! `TimerError` is the type most call sites see.

use std::path::PathBuf;
use thiserror::Error;

use chrono::{DateTime, Utc};

/// Errors raised by the record store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Insert collided with a unique constraint.
    #[error("record conflicts with an existing row in '{table}'")]
    Conflict { table: &'static str },

    /// A row was missing an expected column.
    #[error("missing column '{column}'")]
    MissingColumn { column: &'static str },

    /// A column held a value the record type cannot accept.
    #[error("bad value in column '{column}': {message}")]
    BadValue {
        column: &'static str,
        message: String,
    },

    /// Passthrough for the underlying SQLite driver.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write configuration to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("data directory unavailable: {0}")]
    DataDir(String),
}

/// Errors raised by the external CRM client.
#[derive(Error, Debug)]
pub enum CrmError {
    /// No stored tokens for the service.
    #[error("not authenticated with {service}")]
    NotAuthenticated { service: &'static str },

    /// The portal base URL is missing from the configuration.
    #[error("CRM portal URL is not configured")]
    NotConfigured,

    /// The configured portal base URL does not parse.
    #[error("invalid portal URL: {0}")]
    BadUrl(String),

    /// The refresh-token exchange was rejected.
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    /// The API answered with an error payload.
    #[error("API error: {0}")]
    Api(String),

    /// Credential store (OS keyring) failure.
    #[error("credential store error: {0}")]
    Credentials(String),

    /// Transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the timer catalog and session tracker.
#[derive(Error, Debug)]
pub enum TimerError {
    #[error("timer '{name}' not found")]
    NotFound { name: String },

    #[error("timer '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("timer '{name}' is already running")]
    AlreadyRunning { name: String },

    #[error("timer '{name}' is not running")]
    NotRunning { name: String },

    /// The clock went backwards between start and stop.
    #[error("clock anomaly: session started {started_at} but stopped {ended_at}")]
    ClockAnomaly {
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    },

    /// More than one open session for a single timer. Must never happen
    /// while mutations are serialized per user.
    #[error("{count} open sessions found for timer '{name}'")]
    OpenSessionInvariant { name: String, count: usize },

    #[error("unknown category tag {0}")]
    UnknownCategory(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for TimerError.
pub type Result<T, E = TimerError> = std::result::Result<T, E>;
