//! Error types for `cadence`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Structured variants carry enough context (ticket key, offending
//!   timestamps, HTTP status/body) to diagnose a failure after the fact
//! - Data-ordering errors are never retried; remote errors are retried at
//!   the pass boundary because upserts are idempotent

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Primary error type for `cadence` operations.
#[derive(Error, Debug)]
pub enum CadenceError {
    // === Remote Errors ===
    /// Throttling retries exhausted; the enclosing sync pass must abort.
    #[error("Rate limit retries exhausted after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    /// Non-2xx, non-throttling response. Treated as non-transient: no retry.
    #[error("Remote request failed with status {status}: {body}")]
    RemoteRequestFailed { status: u16, body: String },

    /// The remote's server time could not be resolved. Fatal for delta
    /// queries (the watermark cannot be translated into server-local time);
    /// a full sync may still proceed.
    #[error("Remote server time unavailable: {reason}")]
    ServerTimeUnavailable { reason: String },

    /// HTTP transport failure (connect, TLS, timeout).
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    // === Reconciliation Errors ===
    /// Events for a ticket key were interleaved with another key's events.
    /// Contract violation of the upstream query; abort, never retry.
    #[error("History events for '{key}' are not grouped contiguously")]
    UngroupedInput { key: String },

    /// Within a key's group, an event timestamp went backwards.
    #[error("History for '{key}' is out of order: {at} follows {prev}")]
    OutOfOrderInput {
        key: String,
        prev: DateTime<Utc>,
        at: DateTime<Utc>,
    },

    /// A mean-duration computation was requested over zero tickets.
    /// Surfaced as "no data" at the report layer, never as a numeric fault.
    #[error("No tickets in the {partition} partition")]
    EmptyPartition { partition: String },

    // === Input Errors ===
    /// Timestamp or date-range argument could not be parsed.
    #[error("Invalid {field}: {reason}")]
    InvalidTimestamp { field: String, reason: String },

    /// Remote payload failed to decode into the local model.
    #[error("Malformed remote payload at {field}: {reason}")]
    MalformedPayload { field: String, reason: String },

    // === Configuration Errors ===
    /// Configuration file missing, unreadable, or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    // === Storage / I/O ===
    /// `SQLite` database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CadenceError {
    /// True when the next sync invocation may safely retry the same window.
    ///
    /// Remote failures leave the watermark untouched and upserts are
    /// idempotent, so re-running is harmless. Ordering violations indicate
    /// an upstream contract breach and must not be retried blindly.
    #[must_use]
    pub const fn is_retryable_pass(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExhausted { .. } | Self::RemoteRequestFailed { .. } | Self::Http(_)
        )
    }

    /// Exit code reported to the shell.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::ServerTimeUnavailable { .. } => 2,
            _ => 1,
        }
    }

    /// Human-friendly suggestion for fixing this error, when one exists.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::RateLimitExhausted { .. } => {
                Some("The remote is throttling; wait a few minutes and re-run the sync")
            }
            Self::ServerTimeUnavailable { .. } => {
                Some("Check the tracker URL and credentials in the connection config")
            }
            Self::Config(_) => Some("Create cadence.json or pass --config <path>"),
            Self::EmptyPartition { .. } => Some("Widen the date range"),
            _ => None,
        }
    }
}

/// Result type using `CadenceError`.
pub type Result<T> = std::result::Result<T, CadenceError>;
