//! Core error types for settle-core.
//!
//! Four conditions carry domain meaning: a content-library miss, the two
//! session-contract violations, and stale recovery data. The rest is the
//! ambient storage and serialization machinery.

use thiserror::Error;

/// Core error type for settle-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A content-library lookup missed. Surfaced to the caller unchanged;
    /// nothing is substituted in place of the missing entry.
    #[error("{what} '{id}' not found in the content library")]
    NotFound { what: &'static str, id: String },

    /// `start` was called while another session is active or paused.
    #[error("a session is already in progress; finish or abandon it first")]
    SessionAlreadyActive,

    /// `start` was called with an empty activity queue.
    #[error("a session needs at least one activity")]
    EmptyQueue,

    /// `advance` was called before the current activity finished its phases.
    #[error("the current activity has not completed its phases")]
    PhaseNotComplete,

    /// An operation that needs a live session found none.
    #[error("no session is active")]
    NoActiveSession,

    /// A persisted snapshot can no longer be rebuilt. Callers recover by
    /// discarding the snapshot; this is never fatal.
    #[error("stale session snapshot: {reason}")]
    StaleSnapshot { reason: String },

    /// Storage layer failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Snapshot or event (de)serialization failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
