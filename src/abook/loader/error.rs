use std::path::PathBuf;

use thiserror::Error;

use crate::abook::loader::model::SyncPhase;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Error type covering the different failure cases that can occur when the
/// loader parses an export, previews it, or pushes it into the directory.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Wrapper for IO failures such as reading the export or writing previews.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when an encoded attribute value cannot be decoded.
    #[error("invalid value for '{key}' on line {line}: {reason}")]
    InvalidValue {
        line: usize,
        key: String,
        reason: String,
    },

    /// The directory server could not be reached.
    #[error("failed to connect to LDAP server at {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The directory server rejected the bind credentials.
    #[error("failed to bind to LDAP server as {bind_dn}: {reason}")]
    Auth { bind_dn: String, reason: String },

    /// A search against the directory failed.
    #[error("failed to search entries under {base}: {reason}")]
    Search { base: String, reason: String },

    /// Deleting an existing entry failed; the remaining deletes were skipped.
    #[error("failed to delete entry {dn}: {reason}")]
    Delete { dn: String, reason: String },

    /// Adding a new entry failed; the remaining adds were skipped.
    #[error("failed to add entry {dn}: {reason}")]
    Add { dn: String, reason: String },

    /// The user stopped the run.
    #[error("operation canceled by user while {phase}")]
    Canceled { phase: SyncPhase },

    /// A required connection setting was left empty.
    #[error("missing directory setting: {0}")]
    MissingConfig(&'static str),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when a load would only clear the target unit.
    #[error("no records found in {0}; pass --allow-empty to clear the unit anyway")]
    EmptyInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl LoaderError {
    /// Returns `true` when the error represents a user-requested stop rather
    /// than a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, LoaderError::Canceled { .. })
    }
}
