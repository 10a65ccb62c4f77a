//! Database error types.

use derive_more::{Display, Error};
use tracing::instrument;

use crate::game::MalformedBoard;

/// Category of a [`DbError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DbErrorKind {
    /// The game or its record does not exist.
    #[display("not found")]
    NotFound,
    /// The record changed since it was read.
    #[display("conflict")]
    Conflict,
    /// A persisted value could not be decoded.
    #[display("corrupt record")]
    Corrupt,
    /// Any other storage failure.
    #[display("storage")]
    Storage,
}

/// Database error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Database error ({}): {} at {}:{}", kind, message, file, line)]
pub struct DbError {
    /// Error category.
    pub kind: DbErrorKind,
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl DbError {
    /// Creates a new storage error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Storage, message)
    }

    /// Creates a not-found error.
    #[track_caller]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::NotFound, message)
    }

    /// Creates a revision-conflict error.
    #[track_caller]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Conflict, message)
    }

    /// Creates a corrupt-record error.
    #[track_caller]
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::with_kind(DbErrorKind::Corrupt, message)
    }

    #[track_caller]
    fn with_kind(kind: DbErrorKind, message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Whether this error reports a missing game or record.
    pub fn is_not_found(&self) -> bool {
        self.kind == DbErrorKind::NotFound
    }

    /// Whether this error reports a stale revision.
    pub fn is_conflict(&self) -> bool {
        self.kind == DbErrorKind::Conflict
    }
}

impl From<diesel::result::Error> for DbError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::not_found("Record not found"),
            other => Self::new(format!("Diesel error: {}", other)),
        }
    }
}

impl From<diesel::ConnectionError> for DbError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::new(format!("Connection error: {}", err))
    }
}

impl From<MalformedBoard> for DbError {
    #[track_caller]
    fn from(err: MalformedBoard) -> Self {
        Self::corrupt(err.to_string())
    }
}
