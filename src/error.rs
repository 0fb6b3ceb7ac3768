//! Error types for Guild-Store
//!
//! This module defines the error types used throughout the store.
//! Every backend failure is normalized into [`DatabaseError`]; schema
//! violations are reported as [`ValidationError`] before any query runs.

use std::fmt;
use thiserror::Error;

/// Result type alias for Guild-Store
pub type Result<T> = std::result::Result<T, StoreError>;

/// Main error type for Guild-Store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend I/O failures, uniformly wrapped
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Write payload rejected by the table schema
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Table identifier could not be resolved
    #[error("Unknown table: '{0}'")]
    UnknownTable(String),

    /// Field access on a record with no such column or alias
    #[error("No such field '{field}' on {table}")]
    NoSuchField { table: String, field: String },

    /// A write targeted a row that no longer exists
    #[error("{table} row not found: {key}")]
    NotFound { table: String, key: String },

    /// A textual key could not be parsed into the table's key type
    #[error("Invalid key '{key}' for {table}")]
    InvalidKey { table: String, key: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown shell command
    #[error("Unknown command: '{0}'. Type /help for available commands.")]
    UnknownCommand(String),

    /// Shell command with missing or malformed arguments
    #[error("Invalid syntax for {command}. Expected: {expected}")]
    InvalidCommandSyntax { command: String, expected: String },

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Creates a NotFound error for a given table and key.
    pub fn not_found(table: impl fmt::Display, key: impl fmt::Display) -> Self {
        StoreError::NotFound {
            table: table.to_string(),
            key: key.to_string(),
        }
    }

    /// Whether this error came from the backend rather than the caller
    pub fn is_database(&self) -> bool {
        matches!(self, StoreError::Database(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(DatabaseError::from(err))
    }
}

/// The single error type for backend failures.
///
/// Constraint violations, network errors, pool timeouts and decode failures
/// all end up here. The driver error, when there is one, is kept as the source.
#[derive(Error, Debug)]
#[error("Database error: {message}")]
pub struct DatabaseError {
    message: String,
    #[source]
    source: Option<sqlx::Error>,
}

impl DatabaseError {
    /// Creates a DatabaseError with no underlying driver error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps a driver error with extra context.
    pub fn with_context(context: impl fmt::Display, err: sqlx::Error) -> Self {
        Self {
            message: format!("{}: {}", context, err),
            source: Some(err),
        }
    }

    /// Error for calls made after the pool was closed.
    pub fn closed() -> Self {
        Self::new("connection pool is closed")
    }

    /// Error for a row whose shape does not match the table schema.
    pub fn decode(column: &str, expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        Self::new(format!(
            "column '{}' decoded as {}, expected {}",
            column, found, expected
        ))
    }

    /// The error message without the "Database error" prefix
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original driver error, if any
    pub fn original(&self) -> Option<&sqlx::Error> {
        self.source.as_ref()
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        let message = match &err {
            sqlx::Error::Database(db_err) => match db_err.code() {
                Some(code) => format!("{} (SQLSTATE {})", db_err.message(), code),
                None => db_err.message().to_string(),
            },
            sqlx::Error::PoolTimedOut => "timed out acquiring a pooled connection".to_string(),
            sqlx::Error::PoolClosed => "connection pool is closed".to_string(),
            other => other.to_string(),
        };
        Self {
            message,
            source: Some(err),
        }
    }
}

/// Schema violations detected before a write is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Column does not exist on the table
    #[error("'{column}' is not a column of {table}; valid columns: {}", valid.join(", "))]
    UnknownColumn {
        table: String,
        column: String,
        valid: Vec<String>,
    },

    /// Value does not match the column's declared type
    #[error("'{column}' on {table} expects {expected}, got {found}")]
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        found: String,
    },

    /// Edits cannot move a row to a different key
    #[error("'{column}' is the primary key of {table} and cannot be edited")]
    PrimaryKey { table: String, column: String },
}

impl ValidationError {
    /// The offending column
    pub fn column(&self) -> &str {
        match self {
            ValidationError::UnknownColumn { column, .. } => column,
            ValidationError::TypeMismatch { column, .. } => column,
            ValidationError::PrimaryKey { column, .. } => column,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_column_message_lists_columns() {
        let err = ValidationError::UnknownColumn {
            table: "blacklist".to_string(),
            column: "unknown_field".to_string(),
            valid: vec!["user_id".to_string(), "blacklisted".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("unknown_field"));
        assert!(msg.contains("user_id, blacklisted"));
        assert_eq!(err.column(), "unknown_field");
    }

    #[test]
    fn test_sqlx_errors_normalize() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_database());
        match err {
            StoreError::Database(db) => {
                assert!(db.message().contains("timed out"));
                assert!(db.original().is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_closed_has_no_source() {
        let err = DatabaseError::closed();
        assert!(err.original().is_none());
        assert_eq!(err.to_string(), "Database error: connection pool is closed");
    }
}
