//! Error types for SimpleDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using DbError
pub type Result<T> = std::result::Result<T, DbError>;

/// Unified error type for SimpleDB operations
#[derive(Debug, Error)]
pub enum DbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer closed the stream before sending a tag byte.
    #[error("client disconnected")]
    Disconnect,

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// Malformed framing: the stream can no longer be trusted.
    #[error("protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Command Errors
    // -------------------------------------------------------------------------
    /// Recoverable, client-visible failure of a single request.
    #[error("{0}")]
    Command(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Error reply received from a server.
    #[error("server error: {0}")]
    Server(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DbError {
    /// Shorthand for a command error
    pub fn command(message: impl Into<String>) -> Self {
        DbError::Command(message.into())
    }

    /// Shorthand for a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        DbError::Protocol(message.into())
    }

    /// Domain errors are answered with an error reply and never end a session.
    pub fn is_command_error(&self) -> bool {
        matches!(self, DbError::Command(_) | DbError::KeyNotFound(_))
    }
}
