//! Error types for mysql-session.

use thiserror::Error;

/// Result type for mysql-session operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Server error code for a lock wait timeout.
pub const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;

/// Server error code for a deadlock.
pub const ER_LOCK_DEADLOCK: u16 = 1213;

/// Server error code reported when a new command is issued while a result
/// set is still pending on the link.
pub const CR_COMMANDS_OUT_OF_SYNC: u16 = 2014;

/// A server-reported error: numeric code, SQLSTATE and message, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServerError {
    /// Numeric error code (e.g. 1213 for a deadlock).
    pub code: u16,
    /// Five-character SQLSTATE string.
    pub state: String,
    /// Human-readable message text.
    pub message: String,
}

impl ServerError {
    /// Build a server error from its three fields.
    pub fn new(code: u16, state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            state: state.into(),
            message: message.into(),
        }
    }

    /// True for the two codes that denote a transient lock condition
    /// (deadlock or lock wait timeout), which the synchronous query path
    /// retries before surfacing.
    pub fn is_transient_lock(&self) -> bool {
        matches!(self.code, ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK)
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.state.is_empty() {
            write!(f, " (SQLSTATE {})", self.state)?;
        }
        write!(f, " [{}]", self.code)
    }
}

/// Error type for mysql-session.
#[derive(Debug, Error)]
pub enum Error {
    /// The initial handshake reported a nonzero error code; the connection
    /// is unusable.
    #[error("connect failed: {0}")]
    Connect(ServerError),

    /// A query failed with a non-transient error, or a transient lock error
    /// survived every retry attempt.
    #[error("query failed: {0}")]
    Query(ServerError),

    /// Statement compilation failed.
    #[error("prepare failed: {0}")]
    Prepare(ServerError),

    /// A bind type signature contains an unrecognized type code.
    #[error("invalid binding: {0}")]
    InvalidBinding(String),

    /// Bound values disagree with the type signature or with the statement's
    /// required parameter count.
    #[error("arity mismatch: {0}")]
    ArityMismatch(String),

    /// A statement was used after its owning connection was released or
    /// closed.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    /// Invalid usage (e.g., nested transactions)
    #[error("invalid usage: {0}")]
    InvalidUsage(String),
}

impl Error {
    /// Get the server-reported fields if this error carries them.
    pub fn server(&self) -> Option<&ServerError> {
        match self {
            Error::Connect(e) | Error::Query(e) | Error::Prepare(e) => Some(e),
            _ => None,
        }
    }

    /// Get the server error code if this is a server-reported error.
    pub fn code(&self) -> Option<u16> {
        self.server().map(|e| e.code)
    }

    /// Get the SQLSTATE string if this is a server-reported error.
    pub fn sqlstate(&self) -> Option<&str> {
        self.server().map(|e| e.state.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_lock_codes() {
        assert!(ServerError::new(1205, "HY000", "lock wait timeout").is_transient_lock());
        assert!(ServerError::new(1213, "40001", "deadlock found").is_transient_lock());
        assert!(!ServerError::new(1064, "42000", "syntax error").is_transient_lock());
    }

    #[test]
    fn test_code_accessor() {
        let err = Error::Query(ServerError::new(1064, "42000", "syntax error"));
        assert_eq!(err.code(), Some(1064));
        assert_eq!(err.sqlstate(), Some("42000"));
        assert!(Error::InvalidUsage("nested".into()).code().is_none());
    }
}
