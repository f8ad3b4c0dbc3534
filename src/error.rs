//! Error types for ssh-session.

use std::time::Duration;

use thiserror::Error;

/// Main error type for session operations.
///
/// A command that exits non-zero is not an error: it is returned as a
/// [`CommandResult`](crate::CommandResult) whose `failure()` is true. Only
/// infrastructure faults end up here.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Invalid construction arguments.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Operation attempted while the session has no open connection.
    #[error("session is not connected")]
    NotConnected,

    /// `open` called on a session that is already open.
    #[error("session is already connected")]
    AlreadyConnected,

    /// Invalid connection state transition attempted.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::session::ConnectionState,
        to: crate::session::ConnectionState,
    },

    /// Command did not finish before the session deadline.
    #[error("command timed out after {}s: {command}", .after.as_secs_f64())]
    Timeout { command: String, after: Duration },

    /// Connection could not be established in time.
    #[error("connection timed out after {}s", .0.as_secs_f64())]
    ConnectTimeout(Duration),

    /// A blocking operation run through `with_timeout` did not finish.
    #[error("operation timed out after {}s", .0.as_secs_f64())]
    Elapsed(Duration),

    /// Failure in the underlying connection or shell.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Command output could not be interpreted.
    #[error("output parse error: {0}")]
    Parse(String),
}

impl SessionError {
    /// Whether this error is a command or connect deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectTimeout(_) | Self::Elapsed(_)
        )
    }

    /// Whether this error is a violated precondition (session state).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::AlreadyConnected | Self::InvalidStateTransition { .. }
        )
    }
}

/// Convenience Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_display() {
        let err = SessionError::Configuration("timeout must be positive".into());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("timeout must be positive"));
    }

    #[test]
    fn test_timeout_display() {
        let err = SessionError::Timeout {
            command: "sleep 10".into(),
            after: Duration::from_secs(1),
        };
        assert_eq!(err.to_string(), "command timed out after 1s: sleep 10");
        assert!(err.is_timeout());
        assert!(!err.is_precondition());
    }

    #[test]
    fn test_connect_timeout_is_timeout() {
        let err = SessionError::ConnectTimeout(Duration::from_millis(500));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("0.5s"));
    }

    #[test]
    fn test_precondition_errors() {
        assert!(SessionError::NotConnected.is_precondition());
        assert!(SessionError::AlreadyConnected.is_precondition());
        assert!(!SessionError::Transport("eof".into()).is_precondition());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: SessionError = io_err.into();
        assert!(matches!(err, SessionError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_transport_display() {
        let err = SessionError::Transport("remote shell closed".into());
        assert_eq!(err.to_string(), "transport error: remote shell closed");
    }
}
