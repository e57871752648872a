//! Error types for gaiash.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::session::Mode;

/// Main error type for gaiash operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session-level errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// Whether this error is a transient connectivity failure.
    ///
    /// Transient errors are worth retrying after a reconnect; everything
    /// else (bad credentials, invalid configuration, protocol-state
    /// failures) is returned to the caller on first occurrence.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(e) => e.is_transient(),
            Error::Session(_) => false,
        }
    }
}

/// Transport layer errors (SSH connection, authentication, raw I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Retryable transport failures: anything except bad credentials.
    ///
    /// Retrying an authentication failure with the same credentials
    /// cannot succeed, so it is surfaced immediately.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            TransportError::AuthenticationFailed { .. } | TransportError::Key(_)
        )
    }
}

/// Session layer errors (lifecycle, mode transitions, retry exhaustion).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session not connected
    #[error("Session not connected - call connect() first")]
    NotConnected,

    /// Session already connected
    #[error("Session already connected")]
    AlreadyConnected,

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// No transition exists between the two modes
    #[error("No transition from {from} mode to {to} mode")]
    UnsupportedTransition { from: Mode, to: Mode },

    /// All retry attempts were exhausted
    #[error(
        "Operation failed after {attempts} attempts (reconnect attempted: {reconnect_attempted}): {source}"
    )]
    RetriesExhausted {
        attempts: u32,
        reconnect_attempted: bool,
        #[source]
        source: Box<Error>,
    },
}

/// Result type alias using gaiash's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_loss_is_transient() {
        assert!(Error::Transport(TransportError::Disconnected).is_transient());
        assert!(Error::Transport(TransportError::Timeout(Duration::from_secs(5))).is_transient());
    }

    #[test]
    fn credential_failures_are_not_transient() {
        let auth = Error::Transport(TransportError::AuthenticationFailed {
            user: "admin".to_string(),
        });
        assert!(!auth.is_transient());
        assert!(!Error::Transport(TransportError::Key("bad key".to_string())).is_transient());
    }

    #[test]
    fn exhaustion_is_not_retried_again() {
        let err = Error::Session(SessionError::RetriesExhausted {
            attempts: 3,
            reconnect_attempted: true,
            source: Box::new(Error::Transport(TransportError::Disconnected)),
        });
        assert!(!err.is_transient());
        let rendered = err.to_string();
        assert!(rendered.contains("3 attempts"));
        assert!(rendered.contains("reconnect attempted: true"));
    }
}
