//! Client error type.

use thiserror::Error;

/// Errors surfaced to the user of a [`MessengerClient`](crate::MessengerClient).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server could not be reached.
    #[error("cannot connect to server at {addr}: {reason}")]
    Unreachable {
        /// Address that was dialed.
        addr: String,
        /// Transport error.
        reason: String,
    },

    /// The session is over, either by `salir` or because the transport failed.
    #[error("disconnected from server: {reason}")]
    Disconnected {
        /// Why the session ended.
        reason: String,
    },

    /// The server answered with an error response.
    #[error("{code}: {message}")]
    Rpc {
        /// Machine-readable error code.
        code: String,
        /// Human-readable message.
        message: String,
    },

    /// No response arrived in time.
    #[error("timed out after {timeout_ms}ms waiting for {method}")]
    Timeout {
        /// How long we waited.
        timeout_ms: u64,
        /// The method that was called.
        method: String,
    },

    /// The server sent something that does not match the protocol.
    #[error("malformed response: {0}")]
    Protocol(String),

    /// The command line could not be understood.
    #[error("{0}")]
    Usage(String),
}

impl ClientError {
    /// Whether this error ends the session.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }

    /// The server error code, if this is an error response.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rpc { code, .. } => Some(code),
            _ => None,
        }
    }

    pub(crate) fn disconnected(reason: impl Into<String>) -> Self {
        Self::Disconnected {
            reason: reason.into(),
        }
    }
}
