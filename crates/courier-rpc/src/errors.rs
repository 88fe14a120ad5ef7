//! RPC error codes and error type.

use crate::types::RpcErrorBody;

// ── Error code constants ────────────────────────────────────────────

/// Invalid or missing parameters, or an unparseable request.
pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
/// Method not found in the registry.
pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
/// Unexpected internal error.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
/// The handler did not finish within the request timeout.
pub const TIMEOUT: &str = "TIMEOUT";
/// Missing, malformed, or stale session token.
pub const AUTHENTICATION_ERROR: &str = "AUTHENTICATION_ERROR";
/// The username already has a live session.
pub const DUPLICATE_USER: &str = "DUPLICATE_USER";
/// The target username has no live session.
pub const NO_SUCH_USER: &str = "NO_SUCH_USER";

/// RPC error type returned by handlers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    /// Required parameter missing or wrong type.
    #[error("{message}")]
    InvalidParams {
        /// Description of what is wrong.
        message: String,
    },

    /// The call carried no usable session token.
    #[error("{message}")]
    Authentication {
        /// Description.
        message: String,
    },

    /// Connect under a username that is already connected.
    #[error("{message}")]
    DuplicateUser {
        /// Description.
        message: String,
    },

    /// Send to a username that is not connected.
    #[error("{message}")]
    NoSuchUser {
        /// Description.
        message: String,
    },

    /// Internal server error.
    #[error("{message}")]
    Internal {
        /// Description.
        message: String,
    },
}

impl RpcError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::Authentication { .. } => AUTHENTICATION_ERROR,
            Self::DuplicateUser { .. } => DUPLICATE_USER,
            Self::NoSuchUser { .. } => NO_SUCH_USER,
            Self::Internal { .. } => INTERNAL_ERROR,
        }
    }

    /// Convert to the wire-format error body.
    pub fn to_error_body(&self) -> RpcErrorBody {
        RpcErrorBody {
            code: self.code().to_owned(),
            message: self.to_string(),
        }
    }
}
