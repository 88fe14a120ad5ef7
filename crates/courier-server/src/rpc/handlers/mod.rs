//! RPC method handlers.

pub mod messenger;

use courier_rpc::errors::RpcError;
use courier_rpc::methods;
use courier_session::{AuthError, MailboxError, SessionError};

use crate::rpc::registry::MethodRegistry;

/// Register every messenger method. Connect is the only open one.
pub fn register_all(registry: &mut MethodRegistry) {
    registry.register(methods::CONNECT, messenger::ConnectHandler);
    registry.register_authenticated(methods::SEND, messenger::SendHandler);
    registry.register_authenticated(methods::FETCH, messenger::FetchHandler);
    registry.register_authenticated(methods::LIST, messenger::ListHandler);
    registry.register_authenticated(methods::DISCONNECT, messenger::DisconnectHandler);
}

/// Map a session-core failure onto its wire error.
pub(crate) fn session_error(err: SessionError) -> RpcError {
    let message = err.to_string();
    match err {
        SessionError::Auth(AuthError::DuplicateUser(_))
        | SessionError::Mailbox(MailboxError::AlreadyExists(_)) => RpcError::DuplicateUser { message },
        SessionError::Auth(AuthError::InvalidToken) => RpcError::Authentication { message },
        SessionError::Mailbox(MailboxError::NoSuchMailbox(_) | MailboxError::MailboxClosed) => {
            RpcError::NoSuchUser { message }
        }
    }
}

/// Extract a required parameter from the params object.
pub(crate) fn require_param<'a>(
    params: Option<&'a serde_json::Value>,
    key: &str,
) -> Result<&'a serde_json::Value, RpcError> {
    params
        .and_then(|p| p.get(key))
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Missing required parameter: {key}"),
        })
}

/// Extract a required string parameter.
pub(crate) fn require_string_param(
    params: Option<&serde_json::Value>,
    key: &str,
) -> Result<String, RpcError> {
    require_param(params, key)?
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| RpcError::InvalidParams {
            message: format!("Parameter '{key}' must be a string"),
        })
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::sync::Arc;

    use courier_session::{SessionConfig, SessionService};

    use crate::rpc::context::RpcContext;

    /// Build an `RpcContext` over a fresh session service.
    pub fn make_test_context() -> RpcContext {
        make_test_context_with(SessionConfig::default())
    }

    /// Build an `RpcContext` with custom mailbox sizing.
    pub fn make_test_context_with(config: SessionConfig) -> RpcContext {
        RpcContext::new(Arc::new(SessionService::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Username;
    use serde_json::json;

    #[test]
    fn register_all_registers_every_method() {
        let mut registry = MethodRegistry::new();
        register_all(&mut registry);
        for method in methods::ALL {
            assert!(registry.has_method(method), "{method} not registered");
        }
        assert_eq!(registry.methods().len(), methods::ALL.len());
    }

    #[test]
    fn session_errors_map_to_codes() {
        let dup = session_error(AuthError::DuplicateUser(Username::from("a")).into());
        let gone = session_error(MailboxError::NoSuchMailbox(Username::from("b")).into());
        let closed = session_error(MailboxError::MailboxClosed.into());
        let stale = session_error(AuthError::InvalidToken.into());
        assert_eq!(dup.code(), "DUPLICATE_USER");
        assert_eq!(gone.code(), "NO_SUCH_USER");
        assert_eq!(closed.code(), "NO_SUCH_USER");
        assert_eq!(stale.code(), "AUTHENTICATION_ERROR");
    }

    #[test]
    fn require_param_present() {
        let params = json!({"username": "alice"});
        assert_eq!(require_param(Some(&params), "username").unwrap(), "alice");
    }

    #[test]
    fn require_param_missing() {
        let params = json!({});
        let err = require_param(Some(&params), "username").unwrap_err();
        assert_eq!(err.code(), "INVALID_PARAMS");
        assert!(require_param(None, "username").is_err());
    }

    #[test]
    fn require_string_param_wrong_type() {
        let params = json!({"body": 42});
        let err = require_string_param(Some(&params), "body").unwrap_err();
        assert!(err.to_string().contains("must be a string"));
    }
}
