//! Input validation helpers for RPC parameters.

use courier_rpc::errors::RpcError;

/// Maximum username length in bytes.
pub const MAX_USERNAME_LENGTH: usize = 64;

/// Maximum message body length in bytes.
pub const MAX_BODY_LENGTH: usize = 16 * 1024;

/// Validate that a string parameter does not exceed `max_len` bytes.
pub fn validate_string_param(value: &str, name: &str, max_len: usize) -> Result<(), RpcError> {
    if value.len() > max_len {
        return Err(RpcError::InvalidParams {
            message: format!(
                "Parameter '{name}' exceeds maximum length ({} > {max_len})",
                value.len()
            ),
        });
    }
    Ok(())
}

/// Validate a username.
///
/// Usernames are the first word of a send command, so they may not be
/// empty or contain whitespace.
pub fn validate_username(value: &str, name: &str) -> Result<(), RpcError> {
    if value.is_empty() {
        return Err(RpcError::InvalidParams {
            message: format!("Parameter '{name}' must not be empty"),
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(RpcError::InvalidParams {
            message: format!("Parameter '{name}' must not contain whitespace"),
        });
    }
    validate_string_param(value, name, MAX_USERNAME_LENGTH)
}
