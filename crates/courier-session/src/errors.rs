//! Error types for the session core.

use courier_core::Username;

/// Errors from [`AuthRegistry`](crate::AuthRegistry).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A live session already exists for this username.
    #[error("user {0} is already connected")]
    DuplicateUser(Username),

    /// The token is unknown or belongs to a session that has ended.
    #[error("invalid token")]
    InvalidToken,
}

/// Errors from [`MailboxStore`](crate::MailboxStore) and
/// [`BoundedQueue`](crate::BoundedQueue).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MailboxError {
    /// A mailbox already exists for this username.
    #[error("mailbox for {0} already exists")]
    AlreadyExists(Username),

    /// No mailbox exists for this username.
    #[error("no such user: {0}")]
    NoSuchMailbox(Username),

    /// The mailbox was closed before or while the message was enqueued.
    #[error("mailbox closed")]
    MailboxClosed,
}

/// Errors surfaced by [`SessionService`](crate::SessionService).
///
/// Store errors pass through unchanged.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Registry failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Mailbox failure.
    #[error(transparent)]
    Mailbox(#[from] MailboxError),
}

/// Convenience alias for session results.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_user_display() {
        let err = AuthError::DuplicateUser(Username::from("alice"));
        assert_eq!(err.to_string(), "user alice is already connected");
    }

    #[test]
    fn no_such_mailbox_display() {
        let err = MailboxError::NoSuchMailbox(Username::from("bob"));
        assert_eq!(err.to_string(), "no such user: bob");
    }

    #[test]
    fn session_error_is_transparent() {
        let err: SessionError = MailboxError::MailboxClosed.into();
        assert_eq!(err.to_string(), "mailbox closed");
        let err: SessionError = AuthError::InvalidToken.into();
        assert_eq!(err, SessionError::Auth(AuthError::InvalidToken));
    }
}
