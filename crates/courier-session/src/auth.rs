//! Token registry.
//!
//! Both directions of the token ↔ username mapping live behind one mutex,
//! so a reader never observes a token without its username or the reverse.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use courier_core::{Token, Username};
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::AuthError;

#[derive(Default)]
struct Inner {
    by_token: HashMap<Token, Username>,
    by_user: HashMap<Username, Token>,
}

/// The authenticated caller of a request.
///
/// Only produced by [`AuthRegistry::authenticate`], so holding one means the
/// token it came from was live when it was checked. The token stays attached:
/// once the user reconnects, an older identity no longer matches the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    username: Username,
    token: Token,
}

impl Identity {
    /// The caller's username.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// The token the identity was resolved from.
    pub fn token(&self) -> &Token {
        &self.token
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.username, f)
    }
}

/// Live sessions, keyed both by token and by username.
///
/// Invariant: at most one live token per username, and every live token
/// resolves to the username that registered it.
#[derive(Default)]
pub struct AuthRegistry {
    inner: Mutex<Inner>,
}

impl AuthRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token for `username`.
    ///
    /// Fails with [`AuthError::DuplicateUser`] if the username already holds
    /// a live token. The check and the insert happen under the same lock.
    pub fn register(&self, username: &Username) -> Result<Token, AuthError> {
        let mut inner = self.inner.lock();
        if inner.by_user.contains_key(username) {
            return Err(AuthError::DuplicateUser(username.clone()));
        }

        let token = loop {
            let candidate = generate_token();
            if !inner.by_token.contains_key(&candidate) {
                break candidate;
            }
        };

        let _ = inner.by_token.insert(token.clone(), username.clone());
        let _ = inner.by_user.insert(username.clone(), token.clone());
        debug!(%username, "session registered");
        Ok(token)
    }

    /// Look up the username owning `token`.
    pub fn resolve(&self, token: &Token) -> Result<Username, AuthError> {
        self.inner
            .lock()
            .by_token
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    /// Resolve `token` into a typed [`Identity`].
    pub fn authenticate(&self, token: &Token) -> Result<Identity, AuthError> {
        let username = self.resolve(token)?;
        Ok(Identity {
            username,
            token: token.clone(),
        })
    }

    /// Drop the token held by `username`. No-op if there is none.
    pub fn revoke(&self, username: &Username) {
        let mut inner = self.inner.lock();
        if let Some(token) = inner.by_user.remove(username) {
            let _ = inner.by_token.remove(&token);
            debug!(%username, "session revoked");
        }
    }

    /// End the session `identity` was resolved from.
    ///
    /// `teardown` runs under the registry lock, before the token is dropped,
    /// and only if the identity's token is still live. Returns `false` for a
    /// stale identity, leaving any newer session of the same user untouched.
    pub fn revoke_session(&self, identity: &Identity, teardown: impl FnOnce(&Username)) -> bool {
        let mut inner = self.inner.lock();
        if inner.by_token.get(&identity.token) != Some(&identity.username) {
            return false;
        }
        teardown(&identity.username);
        let _ = inner.by_token.remove(&identity.token);
        let _ = inner.by_user.remove(&identity.username);
        debug!(username = %identity.username, "session revoked");
        true
    }

    /// Usernames with a live session, in no particular order.
    pub fn usernames(&self) -> Vec<Username> {
        self.inner.lock().by_user.keys().cloned().collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().by_user.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 32 random bytes, base64url without padding.
fn generate_token() -> Token {
    let bytes: [u8; 32] = rand::random();
    Token::from_string(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    fn user(name: &str) -> Username {
        Username::from(name)
    }

    #[test]
    fn register_then_resolve() {
        let registry = AuthRegistry::new();
        let token = registry.register(&user("alice")).unwrap();
        assert_eq!(registry.resolve(&token).unwrap(), user("alice"));
    }

    #[test]
    fn duplicate_register_fails() {
        let registry = AuthRegistry::new();
        let _ = registry.register(&user("alice")).unwrap();
        assert_matches!(
            registry.register(&user("alice")),
            Err(AuthError::DuplicateUser(name)) if name.as_str() == "alice"
        );
    }

    #[test]
    fn unknown_token_is_invalid() {
        let registry = AuthRegistry::new();
        assert_eq!(
            registry.resolve(&Token::from("nope")),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn authenticate_wraps_username() {
        let registry = AuthRegistry::new();
        let token = registry.register(&user("bob")).unwrap();
        let identity = registry.authenticate(&token).unwrap();
        assert_eq!(identity.username(), &user("bob"));
        assert_eq!(identity.to_string(), "bob");
    }

    #[test]
    fn revoked_token_is_stale() {
        let registry = AuthRegistry::new();
        let token = registry.register(&user("alice")).unwrap();
        registry.revoke(&user("alice"));
        assert_eq!(registry.resolve(&token), Err(AuthError::InvalidToken));
        assert!(registry.is_empty());
    }

    #[test]
    fn revoke_is_idempotent() {
        let registry = AuthRegistry::new();
        registry.revoke(&user("ghost"));
        let _ = registry.register(&user("alice")).unwrap();
        registry.revoke(&user("alice"));
        registry.revoke(&user("alice"));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn reconnect_issues_fresh_token() {
        let registry = AuthRegistry::new();
        let first = registry.register(&user("alice")).unwrap();
        registry.revoke(&user("alice"));
        let second = registry.register(&user("alice")).unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.resolve(&first), Err(AuthError::InvalidToken));
        assert_eq!(registry.resolve(&second).unwrap(), user("alice"));
    }

    #[test]
    fn revoke_session_runs_teardown_once() {
        let registry = AuthRegistry::new();
        let token = registry.register(&user("alice")).unwrap();
        let alice = registry.authenticate(&token).unwrap();

        let mut torn_down = Vec::new();
        assert!(registry.revoke_session(&alice, |name| torn_down.push(name.clone())));
        assert!(!registry.revoke_session(&alice, |name| torn_down.push(name.clone())));
        assert_eq!(torn_down, vec![user("alice")]);
        assert_eq!(registry.resolve(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn stale_identity_leaves_new_session_alone() {
        let registry = AuthRegistry::new();
        let first = registry.register(&user("alice")).unwrap();
        let stale = registry.authenticate(&first).unwrap();
        registry.revoke(&user("alice"));
        let second = registry.register(&user("alice")).unwrap();

        let revoked = registry.revoke_session(&stale, |_| panic!("teardown of a newer session"));
        assert!(!revoked);
        assert_eq!(registry.resolve(&second).unwrap(), user("alice"));
        assert_eq!(stale.token(), &first);
    }

    #[test]
    fn tokens_are_base64url() {
        let registry = AuthRegistry::new();
        let token = registry.register(&user("alice")).unwrap();
        assert_eq!(token.len(), 43);
        assert!(!token.contains('+') && !token.contains('/') && !token.contains('='));
    }

    #[test]
    fn usernames_lists_live_sessions() {
        let registry = AuthRegistry::new();
        let _ = registry.register(&user("alice")).unwrap();
        let _ = registry.register(&user("bob")).unwrap();
        let mut names = registry.usernames();
        names.sort();
        assert_eq!(names, vec![user("alice"), user("bob")]);
    }

    #[test]
    fn concurrent_register_has_single_winner() {
        let registry = Arc::new(AuthRegistry::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.register(&Username::from("alice")))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(
            results
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, AuthError::DuplicateUser(_)))
        );
        assert_eq!(registry.len(), 1);
    }
}
