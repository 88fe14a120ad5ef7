//! Session operations.
//!
//! Per username: `Unconnected → Connected → Disconnected`. A disconnected
//! user is indistinguishable from one that never connected, so a fresh
//! `connect` starts over.

use std::sync::Arc;

use courier_core::constants::{DEFAULT_BATCH_LIMIT, DEFAULT_MAILBOX_CAPACITY};
use courier_core::{Message, Token, Username};
use tracing::{debug, info, instrument};

use crate::auth::{AuthRegistry, Identity};
use crate::errors::{AuthError, Result};
use crate::mailbox::MailboxStore;

/// Sizing for the mailboxes the service creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Messages a mailbox holds before senders wait.
    pub mailbox_capacity: usize,
    /// Maximum messages returned by one fetch.
    pub batch_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// The five messaging operations, orchestrating the shared stores.
pub struct SessionService {
    registry: Arc<AuthRegistry>,
    mailboxes: Arc<MailboxStore>,
    config: SessionConfig,
}

impl SessionService {
    /// Create a service with fresh, empty stores.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_stores(
            Arc::new(AuthRegistry::new()),
            Arc::new(MailboxStore::new()),
            config,
        )
    }

    /// Create a service over existing stores.
    pub fn with_stores(
        registry: Arc<AuthRegistry>,
        mailboxes: Arc<MailboxStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            registry,
            mailboxes,
            config,
        }
    }

    /// Register `username` and open its mailbox.
    ///
    /// If the mailbox cannot be created the registry entry is rolled back,
    /// leaving no trace of the attempt.
    #[instrument(skip(self), fields(%username))]
    pub fn connect(&self, username: &Username) -> Result<Token> {
        let token = self.registry.register(username)?;
        if let Err(err) = self.mailboxes.create(username, self.config.mailbox_capacity) {
            self.registry.revoke(username);
            return Err(err.into());
        }
        info!("user connected");
        Ok(token)
    }

    /// Turn a token from call metadata into the caller's identity.
    pub fn authenticate(&self, token: &Token) -> std::result::Result<Identity, AuthError> {
        self.registry.authenticate(token)
    }

    /// Queue `body` for `target`, stamped with the caller as sender.
    ///
    /// Waits while the target's mailbox is full; dropping the future
    /// abandons the wait.
    #[instrument(skip(self, identity, body), fields(sender = %identity, %target))]
    pub async fn send(&self, identity: &Identity, target: &Username, body: String) -> Result<()> {
        let message = Message::new(identity.username().clone(), body);
        self.mailboxes.enqueue(target, message).await?;
        Ok(())
    }

    /// Drain the caller's oldest messages, up to the batch limit.
    pub fn fetch(&self, identity: &Identity) -> Result<Vec<Message>> {
        Ok(self
            .mailboxes
            .drain_batch(identity.username(), self.config.batch_limit)?)
    }

    /// Usernames currently connected, in no particular order.
    pub fn list(&self) -> Vec<Username> {
        self.registry.usernames()
    }

    /// End the caller's session.
    ///
    /// The mailbox is closed first so blocked senders are released before
    /// the username becomes available again. Both steps happen while the
    /// registry confirms the identity's token is still the live one, so an
    /// identity from before a reconnect cannot end the newer session.
    #[instrument(skip(self, identity), fields(username = %identity))]
    pub fn disconnect(&self, identity: &Identity) {
        let ended = self
            .registry
            .revoke_session(identity, |username| self.mailboxes.close(username));
        if ended {
            info!("user disconnected");
        } else {
            debug!("session already ended");
        }
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Configured sizing.
    pub fn config(&self) -> SessionConfig {
        self.config
    }
}

impl Default for SessionService {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
