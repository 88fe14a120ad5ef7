//! Per-user mailboxes.
//!
//! Mailboxes sit in a sharded map, so operations on different users do not
//! contend. Callers clone the mailbox `Arc` out of the map and release the
//! shard guard before awaiting on the queue.

use std::sync::Arc;

use courier_core::{Message, Username};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::errors::MailboxError;
use crate::queue::BoundedQueue;

type Mailbox = BoundedQueue<Message>;

/// One bounded message queue per connected username.
#[derive(Default)]
pub struct MailboxStore {
    boxes: DashMap<Username, Arc<Mailbox>>,
}

impl MailboxStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty mailbox for `username`.
    pub fn create(&self, username: &Username, capacity: usize) -> Result<(), MailboxError> {
        match self.boxes.entry(username.clone()) {
            Entry::Occupied(_) => Err(MailboxError::AlreadyExists(username.clone())),
            Entry::Vacant(slot) => {
                let _ = slot.insert(Arc::new(BoundedQueue::new(capacity)));
                debug!(%username, capacity, "mailbox created");
                Ok(())
            }
        }
    }

    /// Append `message` to `username`'s mailbox, waiting while it is full.
    ///
    /// Fails with [`MailboxError::NoSuchMailbox`] if the user has no mailbox
    /// and with [`MailboxError::MailboxClosed`] if it is closed before the
    /// message lands.
    pub async fn enqueue(&self, username: &Username, message: Message) -> Result<(), MailboxError> {
        let mailbox = self.get(username)?;
        mailbox.push(message).await
    }

    /// Remove and return up to `max` of the oldest messages. Never waits.
    pub fn drain_batch(&self, username: &Username, max: usize) -> Result<Vec<Message>, MailboxError> {
        Ok(self.get(username)?.drain(max))
    }

    /// Close and remove `username`'s mailbox. No-op if there is none.
    pub fn close(&self, username: &Username) {
        if let Some((_, mailbox)) = self.boxes.remove(username) {
            mailbox.close();
            debug!(%username, "mailbox closed");
        }
    }

    /// Whether `username` currently has a mailbox.
    pub fn contains(&self, username: &Username) -> bool {
        self.boxes.contains_key(username)
    }

    /// Number of open mailboxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether no mailbox is open.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    fn get(&self, username: &Username) -> Result<Arc<Mailbox>, MailboxError> {
        self.boxes
            .get(username)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| MailboxError::NoSuchMailbox(username.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn user(name: &str) -> Username {
        Username::from(name)
    }

    fn msg(from: &str, body: &str) -> Message {
        Message::new(user(from), body)
    }

    #[test]
    fn create_twice_fails() {
        let store = MailboxStore::new();
        store.create(&user("alice"), 4).unwrap();
        assert_matches!(
            store.create(&user("alice"), 4),
            Err(MailboxError::AlreadyExists(_))
        );
    }

    #[tokio::test]
    async fn enqueue_without_mailbox_fails() {
        let store = MailboxStore::new();
        assert_matches!(
            store.enqueue(&user("nobody"), msg("bob", "hi")).await,
            Err(MailboxError::NoSuchMailbox(name)) if name.as_str() == "nobody"
        );
    }

    #[test]
    fn drain_without_mailbox_fails() {
        let store = MailboxStore::new();
        assert_matches!(
            store.drain_batch(&user("nobody"), 50),
            Err(MailboxError::NoSuchMailbox(_))
        );
    }

    #[tokio::test]
    async fn enqueue_then_drain() {
        let store = MailboxStore::new();
        store.create(&user("alice"), 4).unwrap();
        store.enqueue(&user("alice"), msg("bob", "hola")).await.unwrap();
        assert_eq!(
            store.drain_batch(&user("alice"), 50).unwrap(),
            vec![msg("bob", "hola")]
        );
        assert!(store.drain_batch(&user("alice"), 50).unwrap().is_empty());
    }

    #[tokio::test]
    async fn mailboxes_are_independent() {
        let store = MailboxStore::new();
        store.create(&user("alice"), 1).unwrap();
        store.create(&user("bob"), 1).unwrap();
        store.enqueue(&user("alice"), msg("carol", "a")).await.unwrap();
        // alice is full; bob still accepts
        store.enqueue(&user("bob"), msg("carol", "b")).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn close_removes_and_is_idempotent() {
        let store = MailboxStore::new();
        store.create(&user("alice"), 4).unwrap();
        store.close(&user("alice"));
        store.close(&user("alice"));
        assert!(!store.contains(&user("alice")));
        assert_matches!(
            store.enqueue(&user("alice"), msg("bob", "late")).await,
            Err(MailboxError::NoSuchMailbox(_))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn close_wakes_blocked_sender() {
        let store = Arc::new(MailboxStore::new());
        store.create(&user("alice"), 1).unwrap();
        store.enqueue(&user("alice"), msg("bob", "first")).await.unwrap();

        let sender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.enqueue(&user("alice"), msg("bob", "second")).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sender.is_finished());

        store.close(&user("alice"));
        assert_eq!(sender.await.unwrap(), Err(MailboxError::MailboxClosed));
    }

    #[tokio::test]
    async fn recreate_after_close_starts_empty() {
        let store = MailboxStore::new();
        store.create(&user("alice"), 4).unwrap();
        store.enqueue(&user("alice"), msg("bob", "old")).await.unwrap();
        store.close(&user("alice"));
        store.create(&user("alice"), 4).unwrap();
        assert!(store.drain_batch(&user("alice"), 50).unwrap().is_empty());
    }
}
