//! The message exchanged between users.

use serde::{Deserialize, Serialize};

use crate::ids::Username;

/// A text message waiting in (or drained from) a mailbox.
///
/// `sender` is stamped by the server from the caller's authenticated
/// identity; clients only ever supply the target and the body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent the message.
    pub sender: Username,
    /// Message text.
    pub body: String,
}

impl Message {
    /// Create a message from `sender` with the given body.
    pub fn new(sender: Username, body: impl Into<String>) -> Self {
        Self {
            sender,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        let msg = Message::new(Username::from("bob"), "hola");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"sender": "bob", "body": "hola"}));
    }

    #[test]
    fn parses_from_wire() {
        let msg: Message = serde_json::from_value(json!({"sender": "alice", "body": "hi"})).unwrap();
        assert_eq!(msg.sender.as_str(), "alice");
        assert_eq!(msg.body, "hi");
    }
}
