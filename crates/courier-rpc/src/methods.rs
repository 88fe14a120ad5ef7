//! Method names.

/// Register a username and obtain a session token. The only open method.
pub const CONNECT: &str = "messenger.connect";
/// Send a message to another user.
pub const SEND: &str = "messenger.send";
/// Drain a batch of the caller's pending messages.
pub const FETCH: &str = "messenger.fetch";
/// List connected usernames.
pub const LIST: &str = "messenger.list";
/// End the caller's session.
pub const DISCONNECT: &str = "messenger.disconnect";

/// Every method, connect first.
pub const ALL: [&str; 5] = [CONNECT, SEND, FETCH, LIST, DISCONNECT];
