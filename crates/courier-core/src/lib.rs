//! # courier-core
//!
//! Shared vocabulary for the Courier messaging service.
//!
//! - **Branded IDs**: [`Username`], [`Token`], [`ConnectionId`] as newtypes so a
//!   token can never be passed where a username is expected
//! - **Messages**: the immutable [`Message`] `(sender, body)` pair
//! - **Constants**: default mailbox capacity, fetch batch limit, port
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` subscriber

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;
pub mod message;

pub use ids::{ConnectionId, Token, Username};
pub use message::Message;
