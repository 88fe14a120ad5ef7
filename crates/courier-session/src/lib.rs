//! # courier-session
//!
//! The stateful core of the Courier messaging service.
//!
//! - [`AuthRegistry`]: token ↔ username map, one live session per username
//! - [`BoundedQueue`]: FIFO buffer with blocking push, non-blocking drain,
//!   and an explicit closed state
//! - [`MailboxStore`]: one bounded queue per connected username
//! - [`SessionService`]: connect / send / fetch / list / disconnect built on
//!   the two stores
//!
//! The registry and the store are the only shared mutable state. The
//! service keeps none of its own.

#![deny(unsafe_code)]

pub mod auth;
pub mod errors;
pub mod mailbox;
pub mod queue;
pub mod service;

pub use auth::{AuthRegistry, Identity};
pub use errors::{AuthError, MailboxError, SessionError};
pub use mailbox::MailboxStore;
pub use queue::BoundedQueue;
pub use service::{SessionConfig, SessionService};
