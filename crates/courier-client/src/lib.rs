//! # courier-client
//!
//! Client side of the Courier protocol.
//!
//! - [`MessengerClient`] dials the server, registers a username and keeps the
//!   session token in the metadata of every later call
//! - [`Command`] is the interactive command language (`obtener`, `listar`,
//!   `salir`, `<user> <message...>`)
//! - [`ClientError::Disconnected`] ends an interactive loop; every other error
//!   is printable and recoverable

#![deny(unsafe_code)]

pub mod client;
pub mod command;
pub mod errors;

pub use client::MessengerClient;
pub use command::Command;
pub use errors::ClientError;
