//! WebSocket transport: connection state, message dispatch, per-connection loop.

pub mod connection;
pub mod handler;
pub mod session;
