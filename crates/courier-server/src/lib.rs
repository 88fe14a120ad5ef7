//! # courier-server
//!
//! Axum HTTP + `WebSocket` server for the Courier messaging service.
//!
//! - JSON-RPC over `WebSocket` at `/ws`, health check at `/health`
//! - Method registry with a per-call timeout
//! - Authentication middleware wrapping every method except connect
//! - Per-connection request ordering, heartbeat, and session release on close
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod health;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::CourierServer;
