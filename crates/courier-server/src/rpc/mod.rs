//! RPC layer: handler registry, auth middleware, and the messenger handlers.

pub mod context;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod validation;

pub use courier_rpc::{errors, methods, types};
