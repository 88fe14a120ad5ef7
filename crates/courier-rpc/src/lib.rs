//! # courier-rpc
//!
//! Wire protocol shared by the Courier server and client.
//!
//! - **Envelopes**: [`RpcRequest`] / [`RpcResponse`] carried as JSON text frames
//! - **Metadata**: per-call, multi-valued key/value pairs ([`Metadata`])
//! - **Methods**: the `messenger.*` method names
//! - **Errors**: machine-readable codes and the [`RpcError`] handler error type

#![deny(unsafe_code)]

pub mod errors;
pub mod methods;
pub mod types;

pub use errors::RpcError;
pub use types::{Metadata, RpcErrorBody, RpcRequest, RpcResponse};
