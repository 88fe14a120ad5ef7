//! Method registry and async dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_rpc::errors::{self, RpcError};
use courier_rpc::types::{Metadata, RpcRequest, RpcResponse};
use serde_json::Value;
use tracing::{error, warn};

use crate::rpc::context::RpcContext;
use crate::rpc::middleware::{Authenticated, AuthenticatedHandler};

/// Default upper bound on a single handler call.
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(30);

/// The parts of a request a handler sees.
#[derive(Clone, Debug, Default)]
pub struct RpcCall {
    /// Parameters object, if any.
    pub params: Option<Value>,
    /// Out-of-band call metadata.
    pub metadata: Metadata,
}

impl From<RpcRequest> for RpcCall {
    fn from(request: RpcRequest) -> Self {
        Self {
            params: request.params,
            metadata: request.metadata,
        }
    }
}

/// Trait implemented by every RPC method handler.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    /// Execute the handler with the given call and context.
    async fn handle(&self, call: RpcCall, ctx: &RpcContext) -> Result<Value, RpcError>;
}

/// Registry mapping method names to handlers.
pub struct MethodRegistry {
    handlers: HashMap<String, Arc<dyn MethodHandler>>,
    timeout: Duration,
}

impl MethodRegistry {
    /// Create an empty registry with the default handler timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_HANDLER_TIMEOUT)
    }

    /// Create an empty registry whose handlers are cut off after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            handlers: HashMap::new(),
            timeout,
        }
    }

    /// Register a handler reachable without authentication.
    pub fn register(&mut self, method: &str, handler: impl MethodHandler + 'static) {
        let _ = self.handlers.insert(method.to_owned(), Arc::new(handler));
    }

    /// Register a handler behind the auth middleware.
    pub fn register_authenticated(
        &mut self,
        method: &str,
        handler: impl AuthenticatedHandler + 'static,
    ) {
        self.register(method, Authenticated::new(handler));
    }

    /// Dispatch a request to the appropriate handler.
    ///
    /// On timeout the handler future is dropped, which abandons any wait
    /// inside it.
    pub async fn dispatch(&self, request: RpcRequest, ctx: &RpcContext) -> RpcResponse {
        let method = request.method.clone();
        let id = request.id.clone();

        let Some(handler) = self.handlers.get(&method) else {
            return RpcResponse::error(
                id,
                errors::METHOD_NOT_FOUND,
                format!("Method '{method}' not found"),
            );
        };

        let start = std::time::Instant::now();
        let result = tokio::time::timeout(self.timeout, handler.handle(request.into(), ctx)).await;

        let response = match result {
            Ok(Ok(result)) => RpcResponse::success(id, result),
            Ok(Err(err)) => RpcResponse {
                id,
                success: false,
                result: None,
                error: Some(err.to_error_body()),
            },
            Err(_elapsed) => {
                error!(method, "RPC handler timed out after {:?}", self.timeout);
                RpcResponse::error(
                    id,
                    errors::TIMEOUT,
                    format!("Handler for '{method}' timed out"),
                )
            }
        };

        let duration = start.elapsed();
        if duration.as_secs() >= 5 {
            warn!(
                method,
                duration_secs = duration.as_secs_f64(),
                "slow RPC request"
            );
        }

        response
    }

    /// List all registered method names (sorted).
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check whether a method is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
