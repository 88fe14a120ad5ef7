//! Authentication middleware.
//!
//! Handlers that need a caller implement [`AuthenticatedHandler`], whose
//! signature takes an [`Identity`]. The only way to turn one into a
//! [`MethodHandler`] is to wrap it in [`Authenticated`], which resolves the
//! identity from the call's `token` metadata first. An authenticated
//! operation therefore cannot be registered without the check.

use async_trait::async_trait;
use courier_core::Token;
use courier_core::constants::TOKEN_METADATA_KEY;
use courier_rpc::errors::RpcError;
use courier_rpc::types::Metadata;
use courier_session::SessionService;
use serde_json::Value;
use tracing::debug;

pub use courier_session::Identity;

use crate::rpc::context::RpcContext;
use crate::rpc::registry::{MethodHandler, RpcCall};

/// A handler that runs on behalf of an authenticated caller.
#[async_trait]
pub trait AuthenticatedHandler: Send + Sync {
    /// Execute the handler for `identity`.
    async fn handle(
        &self,
        identity: Identity,
        call: RpcCall,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError>;
}

/// Decorator that authenticates a call before handing it to `H`.
pub struct Authenticated<H> {
    inner: H,
}

impl<H> Authenticated<H> {
    /// Wrap `inner`.
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<H: AuthenticatedHandler> MethodHandler for Authenticated<H> {
    async fn handle(&self, call: RpcCall, ctx: &RpcContext) -> Result<Value, RpcError> {
        let identity = authenticate(&call.metadata, &ctx.service)?;
        self.inner.handle(identity, call, ctx).await
    }
}

/// Extract the single session token from call metadata.
pub fn extract_token(metadata: &Metadata) -> Result<Token, RpcError> {
    match metadata.get(TOKEN_METADATA_KEY).map(Vec::as_slice) {
        Some([token]) => Ok(Token::from(token.as_str())),
        None | Some([]) => Err(RpcError::Authentication {
            message: "missing session token".into(),
        }),
        Some(values) => Err(RpcError::Authentication {
            message: format!("expected one session token, got {}", values.len()),
        }),
    }
}

/// Resolve the caller's identity from call metadata.
pub fn authenticate(metadata: &Metadata, service: &SessionService) -> Result<Identity, RpcError> {
    let token = extract_token(metadata)?;
    service.authenticate(&token).map_err(|err| {
        debug!(error = %err, "rejected call");
        RpcError::Authentication {
            message: err.to_string(),
        }
    })
}
