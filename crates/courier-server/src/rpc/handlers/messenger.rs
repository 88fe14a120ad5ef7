//! Messenger handlers: connect, send, fetch, list, disconnect.

use async_trait::async_trait;
use courier_core::Username;
use courier_rpc::errors::RpcError;
use courier_session::{MailboxError, SessionError};
use serde_json::{Value, json};
use tracing::instrument;

use crate::rpc::context::RpcContext;
use crate::rpc::handlers::{require_string_param, session_error};
use crate::rpc::middleware::{AuthenticatedHandler, Identity};
use crate::rpc::registry::{MethodHandler, RpcCall};
use crate::rpc::validation::{MAX_BODY_LENGTH, validate_string_param, validate_username};

/// Register a username and return its session token.
pub struct ConnectHandler;

#[async_trait]
impl MethodHandler for ConnectHandler {
    #[instrument(skip_all, fields(method = "messenger.connect", username))]
    async fn handle(&self, call: RpcCall, ctx: &RpcContext) -> Result<Value, RpcError> {
        let username = require_string_param(call.params.as_ref(), "username")?;
        validate_username(&username, "username")?;
        let _ = tracing::Span::current().record("username", username.as_str());

        let token = ctx
            .service
            .connect(&Username::from(username))
            .map_err(session_error)?;
        Ok(json!({ "token": token }))
    }
}

/// Queue a message for another user.
pub struct SendHandler;

#[async_trait]
impl AuthenticatedHandler for SendHandler {
    #[instrument(skip_all, fields(method = "messenger.send", username = %identity, target))]
    async fn handle(
        &self,
        identity: Identity,
        call: RpcCall,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let target = require_string_param(call.params.as_ref(), "targetUsername")?;
        let body = require_string_param(call.params.as_ref(), "body")?;
        validate_string_param(&body, "body", MAX_BODY_LENGTH)?;
        let _ = tracing::Span::current().record("target", target.as_str());

        let target = Username::from(target);
        ctx.service
            .send(&identity, &target, body)
            .await
            .map_err(|err| match err {
                // the target disconnected while we were queued behind a full mailbox
                SessionError::Mailbox(MailboxError::MailboxClosed) => RpcError::NoSuchUser {
                    message: format!("no such user: {target}"),
                },
                other => session_error(other),
            })?;
        Ok(json!({ "ok": true }))
    }
}

/// Drain a batch of the caller's pending messages.
pub struct FetchHandler;

#[async_trait]
impl AuthenticatedHandler for FetchHandler {
    #[instrument(skip_all, fields(method = "messenger.fetch", username = %identity))]
    async fn handle(
        &self,
        identity: Identity,
        _call: RpcCall,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        let messages = ctx.service.fetch(&identity).map_err(session_error)?;
        Ok(json!({ "messages": messages }))
    }
}

/// List connected usernames.
pub struct ListHandler;

#[async_trait]
impl AuthenticatedHandler for ListHandler {
    async fn handle(
        &self,
        _identity: Identity,
        _call: RpcCall,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        Ok(json!({ "usernames": ctx.service.list() }))
    }
}

/// End the caller's session.
pub struct DisconnectHandler;

#[async_trait]
impl AuthenticatedHandler for DisconnectHandler {
    #[instrument(skip_all, fields(method = "messenger.disconnect", username = %identity))]
    async fn handle(
        &self,
        identity: Identity,
        _call: RpcCall,
        ctx: &RpcContext,
    ) -> Result<Value, RpcError> {
        ctx.service.disconnect(&identity);
        Ok(json!({ "ok": true }))
    }
}
