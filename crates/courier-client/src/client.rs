//! `MessengerClient`: RPC over a single WebSocket.
//!
//! One background task owns the socket. Calls are handed to it over a
//! channel together with a oneshot sender; the task writes the request,
//! remembers the sender under the request id and completes it when the
//! matching response arrives. Reading continuously also answers the
//! server's heartbeat pings while the user is idle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use courier_core::constants::TOKEN_METADATA_KEY;
use courier_core::{Token, Username};
use courier_rpc::{RpcRequest, RpcResponse, methods};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, instrument, warn};

use crate::command::{Command, format_messages, format_usernames};
use crate::errors::ClientError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pending call waiting for its response.
type PendingTx = oneshot::Sender<RpcResponse>;

/// How long a call waits for its response.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(40);

const COMMAND_BUFFER: usize = 64;

struct Outgoing {
    request: RpcRequest,
    response_tx: PendingTx,
}

/// A registered session with a Courier server.
#[derive(Debug)]
pub struct MessengerClient {
    username: Username,
    token: Token,
    cmd_tx: mpsc::Sender<Outgoing>,
    next_id: AtomicU64,
    call_timeout: Duration,
    _io: JoinHandle<()>,
}

impl MessengerClient {
    /// Dial `addr` (`host:port` or a full `ws://` URL) and register as
    /// `username`. Dialing and the registration round-trip are each bounded
    /// by `timeout`.
    #[instrument(skip(username, timeout))]
    pub async fn connect(
        addr: &str,
        username: impl Into<Username>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let url = ws_url(addr);
        let (ws, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ClientError::Unreachable {
                addr: addr.to_owned(),
                reason: format!("no answer within {}ms", millis(timeout)),
            })?
            .map_err(|e| ClientError::Unreachable {
                addr: addr.to_owned(),
                reason: e.to_string(),
            })?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let io = tokio::spawn(io_loop(ws, cmd_rx));

        let username = username.into();
        let request = RpcRequest::new("0", methods::CONNECT, Some(json!({ "username": username })));
        let result = round_trip(&cmd_tx, request, timeout).await?;
        let token: Token = field(result, "token")?;
        info!(%username, "registered");

        Ok(Self {
            username,
            token,
            cmd_tx,
            next_id: AtomicU64::new(1),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            _io: io,
        })
    }

    /// Override how long calls wait for a response.
    #[must_use]
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// The registered username.
    pub fn username(&self) -> &Username {
        &self.username
    }

    /// The session token attached to every call.
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Invoke `method` with the session token attached.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id.to_string(), method, Some(params))
            .with_metadata(TOKEN_METADATA_KEY, self.token.as_str());
        round_trip(&self.cmd_tx, request, self.call_timeout).await
    }

    /// Send `body` to `target`.
    pub async fn send(&self, target: &Username, body: &str) -> Result<(), ClientError> {
        let _ = self
            .call(methods::SEND, json!({ "targetUsername": target, "body": body }))
            .await?;
        Ok(())
    }

    /// Fetch the next batch of pending messages.
    pub async fn fetch(&self) -> Result<Vec<courier_core::Message>, ClientError> {
        field(self.call(methods::FETCH, json!({})).await?, "messages")
    }

    /// List connected usernames.
    pub async fn list(&self) -> Result<Vec<Username>, ClientError> {
        field(self.call(methods::LIST, json!({})).await?, "usernames")
    }

    /// End the session.
    pub async fn disconnect(&self) -> Result<(), ClientError> {
        let _ = self.call(methods::DISCONNECT, json!({})).await?;
        Ok(())
    }

    /// Run one command line and return the text to show the user.
    ///
    /// `salir` always ends in [`ClientError::Disconnected`], whether or not
    /// the server acknowledged the disconnect.
    pub async fn execute(&self, line: &str) -> Result<String, ClientError> {
        match Command::parse(line)? {
            Command::Empty => Ok(String::new()),
            Command::Fetch => Ok(format_messages(&self.fetch().await?)),
            Command::List => Ok(format_usernames(&self.list().await?)),
            Command::Send { target, body } => {
                self.send(&target, &body).await?;
                Ok(String::new())
            }
            Command::Quit => Err(match self.disconnect().await {
                Ok(()) => ClientError::disconnected("session closed"),
                Err(e) if e.is_disconnect() => e,
                Err(e) => ClientError::disconnected(e.to_string()),
            }),
        }
    }
}

/// Hand `request` to the I/O task and wait for its response.
async fn round_trip(
    cmd_tx: &mpsc::Sender<Outgoing>,
    request: RpcRequest,
    timeout: Duration,
) -> Result<Value, ClientError> {
    let method = request.method.clone();
    let (tx, rx) = oneshot::channel();
    cmd_tx
        .send(Outgoing {
            request,
            response_tx: tx,
        })
        .await
        .map_err(|_| ClientError::disconnected("connection closed"))?;

    let response = tokio::time::timeout(timeout, rx)
        .await
        .map_err(|_| ClientError::Timeout {
            timeout_ms: millis(timeout),
            method,
        })?
        .map_err(|_| ClientError::disconnected("connection lost"))?;

    into_result(response)
}

fn into_result(response: RpcResponse) -> Result<Value, ClientError> {
    if response.success {
        return Ok(response.result.unwrap_or(Value::Null));
    }
    Err(match response.error {
        Some(body) => ClientError::Rpc {
            code: body.code,
            message: body.message,
        },
        None => ClientError::Protocol("error response without an error body".into()),
    })
}

/// Take `name` out of a result object and deserialize it.
fn field<T: DeserializeOwned>(mut result: Value, name: &str) -> Result<T, ClientError> {
    let value = result
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| ClientError::Protocol(format!("result has no '{name}'")))?;
    serde_json::from_value(value).map_err(|e| ClientError::Protocol(e.to_string()))
}

fn ws_url(addr: &str) -> String {
    if addr.starts_with("ws://") || addr.starts_with("wss://") {
        addr.to_owned()
    } else {
        format!("ws://{addr}/ws")
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

async fn io_loop(ws: WsStream, mut cmd_rx: mpsc::Receiver<Outgoing>) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<String, PendingTx> = HashMap::new();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let text = match serde_json::to_string(&cmd.request) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize request");
                        continue;
                    }
                };
                let _ = pending.insert(cmd.request.id, cmd.response_tx);
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            frame = ws_rx.next() => {
                let Some(Ok(frame)) = frame else { break };
                let Message::Text(text) = frame else { continue };
                match serde_json::from_str::<RpcResponse>(&text) {
                    Ok(response) => match pending.remove(&response.id) {
                        Some(tx) => {
                            let _ = tx.send(response);
                        }
                        None => debug!(id = %response.id, "response for unknown request"),
                    },
                    Err(e) => warn!(error = %e, "unparseable frame from server"),
                }
            }
        }
    }

    // dropping `pending` wakes every waiting call with `Disconnected`
    let _ = ws_tx.close().await;
    debug!(abandoned = pending.len(), "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn host_port_becomes_ws_url() {
        assert_eq!(ws_url("localhost:12345"), "ws://localhost:12345/ws");
        assert_eq!(ws_url("ws://10.0.0.1:9/ws"), "ws://10.0.0.1:9/ws");
    }

    #[test]
    fn success_without_result_is_null() {
        let resp = RpcResponse {
            id: "1".into(),
            success: true,
            result: None,
            error: None,
        };
        assert_eq!(into_result(resp).unwrap(), Value::Null);
    }

    #[test]
    fn error_response_maps_to_rpc_error() {
        let resp = RpcResponse::error("1", "NO_SUCH_USER", "no such user: bob");
        assert_matches!(
            into_result(resp),
            Err(ClientError::Rpc { code, message }) if code == "NO_SUCH_USER" && message == "no such user: bob"
        );
    }

    #[test]
    fn field_extracts_typed_value() {
        let names: Vec<Username> = field(json!({"usernames": ["alice"]}), "usernames").unwrap();
        assert_eq!(names, vec![Username::from("alice")]);
        assert_matches!(field::<Token>(json!({}), "token"), Err(ClientError::Protocol(_)));
    }

    #[tokio::test]
    async fn closed_io_task_means_disconnected() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        drop(cmd_rx);
        let err = round_trip(&cmd_tx, RpcRequest::new("1", methods::LIST, None), DEFAULT_CALL_TIMEOUT)
            .await
            .unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn dropped_reply_means_disconnected() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<Outgoing>(1);
        let io = tokio::spawn(async move {
            // accept the call, then lose it
            drop(cmd_rx.recv().await);
        });
        let err = round_trip(&cmd_tx, RpcRequest::new("1", methods::LIST, None), DEFAULT_CALL_TIMEOUT)
            .await
            .unwrap_err();
        io.await.unwrap();
        assert!(err.is_disconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_call_times_out() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<Outgoing>(1);
        let _keep = tokio::spawn(async move {
            let held = cmd_rx.recv().await;
            std::future::pending::<()>().await;
            drop(held);
        });
        let err = round_trip(
            &cmd_tx,
            RpcRequest::new("1", methods::FETCH, None),
            Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert_matches!(err, ClientError::Timeout { timeout_ms: 2000, method } if method == methods::FETCH);
    }

    #[tokio::test]
    async fn registration_bounded_by_connect_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            // read requests, never answer
            while let Some(Ok(_)) = ws.next().await {}
        });

        let started = std::time::Instant::now();
        let res =
            MessengerClient::connect(&addr.to_string(), "alice", Duration::from_millis(300)).await;
        assert_matches!(
            res,
            Err(ClientError::Timeout { timeout_ms: 300, method }) if method == methods::CONNECT
        );
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
