//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.
//!
//! Three tasks share one connection:
//! - the reader (this task) turns frames into queued requests
//! - the processor routes queued requests: `messenger.send` calls go through
//!   a single lane that runs them one at a time in arrival order, every
//!   other call runs on its own task
//! - the writer forwards responses and sends heartbeat pings
//!
//! A send blocked on a full mailbox therefore holds up only later sends from
//! the same connection. Responses may leave out of request order; clients
//! match them by id.
//!
//! A `closed` token ties the tasks together. It fires when the socket ends,
//! the heartbeat gives up, or the server shuts down; the processor then
//! drops its in-flight requests, which abandons any blocked send.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use courier_core::{ConnectionId, Token};
use courier_rpc::methods;
use courier_session::SessionService;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use super::connection::{ClientConnection, ConnectionRegistry};
use super::handler::handle_message;
use crate::config::ServerConfig;
use crate::rpc::context::RpcContext;
use crate::rpc::registry::MethodRegistry;

/// Responses waiting to be written.
const OUTBOUND_BUFFER: usize = 256;

/// Requests read but not yet dispatched.
const REQUEST_BUFFER: usize = 64;

/// Run a WebSocket session for a connected client.
#[instrument(skip_all, fields(conn_id = %conn_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    conn_id: ConnectionId,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    connections: Arc<ConnectionRegistry>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let connection = Arc::new(ClientConnection::new(conn_id.clone(), send_tx));
    connections.add(Arc::clone(&connection));
    info!("client connected");

    let closed = shutdown.child_token();

    let outbound = tokio::spawn(
        forward_outbound(
            ws_tx,
            send_rx,
            Arc::clone(&connection),
            config.heartbeat_interval,
            config.heartbeat_timeout,
            closed.clone(),
        )
        .in_current_span(),
    );

    let (request_tx, request_rx) = mpsc::channel::<String>(REQUEST_BUFFER);
    let processor = tokio::spawn(
        process_requests(
            request_rx,
            registry,
            Arc::clone(&ctx),
            Arc::clone(&connection),
            closed.clone(),
        )
        .in_current_span(),
    );

    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = closed.cancelled() => break,
        };
        let Some(Ok(msg)) = frame else { break };

        let text = match msg {
            Message::Text(t) => Some(t.to_string()),
            Message::Binary(data) => {
                if let Ok(s) = std::str::from_utf8(&data) {
                    Some(s.to_owned())
                } else {
                    info!(len = data.len(), "received non-UTF8 binary frame");
                    None
                }
            }
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {
                connection.mark_alive();
                None
            }
        };

        let Some(text) = text else { continue };
        connection.mark_alive();

        let queued = tokio::select! {
            res = request_tx.send(text) => res.is_ok(),
            () = closed.cancelled() => false,
        };
        if !queued {
            break;
        }
    }

    closed.cancel();
    drop(request_tx);
    let _ = processor.await;
    outbound.abort();
    let _ = connections.remove(&conn_id);

    if config.release_on_close {
        release_sessions(&connection, &ctx.service);
    }
    info!(
        age_secs = connection.age().as_secs(),
        dropped = connection.drop_count(),
        "client disconnected"
    );
}

/// Route queued requests until the queue ends or the connection closes.
async fn process_requests(
    requests: mpsc::Receiver<String>,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    connection: Arc<ClientConnection>,
    closed: CancellationToken,
) {
    let (send_tx, send_rx) = mpsc::channel::<String>(REQUEST_BUFFER);
    let lane = run_send_lane(
        send_rx,
        Arc::clone(&registry),
        Arc::clone(&ctx),
        Arc::clone(&connection),
        closed.clone(),
    );
    let router = route_requests(requests, send_tx, registry, ctx, connection, closed);
    let ((), ()) = tokio::join!(lane, router);
}

/// Hand sends to the lane and spawn everything else.
///
/// Dropping the `JoinSet` on exit aborts whatever is still running.
async fn route_requests(
    mut requests: mpsc::Receiver<String>,
    send_tx: mpsc::Sender<String>,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    connection: Arc<ClientConnection>,
    closed: CancellationToken,
) {
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            text = requests.recv() => {
                let Some(text) = text else { break };
                if is_send(&text) {
                    let queued = tokio::select! {
                        res = send_tx.send(text) => res.is_ok(),
                        () = closed.cancelled() => false,
                    };
                    if !queued {
                        break;
                    }
                } else {
                    let _ = in_flight.spawn(
                        dispatch(
                            text,
                            Arc::clone(&registry),
                            Arc::clone(&ctx),
                            Arc::clone(&connection),
                        )
                        .in_current_span(),
                    );
                }
            }
            Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            () = closed.cancelled() => break,
        }
    }
    if !in_flight.is_empty() {
        debug!(aborted = in_flight.len(), "connection closed, dropping in-flight requests");
    }
}

/// Run sends one at a time, in the order they arrived.
async fn run_send_lane(
    mut sends: mpsc::Receiver<String>,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    connection: Arc<ClientConnection>,
    closed: CancellationToken,
) {
    loop {
        let text = tokio::select! {
            text = sends.recv() => match text {
                Some(text) => text,
                None => break,
            },
            () = closed.cancelled() => break,
        };

        tokio::select! {
            () = dispatch(text, Arc::clone(&registry), Arc::clone(&ctx), Arc::clone(&connection)) => {}
            () = closed.cancelled() => {
                debug!("connection closed, dropping in-flight send");
                break;
            }
        }
    }
}

/// Whether `text` is a `messenger.send` request.
///
/// Anything unparseable is left to the general path, which answers it with
/// an error.
fn is_send(text: &str) -> bool {
    #[derive(Deserialize)]
    struct MethodOnly {
        method: String,
    }
    serde_json::from_str::<MethodOnly>(text).is_ok_and(|req| req.method == methods::SEND)
}

/// Handle one request and queue its response.
async fn dispatch(
    text: String,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    connection: Arc<ClientConnection>,
) {
    let result = handle_message(&text, &registry, &ctx).await;

    if result.method == methods::CONNECT && result.response.success {
        if let Some(token) = result
            .response
            .result
            .as_ref()
            .and_then(|r| r.get("token"))
            .and_then(Value::as_str)
        {
            connection.bind_token(Token::from(token));
        }
    }

    if !connection.send(result.response_json) {
        warn!("failed to enqueue response (channel full or closed)");
    }
}

/// Write responses to the socket and ping it every `interval`.
///
/// Gives up (and cancels `closed`) once the client has not answered for
/// longer than `timeout`.
async fn forward_outbound(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    closed: CancellationToken,
) {
    let mut ping_interval = tokio::time::interval(interval);
    // first tick completes immediately
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            msg = outbound.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !connection.check_alive() && connection.last_pong_elapsed() > timeout {
                    warn!(timeout_secs = timeout.as_secs(), "client unresponsive, disconnecting");
                    break;
                }
                if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            () = closed.cancelled() => break,
        }
    }

    closed.cancel();
    let _ = ws_tx.close().await;
}

/// Disconnect the sessions opened on `connection` that are still live.
///
/// Tokens the client already disconnected no longer resolve and are
/// skipped. A session replaced by a later connect under the same name is
/// left alone, since `disconnect` only ends the session its token belongs to.
pub fn release_sessions(connection: &ClientConnection, service: &SessionService) {
    for token in connection.take_tokens() {
        if let Ok(identity) = service.authenticate(&token) {
            info!(username = %identity, "releasing session of closed connection");
            service.disconnect(&identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Username;

    fn make_connection() -> ClientConnection {
        let (tx, _rx) = mpsc::channel(4);
        ClientConnection::new(ConnectionId::new(), tx)
    }

    #[test]
    fn release_disconnects_live_sessions() {
        let service = SessionService::default();
        let conn = make_connection();
        conn.bind_token(service.connect(&Username::from("alice")).unwrap());
        conn.bind_token(service.connect(&Username::from("bob")).unwrap());

        release_sessions(&conn, &service);
        assert!(service.list().is_empty());
    }

    #[test]
    fn release_skips_explicitly_disconnected() {
        let service = SessionService::default();
        let conn = make_connection();
        let token = service.connect(&Username::from("alice")).unwrap();
        conn.bind_token(token.clone());
        let alice = service.authenticate(&token).unwrap();
        service.disconnect(&alice);

        // alice comes back on another connection
        let _ = service.connect(&Username::from("alice")).unwrap();

        release_sessions(&conn, &service);
        assert_eq!(service.list(), vec![Username::from("alice")]);
    }

    #[test]
    fn send_requests_are_recognised() {
        assert!(is_send(r#"{"id":"1","method":"messenger.send","params":{}}"#));
        assert!(!is_send(r#"{"id":"2","method":"messenger.fetch"}"#));
        assert!(!is_send("{not json"));
    }

    #[test]
    fn release_is_one_shot() {
        let service = SessionService::default();
        let conn = make_connection();
        conn.bind_token(service.connect(&Username::from("alice")).unwrap());
        release_sessions(&conn, &service);
        let _ = service.connect(&Username::from("alice")).unwrap();
        release_sessions(&conn, &service);
        assert_eq!(service.session_count(), 1);
    }
}
