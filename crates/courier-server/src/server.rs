//! `CourierServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use courier_core::ConnectionId;
use courier_session::SessionService;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::HealthResponse;
use crate::rpc::context::RpcContext;
use crate::rpc::handlers::register_all;
use crate::rpc::registry::MethodRegistry;
use crate::shutdown::Shutdown;
use crate::websocket::connection::ConnectionRegistry;
use crate::websocket::session::run_ws_session;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// RPC method registry.
    pub registry: Arc<MethodRegistry>,
    /// Handler context.
    pub ctx: Arc<RpcContext>,
    /// Open WebSocket connections.
    pub connections: Arc<ConnectionRegistry>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Server-wide stop signal.
    pub shutdown: Arc<Shutdown>,
    /// When the server started.
    pub start_time: Instant,
}

/// The Courier server.
pub struct CourierServer {
    config: Arc<ServerConfig>,
    registry: Arc<MethodRegistry>,
    ctx: Arc<RpcContext>,
    connections: Arc<ConnectionRegistry>,
    shutdown: Arc<Shutdown>,
    start_time: Instant,
}

impl CourierServer {
    /// Create a server exposing every messenger method over `service`.
    pub fn new(config: ServerConfig, service: Arc<SessionService>) -> Self {
        let mut registry = MethodRegistry::with_timeout(config.request_timeout);
        register_all(&mut registry);
        Self::with_registry(config, registry, service)
    }

    /// Create a server with a pre-built registry.
    pub fn with_registry(
        config: ServerConfig,
        registry: MethodRegistry,
        service: Arc<SessionService>,
    ) -> Self {
        let ctx = RpcContext::new(service);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            start_time: ctx.server_start_time,
            ctx: Arc::new(ctx),
            connections: Arc::new(ConnectionRegistry::new()),
            shutdown: Arc::new(Shutdown::new()),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            ctx: Arc::clone(&self.ctx),
            connections: Arc::clone(&self.connections),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.signal();

        info!(%addr, "courier server listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Get the stop signal.
    pub fn shutdown(&self) -> &Arc<Shutdown> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the method registry.
    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Get the session service.
    pub fn service(&self) -> &Arc<SessionService> {
        &self.ctx.service
    }

    /// Number of open WebSocket connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::collect(
        state.start_time,
        &state.connections,
        &state.ctx.service,
    ))
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let conn_id = ConnectionId::new();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                conn_id,
                state.registry,
                state.ctx,
                state.connections,
                state.config,
                state.shutdown.signal(),
            )
        })
}
