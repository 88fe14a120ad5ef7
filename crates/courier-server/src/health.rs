//! `/health` response body.

use std::time::Instant;

use courier_session::SessionService;
use serde::Serialize;

use crate::websocket::connection::ConnectionRegistry;

/// What `GET /health` reports.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// `"ok"` whenever the server answers at all.
    pub status: &'static str,
    /// Server version.
    pub version: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Connected usernames.
    pub sessions: usize,
}

impl HealthResponse {
    /// Snapshot the live counters.
    pub fn collect(started: Instant, connections: &ConnectionRegistry, service: &SessionService) -> Self {
        Self {
            status: "ok",
            version: courier_core::constants::VERSION,
            uptime_secs: started.elapsed().as_secs(),
            connections: connections.len(),
            sessions: service.session_count(),
        }
    }
}
