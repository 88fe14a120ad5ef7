//! Shared context passed to every RPC handler.

use std::sync::Arc;
use std::time::Instant;

use courier_session::SessionService;

/// Dependencies available to handlers.
pub struct RpcContext {
    /// The session core.
    pub service: Arc<SessionService>,
    /// When the server started.
    pub server_start_time: Instant,
}

impl RpcContext {
    /// Create a context around `service`.
    pub fn new(service: Arc<SessionService>) -> Self {
        Self {
            service,
            server_start_time: Instant::now(),
        }
    }
}
