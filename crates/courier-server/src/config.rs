//! Server configuration.

use std::time::Duration;

use courier_settings::CourierSettings;

/// Runtime configuration for [`CourierServer`](crate::server::CourierServer).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` for auto-assign).
    pub port: u16,
    /// Upper bound on one RPC call.
    pub request_timeout: Duration,
    /// Interval between server pings.
    pub heartbeat_interval: Duration,
    /// Close a connection that has not answered a ping for this long.
    pub heartbeat_timeout: Duration,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Disconnect sessions opened on a connection when it closes.
    pub release_on_close: bool,
}

impl ServerConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &CourierSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            request_timeout: Duration::from_secs(server.request_timeout_secs),
            heartbeat_interval: Duration::from_secs(server.heartbeat_interval_secs.max(1)),
            heartbeat_timeout: Duration::from_secs(server.heartbeat_timeout_secs),
            max_message_size: server.max_message_size,
            release_on_close: server.release_on_close,
        }
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    /// Loopback with an OS-assigned port.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ..Self::from_settings(&CourierSettings::default())
        }
    }
}
