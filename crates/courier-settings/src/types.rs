//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a settings
//! file may be partial: missing fields keep their compiled default.

use courier_core::constants::{DEFAULT_BATCH_LIMIT, DEFAULT_MAILBOX_CAPACITY, DEFAULT_PORT};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 4000 },
///   "mailbox": { "capacity": 256 },
///   "logging": { "level": "debug", "json": true }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourierSettings {
    /// Listener and transport settings.
    pub server: ServerSettings,
    /// Mailbox sizing.
    pub mailbox: MailboxSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Defaults for the interactive client.
    pub client: ClientSettings,
}

impl CourierSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "mailbox.capacity",
                reason: "must be at least 1",
            });
        }
        if self.mailbox.batch_limit == 0 {
            return Err(SettingsError::Invalid {
                field: "mailbox.batchLimit",
                reason: "must be at least 1",
            });
        }
        if self.server.request_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                field: "server.requestTimeoutSecs",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// Server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` lets the OS choose).
    pub port: u16,
    /// Upper bound on a single RPC call, including time spent blocked on a
    /// full mailbox.
    pub request_timeout_secs: u64,
    /// Interval between WebSocket pings.
    pub heartbeat_interval_secs: u64,
    /// Close a connection after this long without a pong.
    pub heartbeat_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Disconnect a connection's session when its socket closes without an
    /// explicit disconnect.
    pub release_on_close: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            request_timeout_secs: 30,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 64 * 1024,
            release_on_close: true,
        }
    }
}

/// Mailbox sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MailboxSettings {
    /// Messages a mailbox holds before senders block.
    pub capacity: usize,
    /// Maximum messages returned by one fetch.
    pub batch_limit: usize,
}

impl Default for MailboxSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MAILBOX_CAPACITY,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

/// Defaults for the interactive client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Server host to dial.
    pub host: String,
    /// Server port to dial.
    pub port: u16,
    /// Username to register under when none is given.
    pub username: String,
    /// How long to wait for the connection and registration.
    pub connect_timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            username: "guest".into(),
            connect_timeout_secs: 3,
        }
    }
}
