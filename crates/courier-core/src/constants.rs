//! Package-level constants.

/// Current version of Courier (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Messages a mailbox holds before `send` starts applying backpressure.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Maximum number of messages returned by a single fetch.
pub const DEFAULT_BATCH_LIMIT: usize = 50;

/// Port the server listens on and the client dials by default.
pub const DEFAULT_PORT: u16 = 12345;

/// Call metadata key carrying the session token.
pub const TOKEN_METADATA_KEY: &str = "token";
