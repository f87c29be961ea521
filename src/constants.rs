//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Public demo broker with a WebSocket listener
pub const DEFAULT_SERVER: &str = "wss://demo.nats.io:8443";

/// Subject used for both subscribing and publishing until edited
pub const DEFAULT_SUBJECT: &str = "hello";

/// Name announced to the server in `CONNECT`
pub const DEFAULT_CLIENT_NAME: &str = "natspanel";

/// Upper bound on the drain performed when the app quits
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

/// Directory under the home directory holding `config.yaml`
pub const CONFIG_DIR_NAME: &str = ".natspanel";

/// Log file written in the working directory
pub const LOG_FILE_NAME: &str = "natspanel.log";

/// Application name
pub const APP_NAME: &str = "NATS Panel";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
