//! # NATS Panel
//!
//! A small terminal client for a NATS broker reached over WebSocket.
//!
//! ## Features
//! - Connect / drain-and-disconnect
//! - One subscription at a time, with a live message log
//! - Publish text to any subject
//!
//! ## Architecture
//! Actor-based with channels:
//! - UI Layer (Ratatui) - synchronous
//! - App Layer (Session state machine)
//! - Network Layer (Tokio runtime, NATS over WebSocket)

pub mod config;
pub mod constants;
pub mod models;
pub mod ui;
pub mod messages;
pub mod app;
pub mod network;

// Re-export commonly used types
pub use config::Config;
pub use models::{DraftField, ReceivedMessage, SessionStatus, TextField};
pub use messages::{UiEvent, BrokerCommand, BrokerEvent, RenderState};
pub use app::{AppState, AppActor, Session, SessionEvent};
pub use network::{NatsClient, NetworkActor};
