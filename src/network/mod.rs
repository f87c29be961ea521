//! Network layer - NATS over WebSocket
//!
//! The Network actor receives broker commands, owns the single connection
//! and subscription, and sends back broker events.

pub mod actor;
pub mod client;
pub mod proto;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

pub use actor::NetworkActor;
pub use client::{ClientError, ConnectOptions, NatsClient, Subscription};
