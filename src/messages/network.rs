//! Network messages - communication between App and Network layers

use crate::models::ReceivedMessage;

/// Commands sent from App layer to Network layer
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCommand {
    /// Open a connection; the outcome is reported with the same `attempt`
    Connect {
        attempt: u64,
        servers: Vec<String>,
    },
    /// Retire the subscription, then drain and drop the connection
    Disconnect,
    /// Replace the active subscription with one on `subject`
    Subscribe {
        id: u64,
        subject: String,
    },
    /// Retire the subscription `id` if it is still the active one
    Unsubscribe {
        id: u64,
    },
    /// Fire-and-forget publish of a text payload
    Publish {
        subject: String,
        payload: String,
    },

    /// Disconnect and stop the network actor
    Shutdown,
}

/// Events sent from Network layer to App layer
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    Connected {
        attempt: u64,
        server: String,
    },
    ConnectFailed {
        attempt: u64,
        error: String,
    },
    /// The live connection went away without being asked to
    ConnectionClosed {
        error: Option<String>,
    },
    /// Message received by the receive loop of subscription `subscription`
    Message {
        subscription: u64,
        message: ReceivedMessage,
        processed: u64,
    },
    /// The receive loop of `subscription` stopped on its own
    SubscriptionEnded {
        subscription: u64,
        error: Option<String>,
    },
    /// A requested disconnect finished draining
    Drained,
}
