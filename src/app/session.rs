//! Session controller - connection lifecycle, the single subscription and publishing
//!
//! The session is a plain value. [`Session::apply`] consumes it together with
//! one event and returns the next session plus the broker commands that the
//! transition requires. Nothing in here performs I/O; timestamps arrive inside
//! the broker events.
//!
//! ```text
//! Disconnected --Connect--> Connecting --Connected--> Connected
//!                           Connecting --ConnectFailed--> Disconnected
//! Connected --Subscribe--> Subscribed --Subscribe--> Subscribed (replaced)
//! Subscribed --Unsubscribe--> Connected
//! Connected | Subscribed --Disconnect--> Disconnected
//! ```
//!
//! Every subscription gets a fresh generation id. Messages tagged with any
//! other id are dropped, so a retired receive loop can never append to the
//! log after it was cleared.

use crate::constants::{DEFAULT_SERVER, DEFAULT_SUBJECT};
use crate::messages::{BrokerCommand, BrokerEvent};
use crate::models::{DraftField, ReceivedMessage, SessionStatus, TextField};

/// Connection phase
#[derive(Clone, Debug, PartialEq)]
enum Phase {
    Disconnected,
    Connecting { attempt: u64 },
    Connected,
}

/// The subscription the session currently considers active
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveSubscription {
    pub id: u64,
    pub subject: String,
    /// Messages delivered so far, as counted by the client library
    pub processed: u64,
    /// False once the receive loop ended on its own
    pub live: bool,
    pub error: Option<String>,
}

/// Text edit applied to a draft field
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EditOp {
    Insert(char),
    Backspace,
    Left,
    Right,
}

/// Inputs to the session state machine
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Connect,
    Disconnect,
    Subscribe,
    Unsubscribe,
    Publish,
    Edit { field: DraftField, op: EditOp },
    Broker(BrokerEvent),
}

/// Result of applying one event
#[derive(Debug)]
pub struct Transition {
    pub session: Session,
    pub commands: Vec<BrokerCommand>,
}

#[derive(Clone, Debug)]
pub struct Session {
    phase: Phase,
    servers: Vec<String>,
    server: Option<String>,
    subscription: Option<ActiveSubscription>,
    log: Vec<ReceivedMessage>,
    subscribe_subject: TextField,
    publish_subject: TextField,
    publish_payload: TextField,
    next_id: u64,
}

impl Default for Session {
    fn default() -> Self {
        Session::new(vec![DEFAULT_SERVER.to_string()], DEFAULT_SUBJECT, DEFAULT_SUBJECT)
    }
}

impl Session {
    pub fn new(servers: Vec<String>, subject: &str, publish_subject: &str) -> Self {
        Session {
            phase: Phase::Disconnected,
            servers,
            server: None,
            subscription: None,
            log: Vec::new(),
            subscribe_subject: TextField::new(subject),
            publish_subject: TextField::new(publish_subject),
            publish_payload: TextField::default(),
            next_id: 1,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match (&self.phase, &self.subscription) {
            (Phase::Disconnected, _) => SessionStatus::Disconnected,
            (Phase::Connecting { .. }, _) => SessionStatus::Connecting,
            (Phase::Connected, None) => SessionStatus::Connected,
            (Phase::Connected, Some(_)) => SessionStatus::Subscribed,
        }
    }

    /// Server of the live connection
    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn subscription(&self) -> Option<&ActiveSubscription> {
        self.subscription.as_ref()
    }

    pub fn log(&self) -> &[ReceivedMessage] {
        &self.log
    }

    pub fn field(&self, field: DraftField) -> &TextField {
        match field {
            DraftField::SubscribeSubject => &self.subscribe_subject,
            DraftField::PublishSubject => &self.publish_subject,
            DraftField::PublishPayload => &self.publish_payload,
        }
    }

    fn field_mut(&mut self, field: DraftField) -> &mut TextField {
        match field {
            DraftField::SubscribeSubject => &mut self.subscribe_subject,
            DraftField::PublishSubject => &mut self.publish_subject,
            DraftField::PublishPayload => &mut self.publish_payload,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Apply one event and return the next session with its commands
    pub fn apply(mut self, event: SessionEvent) -> Transition {
        let mut commands = Vec::new();

        match event {
            SessionEvent::Connect => self.connect(&mut commands),
            SessionEvent::Disconnect => self.disconnect(&mut commands),
            SessionEvent::Subscribe => self.subscribe(&mut commands),
            SessionEvent::Unsubscribe => self.unsubscribe(&mut commands),
            SessionEvent::Publish => self.publish(&mut commands),
            SessionEvent::Edit { field, op } => {
                let text = self.field_mut(field);
                match op {
                    EditOp::Insert(c) => text.insert(c),
                    EditOp::Backspace => text.backspace(),
                    EditOp::Left => text.move_left(),
                    EditOp::Right => text.move_right(),
                }
            }
            SessionEvent::Broker(event) => self.handle_broker_event(event),
        }

        Transition {
            session: self,
            commands,
        }
    }

    fn connect(&mut self, commands: &mut Vec<BrokerCommand>) {
        if self.phase != Phase::Disconnected {
            tracing::debug!(status = self.status().as_str(), "Connect ignored, already connected");
            return;
        }

        let attempt = self.next_id();
        self.phase = Phase::Connecting { attempt };
        commands.push(BrokerCommand::Connect {
            attempt,
            servers: self.servers.clone(),
        });
    }

    fn disconnect(&mut self, commands: &mut Vec<BrokerCommand>) {
        if self.phase == Phase::Disconnected {
            return;
        }

        // The network actor retires the subscription before draining
        self.subscription = None;
        self.server = None;
        self.phase = Phase::Disconnected;
        commands.push(BrokerCommand::Disconnect);
    }

    fn subscribe(&mut self, commands: &mut Vec<BrokerCommand>) {
        if self.phase != Phase::Connected {
            tracing::debug!("Subscribe ignored, not connected");
            return;
        }
        if self.subscribe_subject.is_blank() {
            tracing::debug!("Subscribe ignored, empty subject");
            return;
        }

        // Same subject is re-created too, which also resets the log
        if let Some(old) = self.subscription.take() {
            commands.push(BrokerCommand::Unsubscribe { id: old.id });
        }

        let id = self.next_id();
        let subject = self.subscribe_subject.value().to_string();
        self.log.clear();
        self.subscription = Some(ActiveSubscription {
            id,
            subject: subject.clone(),
            processed: 0,
            live: true,
            error: None,
        });
        commands.push(BrokerCommand::Subscribe { id, subject });
    }

    fn unsubscribe(&mut self, commands: &mut Vec<BrokerCommand>) {
        if let Some(old) = self.subscription.take() {
            commands.push(BrokerCommand::Unsubscribe { id: old.id });
        }
    }

    fn publish(&mut self, commands: &mut Vec<BrokerCommand>) {
        if self.phase != Phase::Connected || self.publish_payload.is_blank() {
            tracing::debug!("Publish ignored, not connected or empty message");
            return;
        }
        // The client refuses these subjects; the draft stays
        let subject = self.publish_subject.value();
        if subject.is_empty() || subject.chars().any(char::is_whitespace) {
            tracing::debug!(subject = %subject, "Publish ignored, bad subject");
            return;
        }

        commands.push(BrokerCommand::Publish {
            subject: self.publish_subject.value().to_string(),
            payload: self.publish_payload.value().to_string(),
        });
        self.publish_payload.clear();
    }

    fn handle_broker_event(&mut self, event: BrokerEvent) {
        match event {
            BrokerEvent::Connected { attempt, server } => {
                if self.phase == (Phase::Connecting { attempt }) {
                    self.phase = Phase::Connected;
                    self.server = Some(server);
                }
            }
            BrokerEvent::ConnectFailed { attempt, error } => {
                if self.phase == (Phase::Connecting { attempt }) {
                    tracing::error!(attempt, error = %error, "Error connecting to broker");
                    self.phase = Phase::Disconnected;
                }
            }
            BrokerEvent::ConnectionClosed { error } => {
                if self.phase == Phase::Connected {
                    tracing::warn!(error = ?error, "Connection lost");
                    self.phase = Phase::Disconnected;
                    self.server = None;
                    self.subscription = None;
                }
            }
            BrokerEvent::Message {
                subscription,
                message,
                processed,
            } => match self.subscription.as_mut() {
                Some(active) if active.id == subscription => {
                    active.processed = processed;
                    self.log.push(message);
                }
                _ => {
                    tracing::trace!(subscription, "Dropped message from retired subscription");
                }
            },
            BrokerEvent::SubscriptionEnded { subscription, error } => {
                if let Some(active) = self.subscription.as_mut() {
                    if active.id == subscription {
                        active.live = false;
                        active.error = error;
                    }
                }
            }
            BrokerEvent::Drained => {}
        }
    }
}
