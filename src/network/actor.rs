//! Network actor - owns the broker connection and the receive loop

use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::messages::{BrokerCommand, BrokerEvent};
use crate::models::ReceivedMessage;
use crate::network::client::{decode_text, encode_text, ConnectOptions, NatsClient, Subscription};

type ConnectOutcome = (u64, Result<NatsClient, String>);

/// Tracks the receive loop of the active subscription
struct ActiveReceiver {
    id: u64,
    cancel_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Tracks an in-flight connect
struct PendingConnect {
    attempt: u64,
    task: JoinHandle<()>,
}

/// Network actor that processes broker commands
pub struct NetworkActor {
    client_name: Option<String>,
    drain_timeout: Duration,
    response_tx: mpsc::UnboundedSender<BrokerEvent>,
    connect_tx: mpsc::UnboundedSender<ConnectOutcome>,
    connect_rx: mpsc::UnboundedReceiver<ConnectOutcome>,
    client: Option<NatsClient>,
    pending: Option<PendingConnect>,
    receiver: Option<ActiveReceiver>,
}

impl NetworkActor {
    pub fn new(
        client_name: Option<String>,
        drain_timeout: Duration,
        response_tx: mpsc::UnboundedSender<BrokerEvent>,
    ) -> Self {
        let (connect_tx, connect_rx) = mpsc::unbounded_channel();
        NetworkActor {
            client_name,
            drain_timeout,
            response_tx,
            connect_tx,
            connect_rx,
            client: None,
            pending: None,
            receiver: None,
        }
    }

    /// Run the network actor message loop
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<BrokerCommand>) {
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(BrokerCommand::Connect { attempt, servers }) => self.connect(attempt, servers),
                        Some(BrokerCommand::Disconnect) => {
                            self.disconnect().await;
                            let _ = self.response_tx.send(BrokerEvent::Drained);
                        }
                        Some(BrokerCommand::Subscribe { id, subject }) => self.subscribe(id, subject).await,
                        Some(BrokerCommand::Unsubscribe { id }) => {
                            if self.receiver.as_ref().is_some_and(|r| r.id == id) {
                                self.retire_receiver().await;
                            }
                        }
                        Some(BrokerCommand::Publish { subject, payload }) => self.publish(&subject, &payload),
                        Some(BrokerCommand::Shutdown) | None => {
                            self.disconnect().await;
                            break;
                        }
                    }
                }

                Some((attempt, outcome)) = self.connect_rx.recv() => {
                    self.finish_connect(attempt, outcome).await;
                }

                _ = wait_closed(self.client.as_ref()) => {
                    // Transport died underneath a live connection. The receive
                    // loop ends on its own and reports why, so it is awaited
                    // rather than cancelled.
                    if let Some(receiver) = self.receiver.take() {
                        let _ = receiver.task.await;
                    }
                    if let Some(client) = self.client.take() {
                        tracing::warn!(server = %client.server(), "Connection closed unexpectedly");
                    }
                    let _ = self.response_tx.send(BrokerEvent::ConnectionClosed {
                        error: Some("transport closed".to_string()),
                    });
                }
            }
        }
        tracing::debug!("Network actor stopped");
    }

    fn connect(&mut self, attempt: u64, servers: Vec<String>) {
        if self.client.is_some() || self.pending.is_some() {
            tracing::info!(attempt, "Already connected to broker");
            return;
        }

        let options = ConnectOptions {
            servers,
            name: self.client_name.clone(),
        };
        let connect_tx = self.connect_tx.clone();

        // Spawned so Disconnect and Shutdown stay responsive during a hung handshake
        let task = tokio::spawn(async move {
            tracing::info!(attempt, servers = ?options.servers, "Connecting to broker");
            let outcome = NatsClient::connect(&options).await.map_err(|e| e.to_string());
            let _ = connect_tx.send((attempt, outcome));
        });
        self.pending = Some(PendingConnect { attempt, task });
    }

    async fn finish_connect(&mut self, attempt: u64, outcome: Result<NatsClient, String>) {
        if self.pending.as_ref().map(|p| p.attempt) != Some(attempt) {
            // Cancelled attempt that completed anyway
            if let Ok(client) = outcome {
                client.drain().await;
            }
            return;
        }
        self.pending = None;

        match outcome {
            Ok(client) => {
                let server = client.server().to_string();
                tracing::info!(attempt, server = %server, "Connected to broker");
                self.client = Some(client);
                let _ = self.response_tx.send(BrokerEvent::Connected { attempt, server });
            }
            Err(error) => {
                tracing::error!(attempt, error = %error, "Error connecting to broker");
                let _ = self.response_tx.send(BrokerEvent::ConnectFailed { attempt, error });
            }
        }
    }

    async fn subscribe(&mut self, id: u64, subject: String) {
        self.retire_receiver().await;

        let Some(client) = self.client.as_mut() else {
            tracing::warn!(id, subject = %subject, "Subscribe without a connection");
            let _ = self.response_tx.send(BrokerEvent::SubscriptionEnded {
                subscription: id,
                error: Some("not connected".to_string()),
            });
            return;
        };

        match client.subscribe(&subject) {
            Ok(subscription) => {
                let (cancel_tx, cancel_rx) = oneshot::channel();
                let response_tx = self.response_tx.clone();
                let task = tokio::spawn(receive_loop(id, subscription, response_tx, cancel_rx));
                self.receiver = Some(ActiveReceiver { id, cancel_tx, task });
                tracing::info!(id, subject = %subject, "Subscribed");
            }
            Err(e) => {
                tracing::error!(id, subject = %subject, error = %e, "Error subscribing");
                let _ = self.response_tx.send(BrokerEvent::SubscriptionEnded {
                    subscription: id,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    /// Cancel the receive loop and wait until it has let go of the subscription
    async fn retire_receiver(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            let _ = receiver.cancel_tx.send(());
            if let Err(e) = receiver.task.await {
                tracing::warn!(id = receiver.id, error = %e, "Receive loop did not finish cleanly");
            }
            tracing::info!(id = receiver.id, "Unsubscribed");
        }
    }

    fn publish(&self, subject: &str, payload: &str) {
        let Some(client) = self.client.as_ref() else {
            tracing::debug!(subject = %subject, "Publish without a connection");
            return;
        };
        if let Err(e) = client.publish(subject, encode_text(payload)) {
            tracing::warn!(subject = %subject, error = %e, "Publish failed");
        }
    }

    async fn disconnect(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::info!(attempt = pending.attempt, "Cancelling connect");
            pending.task.abort();
        }

        self.retire_receiver().await;

        if let Some(client) = self.client.take() {
            let server = client.server().to_string();
            if tokio::time::timeout(self.drain_timeout, client.drain()).await.is_err() {
                tracing::warn!(server = %server, "Drain timed out");
            }
            tracing::info!(server = %server, "Disconnected from broker");
        }
    }
}

/// Resolves when the given client's transport shuts down; never without a client
async fn wait_closed(client: Option<&NatsClient>) {
    match client {
        Some(client) => client.closed().await,
        None => std::future::pending().await,
    }
}

/// Forward deliveries of one subscription until cancelled or the stream ends
async fn receive_loop(
    id: u64,
    mut subscription: Subscription,
    response_tx: mpsc::UnboundedSender<BrokerEvent>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let subject = subscription.subject().to_string();

    loop {
        tokio::select! {
            biased;

            _ = &mut cancel_rx => {
                subscription.unsubscribe();
                return;
            }

            delivery = subscription.next() => {
                match delivery {
                    Some(Ok(msg)) => {
                        let payload = decode_text(&msg.payload);
                        tracing::debug!(id, processed = subscription.processed(), payload = %payload, "Message received");
                        let _ = response_tx.send(BrokerEvent::Message {
                            subscription: id,
                            message: ReceivedMessage {
                                subject: subject.clone(),
                                payload,
                                received_at: Local::now(),
                            },
                            processed: subscription.processed(),
                        });
                    }
                    Some(Err(e)) => {
                        tracing::warn!(id, subject = %subject, error = %e, "Error in subscription loop");
                        let _ = response_tx.send(BrokerEvent::SubscriptionEnded {
                            subscription: id,
                            error: Some(e.to_string()),
                        });
                        return;
                    }
                    None => {
                        let _ = response_tx.send(BrokerEvent::SubscriptionEnded {
                            subscription: id,
                            error: None,
                        });
                        return;
                    }
                }
            }
        }
    }
}
