//! NATS client - connection handle, subscriptions and text codec

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::connect_async;

use crate::network::proto::{ClientOp, ConnectInfo, Parser, ServerInfo, ServerOp};
use crate::network::websocket::{next_server_op, run_transport, send_op, Delivery, TransportOp};

/// Errors produced by the NATS client
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("no servers configured")]
    NoServers,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connection closed by server ({0})")]
    Closed(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("invalid subject: {0:?}")]
    InvalidSubject(String),
}

/// Connection options
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub servers: Vec<String>,
    pub name: Option<String>,
}

/// A message delivered on a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

/// Encode text for publishing
pub fn encode_text(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Decode a payload as text, replacing invalid UTF-8
pub fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Handle to a live NATS connection
#[derive(Debug)]
pub struct NatsClient {
    server: String,
    info: ServerInfo,
    ops_tx: mpsc::UnboundedSender<TransportOp>,
    closed_rx: watch::Receiver<bool>,
    next_sid: u64,
}

impl NatsClient {
    /// Connect to the first server in `options.servers` that completes the handshake
    pub async fn connect(options: &ConnectOptions) -> Result<Self, ClientError> {
        let mut last_error = ClientError::NoServers;

        for server in &options.servers {
            match Self::connect_to(server, options).await {
                Ok(client) => return Ok(client),
                Err(e) => {
                    tracing::warn!(server = %server, error = %e, "Server unavailable");
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }

    async fn connect_to(server: &str, options: &ConnectOptions) -> Result<Self, ClientError> {
        let (ws_stream, _response) = connect_async(server)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        let mut parser = Parser::new();

        let info = match next_server_op(&mut read, &mut parser).await? {
            ServerOp::Info(info) => info,
            other => {
                return Err(ClientError::Protocol(format!(
                    "expected INFO greeting, got {:?}",
                    other
                )))
            }
        };
        parser.set_max_payload(info.max_payload);

        send_op(&mut write, &ClientOp::Connect(ConnectInfo::new(options.name.clone()))).await?;
        send_op(&mut write, &ClientOp::Ping).await?;

        // The PONG confirms CONNECT was accepted
        loop {
            match next_server_op(&mut read, &mut parser).await? {
                ServerOp::Pong => break,
                ServerOp::Ping => send_op(&mut write, &ClientOp::Pong).await?,
                ServerOp::Err(message) => return Err(ClientError::Rejected(message)),
                ServerOp::Ok | ServerOp::Info(_) | ServerOp::Msg { .. } => {}
            }
        }

        tracing::info!(
            server = %server,
            server_name = %info.server_name,
            version = %info.version,
            "Connected"
        );

        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);
        tokio::spawn(run_transport(write, read, parser, ops_rx, closed_tx));

        Ok(NatsClient {
            server: server.to_string(),
            info,
            ops_tx,
            closed_rx,
            next_sid: 1,
        })
    }

    /// Address of the server this connection is attached to
    pub fn server(&self) -> &str {
        &self.server
    }

    /// `INFO` received during the handshake
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// Resolves once the transport has shut down
    pub async fn closed(&self) {
        let mut closed_rx = self.closed_rx.clone();
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }

    /// Register interest in `subject`.
    ///
    /// Handle creation is synchronous; failures of the subscription itself
    /// show up later on the returned stream.
    pub fn subscribe(&mut self, subject: &str) -> Result<Subscription, ClientError> {
        validate_subject(subject)?;
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }

        let sid = self.next_sid;
        self.next_sid += 1;

        let (deliveries, rx) = mpsc::unbounded_channel();
        self.ops_tx
            .send(TransportOp::Subscribe {
                sid,
                subject: subject.to_string(),
                deliveries,
            })
            .map_err(|_| ClientError::ConnectionClosed)?;

        tracing::debug!(sid, subject = %subject, "Subscription opened");

        Ok(Subscription {
            sid,
            subject: subject.to_string(),
            rx,
            ops_tx: self.ops_tx.clone(),
            processed: 0,
        })
    }

    /// Fire-and-forget publish
    pub fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), ClientError> {
        validate_subject(subject)?;
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }
        self.ops_tx
            .send(TransportOp::Publish {
                subject: subject.to_string(),
                payload,
            })
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Unsubscribe everything, flush queued ops and close the connection
    pub async fn drain(self) {
        let (done, done_rx) = oneshot::channel();
        if self.ops_tx.send(TransportOp::Drain { done }).is_ok() {
            let _ = done_rx.await;
        }
        tracing::info!(server = %self.server, "Connection drained");
    }
}

/// Stream of messages for one subject. Not restartable: once `next`
/// returns `None` a new subscription must be created.
#[derive(Debug)]
pub struct Subscription {
    sid: u64,
    subject: String,
    rx: mpsc::UnboundedReceiver<Delivery>,
    ops_tx: mpsc::UnboundedSender<TransportOp>,
    processed: u64,
}

impl Subscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Messages delivered so far
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Next delivery, `None` once unsubscribed or the connection is gone
    pub async fn next(&mut self) -> Option<Result<InboundMessage, ClientError>> {
        let delivery = self.rx.recv().await;
        if let Some(Ok(_)) = delivery {
            self.processed += 1;
        }
        delivery
    }

    pub fn unsubscribe(self) {
        let _ = self.ops_tx.send(TransportOp::Unsubscribe { sid: self.sid });
        tracing::debug!(sid = self.sid, subject = %self.subject, "Subscription closed");
    }
}

fn validate_subject(subject: &str) -> Result<(), ClientError> {
    // Whitespace would corrupt the control line
    if subject.is_empty() || subject.chars().any(char::is_whitespace) {
        return Err(ClientError::InvalidSubject(subject.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{start_fake_server, FakeBehavior};
    use std::time::Duration;
    use tokio::time::timeout;

    fn options(url: String) -> ConnectOptions {
        ConnectOptions {
            servers: vec![url],
            name: Some("test".to_string()),
        }
    }

    #[test]
    fn test_text_codec() {
        assert_eq!(encode_text("héllo"), "héllo".as_bytes().to_vec());
        assert_eq!(decode_text(b"world"), "world");
        assert_eq!(decode_text(&[0x66, 0xff]), "f\u{fffd}");
    }

    #[test]
    fn test_validate_subject() {
        assert!(validate_subject("hello.world").is_ok());
        assert!(validate_subject("").is_err());
        assert!(validate_subject("two words").is_err());
    }

    #[tokio::test]
    async fn test_connect_with_no_servers_fails() {
        let result = NatsClient::connect(&ConnectOptions {
            servers: Vec::new(),
            name: None,
        })
        .await;
        assert_eq!(result.unwrap_err(), ClientError::NoServers);
    }

    #[tokio::test]
    async fn test_connect_falls_through_to_next_server() {
        let url = start_fake_server(FakeBehavior::default()).await;
        let client = NatsClient::connect(&ConnectOptions {
            servers: vec!["ws://127.0.0.1:1".to_string(), url.clone()],
            name: None,
        })
        .await
        .unwrap();
        assert_eq!(client.server(), url);
        assert_eq!(client.info().server_name, "fake");
        client.drain().await;
    }

    #[tokio::test]
    async fn test_rejected_connect_reports_server_error() {
        let url = start_fake_server(FakeBehavior {
            reject_connect: true,
            ..Default::default()
        })
        .await;
        let err = NatsClient::connect(&options(url)).await.unwrap_err();
        assert_eq!(err, ClientError::Rejected("Authorization Violation".to_string()));
    }

    #[tokio::test]
    async fn test_publish_is_delivered_to_subscription() {
        let url = start_fake_server(FakeBehavior::default()).await;
        let mut client = NatsClient::connect(&options(url)).await.unwrap();

        let mut sub = client.subscribe("hello").unwrap();
        client.publish("hello", encode_text("world")).unwrap();

        let msg = timeout(Duration::from_secs(5), sub.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.subject, "hello");
        assert_eq!(decode_text(&msg.payload), "world");
        assert_eq!(sub.processed(), 1);

        client.drain().await;
        let end = timeout(Duration::from_secs(5), sub.next()).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribed_subject_gets_nothing() {
        let url = start_fake_server(FakeBehavior::default()).await;
        let mut client = NatsClient::connect(&options(url)).await.unwrap();

        let old = client.subscribe("x").unwrap();
        old.unsubscribe();
        let mut new = client.subscribe("y").unwrap();

        client.publish("x", encode_text("stale")).unwrap();
        client.publish("y", encode_text("fresh")).unwrap();

        let msg = timeout(Duration::from_secs(5), new.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(decode_text(&msg.payload), "fresh");
        client.drain().await;
    }

    #[tokio::test]
    async fn test_refused_subscription_ends_stream_with_server_error() {
        let url = start_fake_server(FakeBehavior {
            reject_subscribe: true,
            ..Default::default()
        })
        .await;
        let mut client = NatsClient::connect(&options(url)).await.unwrap();
        let mut sub = client.subscribe("secret").unwrap();

        let first = timeout(Duration::from_secs(5), sub.next()).await.unwrap();
        assert_eq!(
            first,
            Some(Err(ClientError::Rejected(
                "Permissions Violation for Subscription to \"secret\"".to_string()
            )))
        );
        assert!(timeout(Duration::from_secs(5), sub.next()).await.unwrap().is_none());

        // The connection itself stays usable
        assert!(!client.is_closed());
        client.publish("other", encode_text("still here")).unwrap();
        client.drain().await;
    }

    #[tokio::test]
    async fn test_server_close_ends_stream_with_error() {
        let url = start_fake_server(FakeBehavior {
            close_after_subscribe: true,
            ..Default::default()
        })
        .await;
        let mut client = NatsClient::connect(&options(url)).await.unwrap();
        let mut sub = client.subscribe("doomed").unwrap();

        let first = timeout(Duration::from_secs(5), sub.next()).await.unwrap();
        assert!(matches!(first, Some(Err(_))));
        assert!(timeout(Duration::from_secs(5), sub.next()).await.unwrap().is_none());

        timeout(Duration::from_secs(5), client.closed()).await.unwrap();
        assert!(client.is_closed());
        assert!(client.subscribe("again").is_err());
    }
}
