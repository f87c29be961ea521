//! WebSocket transport - carries NATS protocol ops over a WebSocket connection

use std::collections::HashMap;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

use crate::network::client::{ClientError, InboundMessage};
use crate::network::proto::{ClientOp, Parser, ServerOp};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsWriter = SplitSink<WsStream, Message>;
pub(crate) type WsReader = SplitStream<WsStream>;

pub(crate) type Delivery = Result<InboundMessage, ClientError>;

/// Requests from client handles to the transport task
#[derive(Debug)]
pub(crate) enum TransportOp {
    Publish {
        subject: String,
        payload: Vec<u8>,
    },
    Subscribe {
        sid: u64,
        subject: String,
        deliveries: mpsc::UnboundedSender<Delivery>,
    },
    Unsubscribe {
        sid: u64,
    },
    /// Unsubscribe everything, flush, close, then signal `done`
    Drain {
        done: oneshot::Sender<()>,
    },
}

/// Write a single op as one binary frame
pub(crate) async fn send_op(write: &mut WsWriter, op: &ClientOp) -> Result<(), ClientError> {
    let bytes = op.encode()?;
    write
        .send(Message::Binary(bytes))
        .await
        .map_err(|e| ClientError::Transport(format!("send failed: {}", e)))
}

/// Read frames until the parser yields a complete server op
pub(crate) async fn next_server_op(
    read: &mut WsReader,
    parser: &mut Parser,
) -> Result<ServerOp, ClientError> {
    loop {
        if let Some(op) = parser.next_op()? {
            return Ok(op);
        }

        match read.next().await {
            Some(Ok(Message::Binary(data))) => parser.push(&data),
            Some(Ok(Message::Text(text))) => parser.push(text.as_bytes()),
            Some(Ok(Message::Close(frame))) => return Err(ClientError::Closed(close_reason(frame))),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(ClientError::Transport(format!("receive failed: {}", e))),
            None => return Err(ClientError::ConnectionClosed),
        }
    }
}

/// Run the transport until drained, until every client handle is gone, or
/// until the connection fails.
///
/// On failure every live subscription receives the error once before its
/// stream ends. `closed_tx` flips to `true` when the task exits.
pub(crate) async fn run_transport(
    mut write: WsWriter,
    mut read: WsReader,
    mut parser: Parser,
    mut ops_rx: mpsc::UnboundedReceiver<TransportOp>,
    closed_tx: watch::Sender<bool>,
) {
    let mut subs: HashMap<u64, mpsc::UnboundedSender<Delivery>> = HashMap::new();

    // Ops may already be buffered behind the handshake PONG
    let failure = match dispatch(&mut parser, &mut subs, &mut write).await {
        Err(e) => Some(e),
        Ok(()) => loop {
            tokio::select! {
                biased;

                op = ops_rx.recv() => {
                    match op {
                        Some(TransportOp::Publish { subject, payload }) => {
                            if let Err(e) = send_op(&mut write, &ClientOp::Pub { subject, payload }).await {
                                break Some(e);
                            }
                        }
                        Some(TransportOp::Subscribe { sid, subject, deliveries }) => {
                            subs.insert(sid, deliveries);
                            if let Err(e) = send_op(&mut write, &ClientOp::Sub { subject, sid }).await {
                                break Some(e);
                            }
                        }
                        Some(TransportOp::Unsubscribe { sid }) => {
                            if subs.remove(&sid).is_some() {
                                if let Err(e) = send_op(&mut write, &ClientOp::Unsub { sid }).await {
                                    break Some(e);
                                }
                            }
                        }
                        Some(TransportOp::Drain { done }) => {
                            for sid in subs.keys().copied().collect::<Vec<_>>() {
                                let _ = send_op(&mut write, &ClientOp::Unsub { sid }).await;
                            }
                            subs.clear();
                            let _ = write.flush().await;
                            let _ = write.close().await;
                            tracing::debug!("Transport drained");
                            let _ = done.send(());
                            break None;
                        }
                        None => {
                            // Every handle dropped without draining
                            let _ = write.close().await;
                            break None;
                        }
                    }
                }

                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Binary(data))) => {
                            parser.push(&data);
                            if let Err(e) = dispatch(&mut parser, &mut subs, &mut write).await {
                                break Some(e);
                            }
                        }
                        Some(Ok(Message::Text(text))) => {
                            parser.push(text.as_bytes());
                            if let Err(e) = dispatch(&mut parser, &mut subs, &mut write).await {
                                break Some(e);
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break Some(ClientError::Closed(close_reason(frame)));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            break Some(ClientError::Transport(format!("receive failed: {}", e)));
                        }
                        None => break Some(ClientError::ConnectionClosed),
                    }
                }
            }
        },
    };

    if let Some(error) = failure {
        tracing::warn!(error = %error, subscriptions = subs.len(), "Transport failed");
        for deliveries in subs.values() {
            let _ = deliveries.send(Err(error.clone()));
        }
    }
    drop(subs);
    let _ = closed_tx.send(true);
}

/// Route every complete op currently in the parser buffer
async fn dispatch(
    parser: &mut Parser,
    subs: &mut HashMap<u64, mpsc::UnboundedSender<Delivery>>,
    write: &mut WsWriter,
) -> Result<(), ClientError> {
    while let Some(op) = parser.next_op()? {
        match op {
            ServerOp::Msg { subject, sid, payload, .. } => {
                let Some(deliveries) = subs.get(&sid) else {
                    // Late message for a sid we already dropped
                    continue;
                };
                if deliveries.send(Ok(InboundMessage { subject, payload })).is_err() {
                    subs.remove(&sid);
                    send_op(write, &ClientOp::Unsub { sid }).await?;
                }
            }
            ServerOp::Ping => send_op(write, &ClientOp::Pong).await?,
            ServerOp::Err(message) => {
                tracing::warn!(error = %message, "Server reported error");
                if !is_subscription_error(&message) {
                    continue;
                }
                // The server does not name the sid; blame the newest subscription
                let Some(sid) = subs.keys().max().copied() else {
                    continue;
                };
                if let Some(deliveries) = subs.remove(&sid) {
                    let _ = deliveries.send(Err(ClientError::Rejected(message)));
                }
            }
            ServerOp::Pong | ServerOp::Ok | ServerOp::Info(_) => {}
        }
    }
    Ok(())
}

/// `-ERR`s that refuse a `SUB` rather than the connection or a publish
fn is_subscription_error(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("for subscription")
        || message == "invalid subject"
        || message.contains("maximum subscriptions")
}

fn close_reason(frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'_>>) -> String {
    frame
        .map(|f| format!("{}: {}", f.code, f.reason))
        .unwrap_or_else(|| "Connection closed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_errors_are_recognized() {
        assert!(is_subscription_error(
            "Permissions Violation for Subscription to \"secret\""
        ));
        assert!(is_subscription_error("Invalid Subject"));
        assert!(is_subscription_error("Maximum Subscriptions Exceeded"));
        assert!(!is_subscription_error(
            "Permissions Violation for Publish to \"secret\""
        ));
        assert!(!is_subscription_error("Invalid Publish Subject"));
        assert!(!is_subscription_error("Authorization Violation"));
    }
}
