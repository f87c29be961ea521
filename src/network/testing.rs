//! In-process NATS-over-WebSocket server for tests.
//!
//! Understands just enough of the protocol to route `PUB` to `SUB` on the
//! same connection. Each client op is expected in its own frame, which is
//! how the client sends them.

use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FakeBehavior {
    /// Answer `CONNECT` with `-ERR 'Authorization Violation'`
    pub reject_connect: bool,
    /// Close the socket right after the first `SUB`
    pub close_after_subscribe: bool,
    /// Answer every `SUB` with a permissions `-ERR` and drop it
    pub reject_subscribe: bool,
}

/// Start a server on an ephemeral port and return its `ws://` URL
pub(crate) async fn start_fake_server(behavior: FakeBehavior) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake server");
    let addr = listener.local_addr().expect("fake server address");

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, behavior));
        }
    });

    format!("ws://{}", addr)
}

async fn serve(stream: TcpStream, behavior: FakeBehavior) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };

    let info = r#"INFO {"server_id":"FAKE","server_name":"fake","version":"2.10.0","max_payload":1048576,"headers":true}"#;
    if ws.send(binary(format!("{}\r\n", info))).await.is_err() {
        return;
    }

    let mut subs: HashMap<u64, String> = HashMap::new();

    while let Some(Ok(frame)) = ws.next().await {
        let data = match frame {
            Message::Binary(data) => data,
            Message::Text(text) => text.into_bytes(),
            Message::Close(_) => break,
            _ => continue,
        };
        let text = String::from_utf8_lossy(&data).into_owned();
        let (line, body) = text.split_once("\r\n").unwrap_or((text.as_str(), ""));
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("CONNECT") if behavior.reject_connect => {
                let _ = ws.send(binary("-ERR 'Authorization Violation'\r\n".to_string())).await;
                // Never answer the PING; wait for the client to hang up
                while let Some(Ok(_)) = ws.next().await {}
                return;
            }
            Some("PING") => {
                if ws.send(binary("PONG\r\n".to_string())).await.is_err() {
                    return;
                }
            }
            Some("SUB") => {
                let subject = parts.next().unwrap_or_default().to_string();
                let sid = parts.next().and_then(|s| s.parse().ok()).unwrap_or_default();
                if behavior.reject_subscribe {
                    let err = format!(
                        "-ERR 'Permissions Violation for Subscription to \"{}\"'\r\n",
                        subject
                    );
                    if ws.send(binary(err)).await.is_err() {
                        return;
                    }
                    continue;
                }
                subs.insert(sid, subject);
                if behavior.close_after_subscribe {
                    let _ = ws.close(None).await;
                    return;
                }
            }
            Some("UNSUB") => {
                if let Some(sid) = parts.next().and_then(|s| s.parse::<u64>().ok()) {
                    subs.remove(&sid);
                }
            }
            Some("PUB") => {
                let subject = parts.next().unwrap_or_default();
                let payload = body.strip_suffix("\r\n").unwrap_or(body);
                let targets: Vec<u64> = subs
                    .iter()
                    .filter(|(_, s)| s.as_str() == subject)
                    .map(|(sid, _)| *sid)
                    .collect();
                for sid in targets {
                    let msg = format!("MSG {} {} {}\r\n{}\r\n", subject, sid, payload.len(), payload);
                    if ws.send(binary(msg)).await.is_err() {
                        return;
                    }
                }
            }
            _ => {}
        }
    }
}

fn binary(text: String) -> Message {
    Message::Binary(text.into_bytes())
}
