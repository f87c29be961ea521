//! NATS client protocol - encoding of client ops and a streaming parser for server ops
//!
//! The protocol is line based: a control line terminated by CRLF, followed by
//! a payload block (also CRLF terminated) for `PUB` and `MSG`. Over WebSocket
//! the server is free to split an op across frames or pack several ops into
//! one frame, so the parser buffers bytes until a complete op is available.

use serde::{Deserialize, Serialize};

use crate::network::client::ClientError;

const CRLF: &[u8] = b"\r\n";

/// Server information sent in the `INFO` greeting
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServerInfo {
    #[serde(default)]
    pub server_id: String,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub max_payload: usize,
    #[serde(default)]
    pub headers: bool,
    #[serde(default)]
    pub auth_required: bool,
}

/// Options sent with `CONNECT`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConnectInfo {
    pub verbose: bool,
    pub pedantic: bool,
    pub tls_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lang: &'static str,
    pub version: &'static str,
    pub protocol: u8,
    pub echo: bool,
    pub headers: bool,
    pub no_responders: bool,
}

impl ConnectInfo {
    pub fn new(name: Option<String>) -> Self {
        ConnectInfo {
            verbose: false,
            pedantic: false,
            tls_required: false,
            name,
            lang: "rust",
            version: env!("CARGO_PKG_VERSION"),
            protocol: 1,
            echo: true,
            // HMSG is never parsed, so headers stay off
            headers: false,
            no_responders: false,
        }
    }
}

/// Operations sent by the client
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOp {
    Connect(ConnectInfo),
    Pub { subject: String, payload: Vec<u8> },
    Sub { subject: String, sid: u64 },
    Unsub { sid: u64 },
    Ping,
    Pong,
}

impl ClientOp {
    /// Serialize the op into its wire form
    pub fn encode(&self) -> Result<Vec<u8>, ClientError> {
        let bytes = match self {
            ClientOp::Connect(info) => {
                let json = serde_json::to_string(info)
                    .map_err(|e| ClientError::Protocol(format!("CONNECT encode failed: {}", e)))?;
                format!("CONNECT {}\r\n", json).into_bytes()
            }
            ClientOp::Pub { subject, payload } => {
                let mut out = format!("PUB {} {}\r\n", subject, payload.len()).into_bytes();
                out.extend_from_slice(payload);
                out.extend_from_slice(CRLF);
                out
            }
            ClientOp::Sub { subject, sid } => format!("SUB {} {}\r\n", subject, sid).into_bytes(),
            ClientOp::Unsub { sid } => format!("UNSUB {}\r\n", sid).into_bytes(),
            ClientOp::Ping => b"PING\r\n".to_vec(),
            ClientOp::Pong => b"PONG\r\n".to_vec(),
        };
        Ok(bytes)
    }
}

/// Operations received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerOp {
    Info(ServerInfo),
    Msg {
        subject: String,
        sid: u64,
        payload: Vec<u8>,
    },
    Ping,
    Pong,
    Ok,
    Err(String),
}

/// Incremental parser for the server side of the protocol
#[derive(Debug, Default)]
pub struct Parser {
    buf: Vec<u8>,
    /// Largest `MSG` payload accepted, 0 for no limit
    max_payload: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the `max_payload` announced in the server's `INFO`
    pub fn set_max_payload(&mut self, max_payload: usize) {
        self.max_payload = max_payload;
    }

    /// Append raw bytes read from the transport
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Take the next complete op out of the buffer.
    ///
    /// Returns `Ok(None)` when more bytes are needed.
    pub fn next_op(&mut self) -> Result<Option<ServerOp>, ClientError> {
        let Some(line_end) = find_crlf(&self.buf) else {
            return Ok(None);
        };

        let line = std::str::from_utf8(&self.buf[..line_end])
            .map_err(|_| ClientError::Protocol("control line is not valid UTF-8".to_string()))?;
        let (verb, rest) = match line.split_once([' ', '\t']) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line.trim(), ""),
        };

        let (op, consumed) = match verb.to_ascii_uppercase().as_str() {
            "MSG" => {
                let args: Vec<&str> = rest.split_whitespace().collect();
                // The optional reply subject is not used
                let (subject, sid, len) = match args.as_slice() {
                    [subject, sid, len] | [subject, sid, _, len] => (*subject, *sid, *len),
                    _ => return Err(ClientError::Protocol(format!("malformed MSG: {}", line))),
                };
                let sid = sid
                    .parse::<u64>()
                    .map_err(|_| ClientError::Protocol(format!("bad sid in MSG: {}", line)))?;
                let len = len
                    .parse::<usize>()
                    .map_err(|_| ClientError::Protocol(format!("bad size in MSG: {}", line)))?;

                if self.max_payload > 0 && len > self.max_payload {
                    return Err(ClientError::Protocol(format!(
                        "MSG size {} exceeds max_payload {}",
                        len, self.max_payload
                    )));
                }

                let payload_start = line_end + CRLF.len();
                let Some(frame_end) = payload_start
                    .checked_add(len)
                    .and_then(|end| end.checked_add(CRLF.len()))
                else {
                    return Err(ClientError::Protocol(format!("bad size in MSG: {}", line)));
                };
                let payload_end = frame_end - CRLF.len();
                if self.buf.len() < frame_end {
                    return Ok(None);
                }
                if &self.buf[payload_end..frame_end] != CRLF {
                    return Err(ClientError::Protocol(format!(
                        "MSG payload not terminated: {}",
                        line
                    )));
                }

                let op = ServerOp::Msg {
                    subject: subject.to_string(),
                    sid,
                    payload: self.buf[payload_start..payload_end].to_vec(),
                };
                (op, frame_end)
            }
            "INFO" => {
                let info: ServerInfo = serde_json::from_str(rest)
                    .map_err(|e| ClientError::Protocol(format!("bad INFO: {}", e)))?;
                (ServerOp::Info(info), line_end + CRLF.len())
            }
            "PING" => (ServerOp::Ping, line_end + CRLF.len()),
            "PONG" => (ServerOp::Pong, line_end + CRLF.len()),
            "+OK" => (ServerOp::Ok, line_end + CRLF.len()),
            "-ERR" => (
                ServerOp::Err(rest.trim_matches('\'').to_string()),
                line_end + CRLF.len(),
            ),
            _ => return Err(ClientError::Protocol(format!("unknown op: {}", line))),
        };

        self.buf.drain(..consumed);
        Ok(Some(op))
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(CRLF.len()).position(|w| w == CRLF)
}
