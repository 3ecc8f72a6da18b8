//! Fake streaming gateway for integration tests.
//!
//! Accepts WebSocket connections on an ephemeral port, answers the protocol
//! request and login, records every request frame and replies to data
//! requests through a per-test responder.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use flux_stream::{Session, SessionConfig, StaticCredentials, StaticGatewayResolver};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Token presented by test sessions.
pub const TEST_TOKEN: &str = "test-token";

/// One scheduled reply.
#[derive(Debug, Clone)]
pub struct Reply {
    /// Delay before sending.
    pub delay: Duration,
    /// Message text.
    pub text: String,
}

impl Reply {
    pub fn now(text: String) -> Self {
        Self {
            delay: Duration::ZERO,
            text,
        }
    }

    pub fn after(delay: Duration, text: String) -> Self {
        Self { delay, text }
    }
}

/// Produces replies for one request frame.
pub type Responder = Arc<dyn Fn(&Value) -> Vec<Reply> + Send + Sync>;

/// How the fake gateway behaves.
#[derive(Clone)]
pub struct Behavior {
    /// Acknowledgement of the protocol request; `None` never answers.
    pub ack: Option<Value>,
    /// Reply to the login frame.
    pub login_kind: &'static str,
    /// Close the first connection shortly after login.
    pub drop_first_connection: bool,
    /// Connections from this index on are dropped before the WebSocket
    /// handshake.
    pub refuse_from: Option<usize>,
    /// Replies to data requests.
    pub responder: Responder,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            ack: Some(json!({"session": "sess-1", "build": "b1", "ver": "27.1.0"})),
            login_kind: "snapshot",
            drop_first_connection: false,
            refuse_from: None,
            responder: Arc::new(|_| Vec::new()),
        }
    }
}

/// Running fake gateway.
pub struct FakeGateway {
    url: String,
    handshakes: Arc<Mutex<Vec<Value>>>,
    envelopes: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
}

impl FakeGateway {
    /// Start a gateway on an ephemeral port.
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let gateway = Self {
            url: format!("ws://{addr}"),
            handshakes: Arc::default(),
            envelopes: Arc::default(),
            connections: Arc::default(),
        };

        let handshakes = gateway.handshakes.clone();
        let envelopes = gateway.envelopes.clone();
        let connections = gateway.connections.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let index = connections.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(
                    stream,
                    index,
                    behavior.clone(),
                    handshakes.clone(),
                    envelopes.clone(),
                ));
            }
        });

        gateway
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Protocol requests received, in order.
    pub fn handshakes(&self) -> Vec<Value> {
        self.handshakes.lock().clone()
    }

    /// Request envelopes received, in order.
    pub fn envelopes(&self) -> Vec<Value> {
        self.envelopes.lock().clone()
    }

    /// Request frames received for `service`.
    pub fn frames_for(&self, service: &str) -> Vec<Value> {
        self.envelopes
            .lock()
            .iter()
            .flat_map(|envelope| envelope["payload"].as_array().cloned().unwrap_or_default())
            .filter(|frame| frame["header"]["service"] == service)
            .collect()
    }

    /// Number of connections accepted.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// A session pointed at this gateway.
    pub fn session(&self, config: SessionConfig) -> Session {
        Session::with_resolver(
            config,
            Arc::new(StaticCredentials::new(TEST_TOKEN).unwrap()),
            Arc::new(StaticGatewayResolver::new(self.url.clone())),
        )
    }
}

async fn serve(
    stream: tokio::net::TcpStream,
    index: usize,
    behavior: Behavior,
    handshakes: Arc<Mutex<Vec<Value>>>,
    envelopes: Arc<Mutex<Vec<Value>>>,
) {
    if behavior.refuse_from.is_some_and(|from| index >= from) {
        return;
    }
    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
    });

    while let Some(Ok(message)) = source.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let value: Value = serde_json::from_str(&text).unwrap();

        if value.get("payload").is_none() {
            handshakes.lock().push(value);
            if let Some(ack) = &behavior.ack {
                let _ = tx.send(Message::Text(ack.to_string().into()));
            }
            continue;
        }

        envelopes.lock().push(value.clone());
        for frame in value["payload"].as_array().cloned().unwrap_or_default() {
            if frame["header"]["service"] == "login" {
                let body = if behavior.login_kind == "error" {
                    json!({"message": "invalid token"})
                } else {
                    json!({"authenticated": true})
                };
                let reply = envelope(&[reply_frame("login", "login", 0, behavior.login_kind, body)]);
                let _ = tx.send(Message::Text(reply.into()));

                if behavior.drop_first_connection && index == 0 {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        let _ = tx.send(Message::Close(None));
                    });
                }
                continue;
            }

            for reply in (behavior.responder)(&frame) {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if !reply.delay.is_zero() {
                        tokio::time::sleep(reply.delay).await;
                    }
                    let _ = tx.send(Message::Text(reply.text.into()));
                });
            }
        }
    }
}

// =============================================================================
// Frame Helpers
// =============================================================================

/// Service tag of a request frame.
pub fn service(frame: &Value) -> &str {
    frame["header"]["service"].as_str().unwrap_or_default()
}

/// Correlation ID of a request frame.
pub fn id(frame: &Value) -> &str {
    frame["header"]["id"].as_str().unwrap_or_default()
}

/// Version of a request frame.
pub fn ver(frame: &Value) -> u64 {
    frame["header"]["ver"].as_u64().unwrap_or_default()
}

/// Inbound frame with the given header and body.
pub fn reply_frame(service: &str, id: &str, ver: u64, kind: &str, body: Value) -> Value {
    json!({
        "header": {"service": service, "id": id, "ver": ver, "type": kind},
        "body": body,
    })
}

/// Snapshot answering `request`.
pub fn snapshot_for(request: &Value, body: Value) -> Value {
    reply_frame(service(request), id(request), ver(request), "snapshot", body)
}

/// Envelope text holding `frames`.
pub fn envelope(frames: &[Value]) -> String {
    json!({"payload": frames}).to_string()
}

/// Chart body for `symbol` with `candles` candles.
pub fn chart_body(symbol: &str, candles: usize) -> Value {
    let timestamps: Vec<i64> = (0..candles).map(|i| 1_700_000_000_000 + i as i64 * 3_600_000).collect();
    let prices: Vec<f64> = (0..candles).map(|i| 100.0 + i as f64).collect();
    json!({
        "symbol": symbol,
        "candles": {
            "timestamps": timestamps,
            "opens": prices,
            "highs": prices,
            "lows": prices,
            "closes": prices,
            "volumes": prices,
        }
    })
}

/// Configuration with short deadlines for tests.
pub fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.timeouts.default = Duration::from_millis(500);
    config.timeouts.batch = Duration::from_millis(300);
    config.connection.handshake_timeout = Duration::from_millis(500);
    config.connection.close_grace = Duration::from_millis(10);
    config
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
