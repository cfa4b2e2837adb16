#![allow(dead_code)]

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use cordwire::rest::Credentials;
use cordwire::Config;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

/// How long a test waits for the client to do something before failing.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

pub const TOKEN: &str = "test-token";

/// Binds a TCP listener on port 0, spawns the router, and returns the address.
pub async fn spawn_router(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

/// Client config pointed at local mock servers, with a short invalid-session wait.
pub fn test_config(gateway_addr: &str, api_addr: &str) -> Config {
    let mut config = Config::new(Credentials::bot(TOKEN));
    config.gateway_url = format!("ws://{gateway_addr}");
    config.api_url = format!("http://{api_addr}/api/v6");
    config.invalid_session_backoff = Duration::from_millis(10)..=Duration::from_millis(30);
    config
}

enum ServerAction {
    Send(Value),
    Close(u16, String),
    CloseWithoutStatus,
    Drop,
}

/// One accepted client socket, driven by the test.
pub struct MockSocket {
    incoming: mpsc::UnboundedReceiver<Value>,
    actions: mpsc::UnboundedSender<ServerAction>,
}

impl MockSocket {
    pub fn send(&self, frame: Value) {
        let _ = self.actions.send(ServerAction::Send(frame));
    }

    pub fn hello(&self, heartbeat_interval_ms: u64) {
        self.send(json!({ "op": 10, "d": { "heartbeat_interval": heartbeat_interval_ms } }));
    }

    pub fn dispatch(&self, name: &str, sequence: u64, data: Value) {
        self.send(json!({ "op": 0, "s": sequence, "t": name, "d": data }));
    }

    pub fn close(&self, code: u16, reason: &str) {
        let _ = self.actions.send(ServerAction::Close(code, reason.to_string()));
    }

    /// Close frame with no status code.
    pub fn close_without_status(&self) {
        let _ = self.actions.send(ServerAction::CloseWithoutStatus);
    }

    /// Drop the TCP stream without any close frame.
    pub fn drop_connection(&self) {
        let _ = self.actions.send(ServerAction::Drop);
    }

    /// Next frame from the client, heartbeats included.
    pub async fn next_frame(&mut self) -> Value {
        tokio::time::timeout(STEP_TIMEOUT, self.incoming.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client socket closed")
    }

    /// Next frame from the client that isn't a heartbeat.
    pub async fn next_command(&mut self) -> Value {
        loop {
            let frame = self.next_frame().await;
            if frame["op"] != 1 {
                return frame;
            }
        }
    }
}

/// Gateway stand-in. Each client connection shows up as a [`MockSocket`].
pub struct MockGateway {
    pub addr: String,
    sockets: mpsc::UnboundedReceiver<MockSocket>,
}

impl MockGateway {
    pub async fn spawn() -> Self {
        let (tx, sockets) = mpsc::unbounded_channel();
        let app = Router::new().route("/", get(upgrade)).with_state(tx);
        let addr = spawn_router(app).await;
        Self { addr, sockets }
    }

    pub async fn accept(&mut self) -> MockSocket {
        tokio::time::timeout(STEP_TIMEOUT, self.sockets.recv())
            .await
            .expect("timed out waiting for the client to connect")
            .expect("mock gateway stopped")
    }
}

async fn upgrade(
    ws: WebSocketUpgrade,
    State(sockets): State<mpsc::UnboundedSender<MockSocket>>,
) -> Response {
    ws.on_upgrade(move |socket| drive_socket(socket, sockets))
}

async fn drive_socket(socket: WebSocket, sockets: mpsc::UnboundedSender<MockSocket>) {
    let (incoming_tx, incoming) = mpsc::unbounded_channel();
    let (actions, mut actions_rx) = mpsc::unbounded_channel();
    if sockets.send(MockSocket { incoming, actions }).is_err() {
        return;
    }

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            action = actions_rx.recv() => match action {
                Some(ServerAction::Send(frame)) => {
                    if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                        return;
                    }
                }
                Some(ServerAction::Close(code, reason)) => {
                    let frame = CloseFrame { code, reason: reason.into() };
                    let _ = sink.send(Message::Close(Some(frame))).await;
                    return;
                }
                Some(ServerAction::CloseWithoutStatus) => {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
                Some(ServerAction::Drop) | None => return,
            },
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                        let _ = incoming_tx.send(value);
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => {}
            },
        }
    }
}
