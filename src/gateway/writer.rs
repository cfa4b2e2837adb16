use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::events::GatewayFrame;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsSink = SplitSink<WsStream, Message>;

/// Code and reason for closing the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseRequest {
    pub code: u16,
    pub reason: String,
}

impl CloseRequest {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// Everything that reaches the socket goes through this.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(GatewayFrame),
    Close(CloseRequest),
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// The writer task is the only owner of the sink. It stops after sending a
/// close frame, on a send failure, or once every sender is dropped.
pub fn spawn_writer(mut sink: WsSink, mut rx: mpsc::UnboundedReceiver<Outbound>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let message = match outbound {
                Outbound::Frame(frame) => match serde_json::to_string(&frame) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        tracing::error!("failed to serialize gateway frame: {e}");
                        continue;
                    }
                },
                Outbound::Close(request) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(request.code),
                        reason: request.reason.into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!("gateway close frame not sent: {e}");
                    }
                    break;
                }
            };

            if let Err(e) = sink.send(message).await {
                tracing::debug!("gateway writer stopped: {e}");
                break;
            }
        }
    })
}
