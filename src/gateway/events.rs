use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opcodes for gateway frames.
pub mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const PRESENCE_UPDATE: u8 = 3;
    pub const VOICE_STATE_UPDATE: u8 = 4;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const REQUEST_GUILD_MEMBERS: u8 = 8;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Close codes this client emits or synthesizes.
pub mod close_code {
    /// User-initiated disconnect.
    pub const NORMAL: u16 = 1000;
    /// Close frame without a status code.
    pub const NO_STATUS: u16 = 1005;
    /// Stream ended without a close frame.
    pub const ABNORMAL: u16 = 1006;
    /// Shared by invalid sessions and zombied connections.
    pub const GENERIC_FAILURE: u16 = 4000;
}

/// Gateway frame envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFrame {
    #[serde(rename = "op")]
    pub opcode: u8,
    #[serde(rename = "d", default)]
    pub payload: Value,
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

impl GatewayFrame {
    /// Outbound frame: no sequence, no event name.
    pub fn command<P: Serialize>(opcode: u8, payload: &P) -> Result<Self, serde_json::Error> {
        Ok(Self {
            opcode,
            payload: serde_json::to_value(payload)?,
            sequence: None,
            event_name: None,
        })
    }

    pub fn heartbeat() -> Self {
        Self {
            opcode: opcode::HEARTBEAT,
            payload: Value::Null,
            sequence: None,
            event_name: None,
        }
    }
}

/// HELLO payload data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Milliseconds.
    pub heartbeat_interval: u64,
}

/// IDENTIFY payload data. `None` fields are sent as explicit nulls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: ConnectionProperties,
    pub compress: Option<bool>,
    pub large_threshold: Option<u32>,
    pub shard: Option<[u32; 2]>,
    pub guild_subscriptions: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProperties {
    #[serde(rename = "$os")]
    pub os: String,
    #[serde(rename = "$browser")]
    pub browser: String,
    #[serde(rename = "$device")]
    pub device: String,
}

/// RESUME payload data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    pub session_id: String,
    #[serde(rename = "seq")]
    pub sequence: u64,
}

/// Data of the `READY` dispatch. Only `session_id` is required.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    #[serde(rename = "v", default)]
    pub version: Option<u8>,
    #[serde(default)]
    pub user: Value,
    #[serde(default)]
    pub guilds: Vec<Value>,
    pub session_id: String,
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
}
