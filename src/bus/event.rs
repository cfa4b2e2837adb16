use serde_json::Value;

/// Tag identifying an [`Event`] variant. Listeners are keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectionClosed,
    SessionReady,
    SessionResumed,
    Dispatch,
}

/// Domain events posted on the [`EventBus`](super::EventBus).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    ConnectionClosed(ConnectionClosed),
    SessionReady(SessionReady),
    SessionResumed(SessionResumed),
    Dispatch(DispatchEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ConnectionClosed(_) => EventKind::ConnectionClosed,
            Event::SessionReady(_) => EventKind::SessionReady,
            Event::SessionResumed(_) => EventKind::SessionResumed,
            Event::Dispatch(_) => EventKind::Dispatch,
        }
    }
}

/// Posted whenever a gateway connection closes, whichever side started it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionClosed {
    pub code: u16,
    pub reason: String,
}

/// Posted once the server acknowledges an IDENTIFY with a ready dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReady {
    pub session_id: String,
    pub version: Option<u8>,
    pub shard: Option<[u32; 2]>,
    pub user: Value,
    /// Guilds the session belongs to, initially unavailable stubs.
    pub guilds: Vec<Value>,
}

/// Posted once the server acknowledges a RESUME.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResumed {
    pub sequence: Option<u64>,
}

/// Raw gateway dispatch, posted for every dispatch frame received.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    pub name: GatewayEventName,
    pub sequence: Option<u64>,
    pub data: Value,
}

/// Typed payload that can be registered for on the bus.
pub trait BusEvent: Send + Sync + 'static {
    const KIND: EventKind;

    fn extract(event: &Event) -> Option<&Self>;
}

macro_rules! bus_event {
    ($variant:ident => $payload:ident) => {
        impl BusEvent for $payload {
            const KIND: EventKind = EventKind::$variant;

            fn extract(event: &Event) -> Option<&Self> {
                match event {
                    Event::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$payload> for Event {
            fn from(inner: $payload) -> Self {
                Event::$variant(inner)
            }
        }
    };
}

bus_event!(ConnectionClosed => ConnectionClosed);
bus_event!(SessionReady => SessionReady);
bus_event!(SessionResumed => SessionResumed);
bus_event!(Dispatch => DispatchEvent);

macro_rules! gateway_event_names {
    ($($variant:ident => $wire:literal),+ $(,)?) => {
        /// Dispatch event names carried in the `t` field of a dispatch frame.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum GatewayEventName {
            $($variant,)+
            Unknown(String),
        }

        impl GatewayEventName {
            /// Case-insensitive; names we don't know are kept as `Unknown`.
            pub fn from_wire(name: &str) -> Self {
                $(
                    if name.eq_ignore_ascii_case($wire) {
                        return GatewayEventName::$variant;
                    }
                )+
                GatewayEventName::Unknown(name.to_string())
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $(GatewayEventName::$variant => $wire,)+
                    GatewayEventName::Unknown(name) => name,
                }
            }
        }
    };
}

gateway_event_names! {
    Hello => "HELLO",
    Ready => "READY",
    Resumed => "RESUMED",
    Reconnect => "RECONNECT",
    InvalidSession => "INVALID_SESSION",
    ChannelCreate => "CHANNEL_CREATE",
    ChannelUpdate => "CHANNEL_UPDATE",
    ChannelDelete => "CHANNEL_DELETE",
    ChannelPinsUpdate => "CHANNEL_PINS_UPDATE",
    GuildCreate => "GUILD_CREATE",
    GuildUpdate => "GUILD_UPDATE",
    GuildDelete => "GUILD_DELETE",
    GuildBanAdd => "GUILD_BAN_ADD",
    GuildBanRemove => "GUILD_BAN_REMOVE",
    GuildEmojisUpdate => "GUILD_EMOJIS_UPDATE",
    GuildIntegrationsUpdate => "GUILD_INTEGRATIONS_UPDATE",
    GuildMemberAdd => "GUILD_MEMBER_ADD",
    GuildMemberRemove => "GUILD_MEMBER_REMOVE",
    GuildMemberUpdate => "GUILD_MEMBER_UPDATE",
    GuildMembersChunk => "GUILD_MEMBERS_CHUNK",
    GuildRoleCreate => "GUILD_ROLE_CREATE",
    GuildRoleUpdate => "GUILD_ROLE_UPDATE",
    GuildRoleDelete => "GUILD_ROLE_DELETE",
    MessageCreate => "MESSAGE_CREATE",
    MessageUpdate => "MESSAGE_UPDATE",
    MessageDelete => "MESSAGE_DELETE",
    MessageDeleteBulk => "MESSAGE_DELETE_BULK",
    MessageReactionAdd => "MESSAGE_REACTION_ADD",
    MessageReactionRemove => "MESSAGE_REACTION_REMOVE",
    MessageReactionRemoveAll => "MESSAGE_REACTION_REMOVE_ALL",
    PresenceUpdate => "PRESENCE_UPDATE",
    TypingStart => "TYPING_START",
    UserUpdate => "USER_UPDATE",
    VoiceStateUpdate => "VOICE_STATE_UPDATE",
    VoiceServerUpdate => "VOICE_SERVER_UPDATE",
    WebhooksUpdate => "WEBHOOKS_UPDATE",
}
