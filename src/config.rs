use std::num::NonZeroU32;
use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::ConfigError;
use crate::rest::auth::{AuthKind, Credentials};

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg";
pub const DEFAULT_GATEWAY_VERSION: u8 = 6;
pub const DEFAULT_API_URL: &str = "https://discord.com/api/v6";
pub const DEFAULT_LARGE_THRESHOLD: u32 = 50;
pub const CLIENT_NAME: &str = "cordwire";

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub gateway_url: String,
    pub gateway_version: u8,
    pub api_url: String,
    pub auto_reconnect: bool,
    /// `[shard_id, shard_count]`, passed through in IDENTIFY.
    pub shard: Option<[u32; 2]>,
    pub large_threshold: Option<u32>,
    pub compress: bool,
    pub guild_subscriptions: bool,
    /// `None` retries rate-limited requests forever.
    pub rate_limit_max_attempts: Option<NonZeroU32>,
    /// Random wait before closing after INVALID_SESSION.
    pub invalid_session_backoff: RangeInclusive<Duration>,
}

impl Config {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_version: DEFAULT_GATEWAY_VERSION,
            api_url: DEFAULT_API_URL.to_string(),
            auto_reconnect: true,
            shard: None,
            large_threshold: Some(DEFAULT_LARGE_THRESHOLD),
            compress: false,
            guild_subscriptions: true,
            rate_limit_max_attempts: None,
            invalid_session_backoff: Duration::from_secs(1)..=Duration::from_secs(5),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let token = std::env::var("CORDWIRE_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::Missing("CORDWIRE_TOKEN"))?;
        let kind = std::env::var("CORDWIRE_AUTH_KIND")
            .ok()
            .and_then(|v| AuthKind::parse(&v))
            .unwrap_or_default();

        let mut config = Self::new(Credentials::new(kind, token));

        if let Ok(url) = std::env::var("CORDWIRE_GATEWAY_URL") {
            config.gateway_url = url;
        }
        if let Some(version) = parsed_var("CORDWIRE_GATEWAY_VERSION") {
            config.gateway_version = version;
        }
        if let Ok(url) = std::env::var("CORDWIRE_API_URL") {
            config.api_url = url;
        }
        if let Ok(value) = std::env::var("CORDWIRE_AUTO_RECONNECT") {
            config.auto_reconnect = !(value == "0" || value.eq_ignore_ascii_case("false"));
        }
        if let Ok(raw) = std::env::var("CORDWIRE_SHARD") {
            let shard = parse_shard(&raw).ok_or(ConfigError::Invalid {
                var: "CORDWIRE_SHARD",
                value: raw.clone(),
            })?;
            config.shard = Some(shard);
        }
        if let Some(threshold) = parsed_var("CORDWIRE_LARGE_THRESHOLD") {
            config.large_threshold = Some(threshold);
        }
        if let Ok(value) = std::env::var("CORDWIRE_COMPRESS") {
            config.compress = value == "1" || value.eq_ignore_ascii_case("true");
        }
        if let Some(attempts) = parsed_var::<NonZeroU32>("CORDWIRE_RATE_LIMIT_MAX_ATTEMPTS") {
            config.rate_limit_max_attempts = Some(attempts);
        }

        Ok(config)
    }

    /// Full gateway URL including protocol version and encoding.
    pub fn gateway_endpoint(&self) -> String {
        format!(
            "{}/?v={}&encoding=json",
            self.gateway_url.trim_end_matches('/'),
            self.gateway_version
        )
    }
}

/// Unparsable values fall back to the default.
fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Parses `id/count`, e.g. `0/2`.
pub fn parse_shard(raw: &str) -> Option<[u32; 2]> {
    let (id, count) = raw.split_once('/')?;
    let id: u32 = id.trim().parse().ok()?;
    let count: u32 = count.trim().parse().ok()?;
    (count > 0 && id < count).then_some([id, count])
}
