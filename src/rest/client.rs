use dashmap::DashMap;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::auth::Credentials;
use super::rate_limit::{RateLimitedExecutor, SharedBucket, HEADER_PRECISION};
use super::response::RestResponse;
use crate::config::{Config, CLIENT_NAME};
use crate::error::RestError;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayInfo {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    pub reset_after: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayBotInfo {
    pub url: String,
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateMessage {
    pub content: String,
    pub tts: bool,
    pub nonce: Option<String>,
}

/// Authenticated, rate-limited access to the REST API.
pub struct RestClient {
    http: reqwest::Client,
    api_url: String,
    credentials: Credentials,
    limiter: RateLimitedExecutor,
    buckets: DashMap<String, SharedBucket>,
}

impl RestClient {
    pub fn new(config: &Config) -> Self {
        Self::with_http(config, reqwest::Client::new())
    }

    pub fn with_http(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            credentials: config.credentials.clone(),
            limiter: RateLimitedExecutor::new(config.rate_limit_max_attempts),
            buckets: DashMap::new(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Bucket for a route key, created on first use.
    pub fn bucket(&self, route: &str) -> SharedBucket {
        self.buckets.entry(route.to_string()).or_default().clone()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<RestResponse<T>, RestError> {
        self.send(Method::GET, path, None::<&()>, HeaderMap::new(), None)
            .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<RestResponse<T>, RestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, path, Some(body), HeaderMap::new(), None)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<RestResponse<T>, RestError> {
        self.send(Method::DELETE, path, None::<&()>, HeaderMap::new(), None)
            .await
    }

    /// Sends a request through the rate limiter. Without a bucket the
    /// limiter's default bucket is used.
    pub async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        headers: HeaderMap,
        bucket: Option<&SharedBucket>,
    ) -> Result<RestResponse<T>, RestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let body = body.map(serde_json::to_string).transpose()?;
        let headers = self.request_headers(headers);

        let request_fn = || self.dispatch::<T>(method.clone(), &url, body.as_deref(), &headers);
        match bucket {
            Some(bucket) => self.limiter.execute_in(bucket, request_fn).await,
            None => self.limiter.execute(request_fn).await,
        }
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<RestResponse<T>, RestError> {
        let mut builder = self.http.request(method, url).headers(headers.clone());
        if let Some(body) = body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }
        let resp = builder.send().await?;
        RestResponse::from_reqwest(resp).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path.trim_start_matches('/'))
    }

    /// Caller headers plus auth, user agent and millisecond rate-limit precision.
    fn request_headers(&self, mut headers: HeaderMap) -> HeaderMap {
        match HeaderValue::from_str(&self.credentials.header_value()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => tracing::warn!("token is not a valid header value: {e}"),
        }
        if let Ok(agent) = HeaderValue::from_str(&user_agent()) {
            headers.insert(USER_AGENT, agent);
        }
        headers.insert(HEADER_PRECISION, HeaderValue::from_static("millisecond"));
        headers
    }

    pub async fn get_gateway(&self) -> Result<RestResponse<GatewayInfo>, RestError> {
        self.get("gateway").await
    }

    pub async fn get_gateway_bot(&self) -> Result<RestResponse<GatewayBotInfo>, RestError> {
        self.get("gateway/bot").await
    }

    pub async fn get_current_user(&self) -> Result<RestResponse<Value>, RestError> {
        self.get("users/@me").await
    }

    pub async fn create_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<RestResponse<Value>, RestError> {
        let route = format!("channels/{channel_id}/messages");
        let body = CreateMessage {
            content: content.to_string(),
            tts: false,
            nonce: None,
        };
        let bucket = self.bucket(&route);
        self.send(Method::POST, &route, Some(&body), HeaderMap::new(), Some(&bucket))
            .await
    }
}

fn user_agent() -> String {
    format!(
        "DiscordBot ({CLIENT_NAME}, {})",
        env!("CARGO_PKG_VERSION")
    )
}
