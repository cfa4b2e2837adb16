use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RestError;

/// Decoded HTTP response. `data` is `None` when the body doesn't fit `T`;
/// status, headers and the raw body are always kept.
#[derive(Debug, Clone)]
pub struct RestResponse<T> {
    pub data: Option<T>,
    pub raw: Value,
    pub status: u16,
    pub headers: HeaderMap,
}

impl<T: DeserializeOwned> RestResponse<T> {
    pub fn from_parts(status: u16, headers: HeaderMap, body: &str) -> Self {
        let raw = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
        };
        let data = T::deserialize(&raw).ok();
        Self {
            data,
            raw,
            status,
            headers,
        }
    }

    pub async fn from_reqwest(response: reqwest::Response) -> Result<Self, RestError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        Ok(Self::from_parts(status, headers, &body))
    }
}

impl<T> RestResponse<T> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
