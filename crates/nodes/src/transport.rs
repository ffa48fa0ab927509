//! Outbound HTTP used by the `webhook` action.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::TransportError;
use crate::url_guard::resolve_checked;

/// Methods a webhook node may be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Case-insensitive parse; `None` for anything outside the supported set.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated outbound call.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: HttpMethod,
    /// Already passed [`crate::url_guard::check_url`].
    pub url: Url,
    pub headers: Vec<(String, String)>,
    /// Sent as JSON for every method except `GET`.
    pub body: Value,
}

/// Sends a [`WebhookRequest`] and reports the response status.
///
/// Any completed HTTP exchange is `Ok`, including 4xx/5xx.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send(&self, request: WebhookRequest) -> Result<u16, TransportError>;
}

/// [`WebhookTransport`] over a shared `reqwest::Client`.
///
/// Redirects are never followed: the target of a redirect has not been
/// through the URL guard. The host is resolved and re-checked before each
/// request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .user_agent(concat!("agent-workflows/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookTransport for ReqwestTransport {
    async fn send(&self, request: WebhookRequest) -> Result<u16, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        resolve_checked(&request.url)
            .await
            .map_err(|reason| TransportError::Blocked(reason.to_string()))?;

        let mut builder = self.client.request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.method != HttpMethod::Get {
            builder = builder.json(&request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}
