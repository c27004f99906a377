// src/fetch/transport.rs

//! Raw HTTP access behind a trait so the ladder can run against fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Proxy};
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::FetchConfig;

/// Which outbound path a request takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Direct, or through `fetch.proxy_url` when configured
    Default,
    /// Through `fetch.rotating_proxy_url`, falling back to `Default`
    Rotating,
}

/// A single GET as the ladder wants it sent.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub route: Route,
    pub timeout: Duration,
}

/// Response reduced to what classification and extraction need.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// URL after redirects
    pub final_url: String,
    pub body: String,
    pub content_length: Option<u64>,
}

impl RawResponse {
    /// Bytes charged against the bandwidth budget.
    pub fn wire_size(&self) -> u64 {
        self.content_length.unwrap_or(self.body.len() as u64)
    }
}

/// Network-level failure; HTTP error statuses are not errors here.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else {
            Self::Other(e.to_string())
        }
    }
}

/// HTTP operations the engine performs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET and return the body whatever the status.
    async fn get(&self, request: &OutboundRequest) -> std::result::Result<RawResponse, TransportError>;

    /// Issue a HEAD and return only the status.
    async fn head(&self, url: &str, timeout: Duration) -> std::result::Result<u16, TransportError>;

    /// POST a JSON document (challenge solver API).
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// reqwest-backed transport with an optional rotating-proxy client.
pub struct HttpTransport {
    direct: Client,
    rotating: Option<Client>,
}

impl HttpTransport {
    /// Build clients from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let direct = Self::build_client(config, config.proxy_url.as_deref())?;
        let rotating = match config.rotating_proxy_url.as_deref() {
            Some(url) => Some(Self::build_client(config, Some(url))?),
            None => None,
        };
        Ok(Self { direct, rotating })
    }

    fn build_client(config: &FetchConfig, proxy: Option<&str>) -> Result<Client> {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        // ranobes serves an interstitial unless this cookie is present
        if let Ok(url) = "https://ranobes.net/".parse::<url::Url>() {
            jar.add_cookie_str("browser_check=1; Domain=ranobes.net; Path=/", &url);
        }

        let mut builder = Client::builder()
            .cookie_provider(jar)
            .timeout(config.timeout())
            .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(proxy_url) = proxy {
            let proxy = Proxy::all(proxy_url)
                .map_err(|e| AppError::config(format!("invalid proxy {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        }

        Ok(builder.build()?)
    }

    fn client(&self, route: Route) -> &Client {
        match route {
            Route::Rotating => self.rotating.as_ref().unwrap_or(&self.direct),
            Route::Default => &self.direct,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &OutboundRequest) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .client(request.route)
            .get(&request.url)
            .headers(request.headers.clone())
            .timeout(request.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_length = response.content_length();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            final_url,
            body,
            content_length,
        })
    }

    async fn head(&self, url: &str, timeout: Duration) -> std::result::Result<u16, TransportError> {
        let response = self.direct.head(url).timeout(timeout).send().await?;
        Ok(response.status().as_u16())
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> std::result::Result<RawResponse, TransportError> {
        let response = self
            .direct
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_length = response.content_length();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            final_url,
            body,
            content_length,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_size_prefers_content_length() {
        let response = RawResponse {
            status: 200,
            final_url: "https://a.com".into(),
            body: "abc".into(),
            content_length: Some(10),
        };
        assert_eq!(response.wire_size(), 10);

        let response = RawResponse {
            content_length: None,
            ..response
        };
        assert_eq!(response.wire_size(), 3);
    }

    #[test]
    fn test_http_transport_builds_with_proxies() {
        let config = FetchConfig {
            proxy_url: Some("http://127.0.0.1:8080".into()),
            rotating_proxy_url: Some("http://127.0.0.1:8081".into()),
            ..FetchConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert!(transport.rotating.is_some());
    }
}
