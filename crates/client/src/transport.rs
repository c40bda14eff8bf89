//! HTTP transport with snapshot capture.
//!
//! The transport resolves a request to a [`Snapshot`]: the response body is
//! read fully into refcounted bytes before the snapshot is built, so the
//! single-read network stream is consumed exactly once. A resolved response
//! of any status is `Ok`; `Err` means no response could be produced at all.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use outpost_core::{Error, Method, ResourceRequest, Snapshot};
use reqwest::{Client, header};

/// How the transport may use intermediate HTTP caches for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Normal HTTP caching semantics.
    #[default]
    Default,
    /// Bypass intermediate caches and force end-to-end revalidation.
    Reload,
}

/// Per-fetch transport options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    pub cache: CacheMode,
}

impl FetchOptions {
    /// Options forcing intermediate-cache bypass.
    pub fn reload() -> Self {
        Self { cache: CacheMode::Reload }
    }
}

/// A network transport that resolves requests to response snapshots.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(
        &self,
        request: &ResourceRequest,
        options: FetchOptions,
    ) -> Result<Snapshot, Error>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// User agent string (default: "outpost/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            user_agent: "outpost/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20_000),
            max_redirects: 5,
        }
    }
}

/// HTTP transport built on reqwest.
pub struct HttpTransport {
    http: Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

fn http_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        request: &ResourceRequest,
        options: FetchOptions,
    ) -> Result<Snapshot, Error> {
        let start = Instant::now();

        let mut builder = self
            .http
            .request(http_method(request.method), request.url.clone());

        if options.cache == CacheMode::Reload {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Unreachable(format!("network error: {e}")))?;

        let status = response.status().as_u16();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::TooLarge(format!(
                "{} bytes exceeds {}",
                len, self.config.max_bytes
            )));
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Unreachable(format!("failed to read response body: {e}")))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::TooLarge(format!(
                "{} bytes exceeds {}",
                body.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            request.url,
            status,
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Snapshot::new(status, headers, body))
    }
}
