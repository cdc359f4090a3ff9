//! HTTP client with per-host rate limiting.
//!
//! [`PageFetcher`] is the seam every static discovery stage depends on;
//! [`HttpClient`] is the reqwest-backed implementation.

mod response;

pub use response::{
    parse_content_disposition_filename, signals_pdf, url_path_is_pdf, FetchedPage, HeadInfo,
};

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use tracing::debug;

use super::rate_limiter::RateLimiter;

/// A failed network operation.
///
/// Always non-fatal at the granularity of a single page or link.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkFailure {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {message}")]
    Connect { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl NetworkFailure {
    fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout { url }
        } else if err.is_connect() {
            Self::Connect {
                url,
                message: err.to_string(),
            }
        } else if err.is_body() || err.is_decode() {
            Self::Body {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// GET/HEAD primitive used by discovery.
///
/// Implementations follow redirects and enforce the given timeout. Any
/// HTTP status is returned as a response; only transport failures are errors.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage, NetworkFailure>;

    async fn head(&self, url: &str, timeout: Duration) -> Result<HeadInfo, NetworkFailure>;
}

/// HTTP client with per-host rate limiting.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client sending `user_agent` on every request.
    pub fn new(user_agent: &str, rate_limiter: RateLimiter) -> Result<Self, NetworkFailure> {
        let client = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .cookie_store(true)
            .build()
            .map_err(|e| NetworkFailure::Client(e.to_string()))?;

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// POST a form and read the response.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<FetchedPage, NetworkFailure> {
        self.rate_limiter.acquire(url).await;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .form(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| NetworkFailure::from_reqwest(url, e))?;

        read_page(url, response).await
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchedPage, NetworkFailure> {
        self.rate_limiter.acquire(url).await;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| NetworkFailure::from_reqwest(url, e))?;

        read_page(url, response).await
    }

    async fn head(&self, url: &str, timeout: Duration) -> Result<HeadInfo, NetworkFailure> {
        self.rate_limiter.acquire(url).await;
        debug!("HEAD {}", url);

        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| NetworkFailure::from_reqwest(url, e))?;

        Ok(HeadInfo {
            status: response.status().as_u16(),
            final_url: response.url().to_string(),
            headers: header_map(response.headers()),
        })
    }
}

async fn read_page(url: &str, response: reqwest::Response) -> Result<FetchedPage, NetworkFailure> {
    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let headers = header_map(response.headers());
    let body = response
        .bytes()
        .await
        .map_err(|e| NetworkFailure::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?
        .to_vec();

    Ok(FetchedPage {
        status,
        final_url,
        headers,
        body,
    })
}

fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            map.insert(name.as_str().to_lowercase(), v.to_string());
        }
    }
    map
}
