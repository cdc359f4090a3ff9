//! Per-host rate limiter.
//!
//! Enforces a minimum interval between request starts to the same host.
//! Hosts are independent; there is no adaptive backoff. Timing uses
//! `tokio::time`, so tests can pause and advance the clock.

mod domain_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use domain_state::DomainState;

/// Minimum-interval rate limiter shared by every clone.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    domains: Arc<Mutex<HashMap<String, DomainState>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(500))
    }
}

impl RateLimiter {
    /// Create a limiter enforcing `min_interval` per host.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            domains: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A limiter that never waits.
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Extract host from URL.
    pub fn extract_domain(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
    }

    /// Wait until the host is ready, then mark a request as started.
    ///
    /// Returns the host, or `None` for URLs without one (never delayed).
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let domain = Self::extract_domain(url)?;

        // The slot is reserved while holding the lock so two callers racing
        // for the same host are spaced apart instead of both proceeding.
        let wait_time = {
            let mut domains = self.domains.lock().await;
            let state = domains.entry(domain.clone()).or_default();
            let wait = state.time_until_ready(self.min_interval);
            state.last_request = Some(Instant::now() + wait);
            state.total_requests += 1;
            wait
        };

        if wait_time > Duration::ZERO {
            debug!("Rate limiting {}: waiting {:?}", domain, wait_time);
            tokio::time::sleep(wait_time).await;
        }

        Some(domain)
    }

    /// Total requests started against a host.
    pub async fn request_count(&self, domain: &str) -> u64 {
        self.domains
            .lock()
            .await
            .get(domain)
            .map(|s| s.total_requests)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            RateLimiter::extract_domain("https://IR.Acme.example/reports"),
            Some("ir.acme.example".to_string())
        );
        assert_eq!(RateLimiter::extract_domain("not a url"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_host_is_spaced() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        limiter.acquire("https://acme.example/a").await;
        assert!(start.elapsed() < Duration::from_millis(1));

        limiter.acquire("https://acme.example/b").await;
        assert!(start.elapsed() >= Duration::from_millis(500));

        limiter.acquire("https://acme.example/c").await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
        assert_eq!(limiter.request_count("acme.example").await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosts_are_independent() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        limiter.acquire("https://acme.example/").await;
        limiter.acquire("https://other.example/").await;

        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_never_waits() {
        let limiter = RateLimiter::disabled();
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire("https://acme.example/").await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
