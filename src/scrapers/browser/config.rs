//! Browser engine configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    /// Set to false to watch the fallback drive the page.
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    pub proxy: Option<String>,

    /// Page navigation timeout in seconds.
    pub navigation_timeout_secs: u64,

    /// Timeout for clicking a consent control, in milliseconds.
    pub consent_click_timeout_ms: u64,

    /// Timeout for clicking a download control, in milliseconds.
    pub click_timeout_ms: u64,

    /// Pause after each download click so its network activity can land.
    pub settle_delay_ms: u64,

    /// Pause after consent handling so late links can render.
    pub render_delay_ms: u64,

    /// Wait for background responses when there is nothing to click.
    pub idle_wait_ms: u64,

    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            navigation_timeout_secs: 30,
            consent_click_timeout_ms: 3000,
            click_timeout_ms: 5000,
            settle_delay_ms: 1000,
            render_delay_ms: 800,
            idle_wait_ms: 2000,
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn consent_click_timeout(&self) -> Duration {
        Duration::from_millis(self.consent_click_timeout_ms)
    }

    pub fn click_timeout(&self) -> Duration {
        Duration::from_millis(self.click_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.render_delay_ms)
    }

    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: BrowserEngineConfig =
            toml::from_str("headless = false\nidle_wait_ms = 50").unwrap();
        assert!(!config.headless);
        assert_eq!(config.idle_wait(), Duration::from_millis(50));
        assert_eq!(config.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(config.click_timeout(), Duration::from_secs(5));
    }
}
