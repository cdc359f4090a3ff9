//! Browser automation used by the escalation fallback.
//!
//! The traits here are the whole capability the fallback needs from a
//! browser: navigate, inspect and click rendered elements, fetch through the
//! session's own cookies, and read PDF responses observed on the wire.
//! [`ChromiumDriver`] implements them over the Chrome DevTools protocol.

mod chromium;
mod config;

pub use chromium::ChromiumDriver;
pub use config::BrowserEngineConfig;

use std::time::Duration;

use async_trait::async_trait;

/// Error type for browser automation.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Navigation to {url} timed out")]
    NavigationTimeout { url: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Click failed: {0}")]
    ClickFailure(String),

    #[error("Failed to read response body for {url}: {message}")]
    BodyReadFailure { url: String, message: String },

    #[error("Failed to inspect element: {0}")]
    InspectionFailure(String),

    #[error("Failed to start browser: {0}")]
    Launch(String),

    #[error("Browser support unavailable: {0}")]
    Unavailable(String),
}

/// Load-completion condition for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// Wait for the load event and for network activity to settle.
    NetworkIdle,
    /// Only wait for the DOM to be parsed.
    DomContentLoaded,
}

/// Response to a request issued from inside a browser session.
#[derive(Debug, Clone, Default)]
pub struct SessionResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a fresh session with a network listener already installed.
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One page in one browser, driven sequentially.
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(
        &mut self,
        url: &str,
        timeout: Duration,
        wait: WaitCondition,
    ) -> Result<(), BrowserError>;

    /// Current rendered elements matching a CSS selector.
    ///
    /// Elements that could not be inspected are returned as errors so
    /// callers can skip them individually.
    async fn query_elements(
        &mut self,
        selector: &str,
    ) -> Vec<Result<Box<dyn PageElement>, BrowserError>>;

    /// GET `url` from the page context, sharing the session's cookies.
    async fn fetch_in_session(
        &mut self,
        url: &str,
        timeout: Duration,
    ) -> Result<SessionResponse, BrowserError>;

    /// PDF responses observed since the session opened.
    async fn captured_responses(&mut self) -> Vec<Box<dyn CapturedResponse>>;

    /// Release the page and browser. Safe to call more than once.
    async fn close(&mut self);
}

/// A rendered DOM element.
#[async_trait]
pub trait PageElement: Send + Sync {
    async fn text(&self) -> Result<String, BrowserError>;

    async fn attribute(&self, name: &str) -> Result<Option<String>, BrowserError>;

    async fn click(&self, timeout: Duration) -> Result<(), BrowserError>;
}

/// A network response captured by the session listener.
#[async_trait]
pub trait CapturedResponse: Send + Sync {
    fn url(&self) -> &str;

    fn content_type(&self) -> &str;

    async fn body(&self) -> Result<Vec<u8>, BrowserError>;
}
