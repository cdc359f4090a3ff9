//! Fetching primitives: static HTTP, per-host rate limiting and browser automation.

pub mod browser;
pub mod http_client;
pub mod rate_limiter;

pub use browser::{
    BrowserDriver, BrowserEngineConfig, BrowserError, BrowserSession, ChromiumDriver,
};
pub use http_client::{FetchedPage, HeadInfo, HttpClient, NetworkFailure, PageFetcher};
pub use rate_limiter::RateLimiter;
