//! Discovery system for finding financial report documents.
//!
//! Static discovery escalates through increasingly expensive strategies:
//! search, homepage link scan, conventional path probing and sitemap
//! crawling. The [`aggregator`] merges their output into deduplicated,
//! ranked candidates and scores every PDF link found on them.

pub mod aggregator;
pub mod config;
pub mod link_scan;
pub mod scoring;
pub mod sources;
pub mod url_utils;

pub use aggregator::{CandidateAggregator, DiscoveryRun};
pub use config::{DiscoveryConfig, TimeoutConfig};
pub use link_scan::{LinkScanner, PdfLink, ScannedLink};
pub use scoring::{HeadCheck, PdfScore, PdfScorer};
pub use sources::search::{DuckDuckGoSearch, SearchHit, SearchProvider};

use crate::scrapers::NetworkFailure;

/// Error type for discovery operations.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Network(#[from] NetworkFailure),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Discovery cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_error_display() {
        let err = DiscoveryError::Unavailable("duckduckgo returned 503".to_string());
        assert!(err.to_string().contains("Source unavailable"));

        let err = DiscoveryError::from(NetworkFailure::Timeout {
            url: "https://html.duckduckgo.com/html/".to_string(),
        });
        assert!(err.to_string().contains("timed out"));
    }
}
