//! Static discovery sources.
//!
//! Each source turns a company name or domain root into raw
//! (confidence, url, method) observations for the aggregator.

pub mod common_paths;
pub mod search;
pub mod sitemap;

pub use common_paths::PathProbe;
pub use sitemap::SitemapProbe;

use crate::models::DiscoveryMethod;

/// A single raw discovery observation, before deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub confidence: f64,
    pub url: String,
    pub method: DiscoveryMethod,
}

impl Observation {
    pub fn new(confidence: f64, url: impl Into<String>, method: DiscoveryMethod) -> Self {
        Self {
            confidence,
            url: url.into(),
            method,
        }
    }
}
