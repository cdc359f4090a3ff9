//! Web search providers.

mod duckduckgo;

pub use duckduckgo::DuckDuckGoSearch;

use async_trait::async_trait;

use super::Observation;
use crate::discovery::link_scan::LinkScanner;
use crate::discovery::DiscoveryError;
use crate::models::DiscoveryMethod;

/// Confidence for a result mentioning investor relations.
const SERP_KEYWORD_CONFIDENCE: f64 = 0.9;
/// Confidence for any other result.
const SERP_FALLBACK_CONFIDENCE: f64 = 0.3;

/// One search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    /// Absolute http(s) URL.
    pub url: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Keyword search against a web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Identifier for logging (e.g. "duckduckgo").
    fn name(&self) -> &str;

    /// Ordered results, at most `max_results`.
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, DiscoveryError>;
}

/// The query issued for a company.
pub fn investor_relations_query(company: &str) -> String {
    format!("{} investor relations", company.trim())
}

/// Map search results to observations.
///
/// Results whose title or URL contains an investor-relations keyword get
/// 0.9 (`serp`); the rest get 0.3 (`serp_fallback`).
pub fn serp_observations(hits: &[SearchHit], scanner: &LinkScanner) -> Vec<Observation> {
    hits.iter()
        .map(|hit| {
            if scanner.mentions_keyword(&format!("{} {}", hit.title, hit.url)) {
                Observation::new(SERP_KEYWORD_CONFIDENCE, &hit.url, DiscoveryMethod::Serp)
            } else {
                Observation::new(
                    SERP_FALLBACK_CONFIDENCE,
                    &hit.url,
                    DiscoveryMethod::SerpFallback,
                )
            }
        })
        .collect()
}
