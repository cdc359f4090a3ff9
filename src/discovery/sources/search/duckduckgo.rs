//! DuckDuckGo search provider.
//!
//! Uses the DuckDuckGo HTML endpoint, which needs no API key.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use super::{SearchHit, SearchProvider};
use crate::discovery::link_scan::anchor_text;
use crate::discovery::url_utils::is_http;
use crate::discovery::DiscoveryError;
use crate::scrapers::HttpClient;

/// DuckDuckGo search URL.
const DDG_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Search provider backed by DuckDuckGo's HTML results page.
pub struct DuckDuckGoSearch {
    client: HttpClient,
    endpoint: String,
    timeout: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: DDG_SEARCH_URL.to_string(),
            timeout,
        }
    }

    /// Parse search results from HTML.
    ///
    /// Prefers `a.result__a` result links; falls back to every anchor on the
    /// page when the layout doesn't have them.
    pub fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>, DiscoveryError> {
        let document = Html::parse_document(html);

        // DuckDuckGo HTML results are in <a class="result__a"> elements
        let result_selector = Selector::parse("a.result__a")
            .map_err(|e| DiscoveryError::Parse(format!("Failed to parse selector: {:?}", e)))?;
        let any_selector = Selector::parse("a[href]")
            .map_err(|e| DiscoveryError::Parse(format!("Failed to parse selector: {:?}", e)))?;

        let mut results = collect_hits(&document, &result_selector, max_results, false);
        if results.is_empty() {
            debug!("No result__a anchors, falling back to all anchors");
            results = collect_hits(&document, &any_selector, max_results, true);
        }

        debug!("Parsed {} results from DuckDuckGo", results.len());
        Ok(results)
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, DiscoveryError> {
        debug!("DuckDuckGo search: {}", query);

        let response = self
            .client
            .post_form(&self.endpoint, &[("q", query)], self.timeout)
            .await?;

        if !response.is_success() {
            warn!("DuckDuckGo returned {}", response.status);
            return Err(DiscoveryError::Unavailable(format!(
                "DuckDuckGo returned {}",
                response.status
            )));
        }

        Self::parse_results(&response.text(), max_results)
    }
}

fn collect_hits(
    document: &Html,
    selector: &Selector,
    max_results: usize,
    skip_ddg: bool,
) -> Vec<SearchHit> {
    let mut results = Vec::new();
    for element in document.select(selector) {
        if results.len() >= max_results {
            break;
        }
        let Some(url) = element.value().attr("href").and_then(extract_url) else {
            continue;
        };
        if skip_ddg && is_duckduckgo(&url) {
            continue;
        }
        results.push(SearchHit::new(anchor_text(&element), url));
    }
    results
}

/// Extract the actual URL from DuckDuckGo's redirect URL.
///
/// Only absolute http(s) targets are returned.
fn extract_url(href: &str) -> Option<String> {
    let url = if let Some(uddg_start) = href.find("uddg=") {
        // Redirect: //duckduckgo.com/l/?uddg=<encoded_url>&...
        let encoded = &href[uddg_start + 5..];
        let end = encoded.find('&').unwrap_or(encoded.len());
        urlencoding::decode(&encoded[..end]).ok()?.into_owned()
    } else if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    is_http(&url).then_some(url)
}

fn is_duckduckgo(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.ends_with("duckduckgo.com")))
        .unwrap_or(false)
}
