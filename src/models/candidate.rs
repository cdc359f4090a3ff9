//! Discovered candidate pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PdfCandidate;

/// How a candidate URL was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    /// Search result whose title or URL mentions investor relations.
    Serp,
    /// Any other search result.
    SerpFallback,
    /// Anchor found on the company homepage.
    HomepageScan,
    /// Conventional investor-relations path that exists and has relevant links.
    ProbePath,
    /// Sitemap location ending in `.pdf`.
    SitemapPdf,
    /// Sitemap location mentioning investor relations.
    SitemapPage,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serp => "serp",
            Self::SerpFallback => "serp_fallback",
            Self::HomepageScan => "homepage_scan",
            Self::ProbePath => "probe_path",
            Self::SitemapPdf => "sitemap_pdf",
            Self::SitemapPage => "sitemap_page",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "serp" => Some(Self::Serp),
            "serp_fallback" => Some(Self::SerpFallback),
            "homepage_scan" => Some(Self::HomepageScan),
            "probe_path" => Some(Self::ProbePath),
            "sitemap_pdf" => Some(Self::SitemapPdf),
            "sitemap_page" => Some(Self::SitemapPage),
            _ => None,
        }
    }
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page that may lead to financial report documents.
///
/// At most one candidate exists per normalized URL in a discovery run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Relevance estimate in `[0, 1]`.
    pub confidence: f64,
    /// Normalized URL (fragment and trailing slash stripped).
    pub url: String,
    /// Discovery method that produced the retained confidence.
    pub method: DiscoveryMethod,
    pub discovered_at: DateTime<Utc>,
    /// Scored PDF links found on this page, best first.
    #[serde(default)]
    pub pdfs: Vec<PdfCandidate>,
    /// Non-fatal failures encountered while inspecting this page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Candidate {
    /// Create a new candidate with no PDFs.
    pub fn new(url: String, method: DiscoveryMethod, confidence: f64) -> Self {
        Self {
            confidence: confidence.clamp(0.0, 1.0),
            url,
            method,
            discovered_at: Utc::now(),
            pdfs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Best-scoring PDF on this page, if any.
    pub fn best_pdf(&self) -> Option<&PdfCandidate> {
        self.pdfs.first()
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}
