//! Heuristic PDF scoring and the HEAD existence check.
//!
//! A PDF link's score is the sum of five independent, non-negative signals,
//! capped at 1.0:
//!
//! | signal             | weight | fires when                                        |
//! |--------------------|--------|---------------------------------------------------|
//! | `ir_path`          | 0.30   | URL path contains an investor-relations keyword   |
//! | `anchor_keyword`   | 0.25   | anchor text matches the report pattern            |
//! | `filename_keyword` | 0.20   | URL basename matches the report pattern           |
//! | `sitemap`          | 0.15   | URL matches a sitemap location from this run      |
//! | `year`             | 0.10   | anchor text or URL contains a `20xx` token        |

use std::sync::LazyLock;
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use super::link_scan::LinkScanner;
use super::url_utils::{normalize_url, url_basename};
use super::{DiscoveryConfig, DiscoveryError};
use crate::models::{DocType, PdfCandidate, ScoreBreakdown};
use crate::scrapers::http_client::{signals_pdf, NetworkFailure, PageFetcher};

pub const SIGNAL_IR_PATH: &str = "ir_path";
pub const SIGNAL_ANCHOR: &str = "anchor_keyword";
pub const SIGNAL_FILENAME: &str = "filename_keyword";
pub const SIGNAL_SITEMAP: &str = "sitemap";
pub const SIGNAL_YEAR: &str = "year";

const WEIGHT_IR_PATH: f64 = 0.30;
const WEIGHT_ANCHOR: f64 = 0.25;
const WEIGHT_FILENAME: f64 = 0.20;
const WEIGHT_SITEMAP: f64 = 0.15;
const WEIGHT_YEAR: f64 = 0.10;

static YEAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(20\d{2})").unwrap());

/// Document type rules, checked in order; first match wins.
static DOC_TYPE_PATTERNS: LazyLock<Vec<(Regex, DocType)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(10[- ]?k|annual report|annual)").unwrap(),
            DocType::Annual,
        ),
        (
            Regex::new(r"\bq[1-4]\b|quarter").unwrap(),
            DocType::Quarterly,
        ),
        (
            Regex::new(r"\bhalf\b|\bh1\b|\bh2\b|half[- ]?year").unwrap(),
            DocType::Half,
        ),
        (Regex::new(r"interim").unwrap(), DocType::Interim),
    ]
});

/// Score, breakdown and inferred metadata for one PDF link.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfScore {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub doc_type: DocType,
    pub fiscal_year: Option<i32>,
}

/// Outcome of a HEAD request against a PDF link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadCheck {
    pub is_pdf: bool,
    pub resolved_url: String,
    pub content_length: Option<u64>,
}

/// Assigns heuristic confidence scores to PDF links.
#[derive(Debug, Clone)]
pub struct PdfScorer {
    scanner: LinkScanner,
    report_pattern: Regex,
}

impl PdfScorer {
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let report_pattern = RegexBuilder::new(&config.report_keywords)
            .case_insensitive(true)
            .build()
            .map_err(|e| DiscoveryError::Config(format!("invalid report_keywords: {}", e)))?;

        Ok(Self {
            scanner: LinkScanner::new(&config.ir_keywords),
            report_pattern,
        })
    }

    /// Score a PDF link found on `page_url`.
    pub fn score(
        &self,
        pdf_url: &str,
        anchor_text: &str,
        page_url: &str,
        sitemap_urls: &[String],
    ) -> PdfScore {
        let filename = url_basename(pdf_url);
        let url_and_anchor = format!("{} {}", anchor_text, pdf_url).to_lowercase();

        let mut breakdown = ScoreBreakdown::new();
        let mut signal = |name: &str, fires: bool, weight: f64| {
            let contribution = if fires { weight } else { 0.0 };
            breakdown.insert(name.to_string(), contribution);
            contribution
        };

        let raw = signal(
            SIGNAL_IR_PATH,
            self.scanner.path_mentions_keyword(pdf_url),
            WEIGHT_IR_PATH,
        ) + signal(
            SIGNAL_ANCHOR,
            self.report_pattern.is_match(anchor_text),
            WEIGHT_ANCHOR,
        ) + signal(
            SIGNAL_FILENAME,
            self.report_pattern.is_match(&filename),
            WEIGHT_FILENAME,
        ) + signal(
            SIGNAL_SITEMAP,
            in_sitemap(pdf_url, sitemap_urls),
            WEIGHT_SITEMAP,
        ) + signal(
            SIGNAL_YEAR,
            YEAR_PATTERN.is_match(&url_and_anchor),
            WEIGHT_YEAR,
        );

        let score = raw.min(1.0);
        let doc_type = infer_doc_type(&format!("{} {}", anchor_text, filename));
        let fiscal_year = infer_fiscal_year(anchor_text);

        debug!(
            "Scored {} (from {}): {:.2} {} {:?}",
            pdf_url, page_url, score, doc_type, fiscal_year
        );

        PdfScore {
            score,
            breakdown,
            doc_type,
            fiscal_year,
        }
    }

    /// Score a link and combine it with an existence check result.
    pub fn build_candidate(
        &self,
        pdf_url: &str,
        anchor_text: &str,
        page_url: &str,
        sitemap_urls: &[String],
        head: Option<HeadCheck>,
    ) -> PdfCandidate {
        let scored = self.score(pdf_url, anchor_text, page_url, sitemap_urls);
        let head = head.unwrap_or_else(|| HeadCheck {
            is_pdf: false,
            resolved_url: pdf_url.to_string(),
            content_length: None,
        });

        PdfCandidate {
            score: scored.score,
            score_breakdown: scored.breakdown,
            doc_type: scored.doc_type,
            fiscal_year: scored.fiscal_year,
            anchor_text: anchor_text.to_string(),
            pdf_url: pdf_url.to_string(),
            resolved_url: head.resolved_url,
            content_length: head.content_length,
            head_confirmed_pdf: head.is_pdf,
        }
    }
}

/// HEAD a PDF link (following redirects).
///
/// A status of 400 or above is reported as a failure.
pub async fn head_check(
    fetcher: &dyn PageFetcher,
    url: &str,
    timeout: Duration,
) -> Result<HeadCheck, NetworkFailure> {
    let head = fetcher.head(url, timeout).await?;
    if head.status >= 400 {
        return Err(NetworkFailure::Status {
            url: url.to_string(),
            status: head.status,
        });
    }

    Ok(HeadCheck {
        is_pdf: signals_pdf(head.content_type(), url),
        content_length: head.content_length(),
        resolved_url: if head.final_url.is_empty() {
            url.to_string()
        } else {
            head.final_url
        },
    })
}

/// Infer the report type from anchor text and filename.
pub fn infer_doc_type(text: &str) -> DocType {
    let lower = text.to_lowercase();
    DOC_TYPE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(&lower))
        .map(|(_, doc_type)| *doc_type)
        .unwrap_or_default()
}

/// First `20xx` token in the anchor text.
///
/// Any such token counts, so an unrelated year (e.g. a copyright notice)
/// can be picked up.
pub fn infer_fiscal_year(anchor_text: &str) -> Option<i32> {
    YEAR_PATTERN
        .captures(anchor_text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn in_sitemap(pdf_url: &str, sitemap_urls: &[String]) -> bool {
    let normalized = normalize_url(pdf_url);
    sitemap_urls
        .iter()
        .map(|u| normalize_url(u))
        .filter(|u| !u.is_empty())
        .any(|u| normalized.starts_with(&u) || normalized.contains(&u))
}
