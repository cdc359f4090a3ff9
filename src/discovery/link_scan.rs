//! Anchor extraction and investor-relations relevance scoring.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::url_utils::{resolve_href, url_path_lower};

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Points per keyword found in anchor text plus URL.
const TEXT_KEYWORD_POINTS: u32 = 10;
/// Points per keyword found in the URL path.
const PATH_KEYWORD_POINTS: u32 = 3;

/// An anchor with a positive relevance score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLink {
    pub score: u32,
    /// Absolute URL.
    pub url: String,
    pub anchor: String,
}

/// A link to a PDF document found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfLink {
    /// Absolute URL.
    pub url: String,
    pub anchor: String,
}

/// Scores anchors on a page against the investor-relations vocabulary.
#[derive(Debug, Clone)]
pub struct LinkScanner {
    keywords: Vec<String>,
}

impl LinkScanner {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Relevance of a single link.
    ///
    /// Each keyword present in `anchor + " " + url` adds 10 points; each
    /// keyword present in the URL path adds a further 3.
    pub fn score_link(&self, anchor: &str, url: &str) -> u32 {
        let text = format!("{} {}", anchor, url).to_lowercase();
        let path = url_path_lower(url);

        let text_hits = self.keywords.iter().filter(|k| text.contains(k.as_str())).count() as u32;
        let path_hits = self.keywords.iter().filter(|k| path.contains(k.as_str())).count() as u32;

        text_hits * TEXT_KEYWORD_POINTS + path_hits * PATH_KEYWORD_POINTS
    }

    /// Relevant anchors on a page, best first (score desc, URL asc).
    pub fn scan(&self, base_url: &str, html: &str) -> Vec<ScannedLink> {
        let mut links: Vec<ScannedLink> = anchors(base_url, html)
            .into_iter()
            .filter_map(|(url, anchor)| {
                let score = self.score_link(&anchor, &url);
                (score > 0).then_some(ScannedLink { score, url, anchor })
            })
            .collect();

        links.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.url.cmp(&b.url)));
        links
    }

    /// Whether a URL mentions any investor-relations keyword.
    pub fn mentions_keyword(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Whether a URL path contains any investor-relations keyword.
    pub fn path_mentions_keyword(&self, url: &str) -> bool {
        let path = url_path_lower(url);
        self.keywords.iter().any(|k| path.contains(k.as_str()))
    }
}

/// Links whose href contains `.pdf`, resolved and deduplicated per page.
pub fn extract_pdf_links(page_url: &str, html: &str) -> Vec<PdfLink> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if !href.to_lowercase().contains(".pdf") {
            continue;
        }
        let Some(url) = resolve_href(page_url, href) else {
            continue;
        };
        if seen.insert(url.clone()) {
            links.push(PdfLink {
                url,
                anchor: anchor_text(&element),
            });
        }
    }

    links
}

/// Visible text of an element, whitespace-collapsed.
pub fn anchor_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every resolvable http(s) anchor on a page as (absolute URL, text).
fn anchors(base_url: &str, html: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let url = resolve_href(base_url, href)?;
            Some((url, anchor_text(&element)))
        })
        .collect()
}
