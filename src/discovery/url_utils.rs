//! Shared utilities for discovery sources: URL normalization, XML parsing, deduplication.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static LOC_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").unwrap());

/// Normalize a candidate URL for deduplication.
///
/// Strips the fragment and any trailing slashes. Scheme, host, path and
/// query are kept as given.
pub fn normalize_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment.trim().trim_end_matches('/').to_string()
}

/// Scheme and authority of a URL, e.g. `https://acme.example`.
pub fn domain_root(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

/// Resolve a possibly relative href against the page it appeared on.
///
/// Only http(s) results are returned.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let resolved = base.join(href.trim()).ok()?;
    is_http(resolved.as_str()).then(|| resolved.to_string())
}

/// Whether a string is an absolute http(s) URL.
pub fn is_http(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

/// Lowercased path component of a URL (empty if unparseable).
pub fn url_path_lower(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default()
}

/// Last segment of a URL path, e.g. `AR-2023.pdf`.
pub fn url_basename(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default().to_string()
}

/// Extract all `<loc>` values from XML, unescaping XML entities.
pub fn extract_xml_locs(xml: &str) -> Vec<String> {
    LOC_PATTERN
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .filter(|url| !url.is_empty())
        .collect()
}

/// Whether an XML document is a sitemap index rather than a URL set.
pub fn is_sitemap_index(xml: &str) -> bool {
    xml.contains("<sitemapindex")
}

/// `Sitemap:` directives from a robots.txt body.
pub fn robots_sitemaps(robots: &str) -> Vec<String> {
    robots
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case("sitemap")
                .then(|| value.trim().to_string())
        })
        .filter(|url| is_http(url))
        .collect()
}

/// Deduplicate in place, keeping the first occurrence of each item.
pub fn dedup_preserving_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
