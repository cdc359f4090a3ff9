//! Sitemap and robots.txt discovery source.
//!
//! Collects every `<loc>` listed by a site's sitemaps, following sitemap
//! indexes, and turns PDF and investor-relations locations into observations.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tracing::{debug, warn};

use super::Observation;
use crate::discovery::link_scan::LinkScanner;
use crate::discovery::url_utils::{
    dedup_preserving_order, extract_xml_locs, is_sitemap_index, robots_sitemaps,
};
use crate::models::DiscoveryMethod;
use crate::scrapers::{http_client::url_path_is_pdf, PageFetcher};

/// Maximum nested sitemaps followed from sitemap indexes.
const MAX_NESTED_SITEMAPS: usize = 20;

const SITEMAP_PDF_CONFIDENCE: f64 = 0.95;
const SITEMAP_PAGE_CONFIDENCE: f64 = 0.75;

/// Fetches a site's sitemaps and lists their locations.
pub struct SitemapProbe {
    sitemap_paths: Vec<String>,
    timeout: Duration,
}

impl SitemapProbe {
    pub fn new(sitemap_paths: &[String], timeout: Duration) -> Self {
        Self {
            sitemap_paths: sitemap_paths.to_vec(),
            timeout,
        }
    }

    /// All locations listed by the site's sitemaps, first-seen order, no duplicates.
    ///
    /// `robots.txt` directives are consulted before the conventional paths.
    /// Unreachable sitemaps are skipped.
    pub async fn fetch_urls(&self, fetcher: &dyn PageFetcher, root: &str) -> Vec<String> {
        let root = root.trim_end_matches('/');

        let mut queue: VecDeque<String> = self.robots_sitemaps(fetcher, root).await.into();
        queue.extend(self.sitemap_paths.iter().map(|p| format!("{}{}", root, p)));

        let mut processed = HashSet::new();
        let mut nested = 0;
        let mut urls = Vec::new();

        while let Some(sitemap_url) = queue.pop_front() {
            if !processed.insert(sitemap_url.clone()) {
                continue;
            }

            debug!("Fetching sitemap: {}", sitemap_url);
            let page = match fetcher.get(&sitemap_url, self.timeout).await {
                Ok(page) if page.status == 200 => page,
                Ok(page) => {
                    debug!("Sitemap {} returned {}", sitemap_url, page.status);
                    continue;
                }
                Err(e) => {
                    warn!("Failed to fetch sitemap {}: {}", sitemap_url, e);
                    continue;
                }
            };

            let text = page.text();
            let locs = extract_xml_locs(&text);

            if is_sitemap_index(&text) {
                for loc in locs {
                    if nested >= MAX_NESTED_SITEMAPS {
                        debug!("Nested sitemap limit reached, skipping {}", loc);
                        break;
                    }
                    if !processed.contains(&loc) {
                        nested += 1;
                        queue.push_back(loc);
                    }
                }
            } else {
                urls.extend(locs);
            }
        }

        dedup_preserving_order(&mut urls);
        debug!("Collected {} sitemap URLs from {}", urls.len(), root);
        urls
    }

    async fn robots_sitemaps(&self, fetcher: &dyn PageFetcher, root: &str) -> Vec<String> {
        let robots_url = format!("{}/robots.txt", root);
        match fetcher.get(&robots_url, self.timeout).await {
            Ok(page) if page.status == 200 => robots_sitemaps(&page.text()),
            Ok(page) => {
                debug!("robots.txt returned {}", page.status);
                Vec::new()
            }
            Err(e) => {
                debug!("Failed to fetch robots.txt: {}", e);
                Vec::new()
            }
        }
    }
}

/// Turn sitemap locations into observations.
///
/// Locations ending in `.pdf` become `sitemap_pdf` (0.95); locations that
/// mention an investor-relations keyword become `sitemap_page` (0.75).
pub fn sitemap_observations(urls: &[String], scanner: &LinkScanner) -> Vec<Observation> {
    urls.iter()
        .filter_map(|url| {
            if url_path_is_pdf(url) {
                Some(Observation::new(
                    SITEMAP_PDF_CONFIDENCE,
                    url,
                    DiscoveryMethod::SitemapPdf,
                ))
            } else if scanner.mentions_keyword(url) {
                Some(Observation::new(
                    SITEMAP_PAGE_CONFIDENCE,
                    url,
                    DiscoveryMethod::SitemapPage,
                ))
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryConfig;
    use crate::scrapers::http_client::{FetchedPage, HeadInfo, NetworkFailure};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct StaticSite(HashMap<String, String>);

    #[async_trait]
    impl PageFetcher for StaticSite {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, NetworkFailure> {
            match self.0.get(url) {
                Some(body) => Ok(FetchedPage {
                    status: 200,
                    final_url: url.to_string(),
                    headers: HashMap::new(),
                    body: body.clone().into_bytes(),
                }),
                None => Ok(FetchedPage {
                    status: 404,
                    final_url: url.to_string(),
                    ..FetchedPage::default()
                }),
            }
        }

        async fn head(&self, url: &str, _timeout: Duration) -> Result<HeadInfo, NetworkFailure> {
            Err(NetworkFailure::Timeout { url: url.to_string() })
        }
    }

    fn probe() -> SitemapProbe {
        SitemapProbe::new(
            &DiscoveryConfig::default().sitemap_paths,
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn test_robots_then_conventional_paths() {
        let site = StaticSite(HashMap::from([
            (
                "https://acme.example/robots.txt".to_string(),
                "Sitemap: https://acme.example/custom.xml".to_string(),
            ),
            (
                "https://acme.example/custom.xml".to_string(),
                "<urlset><url><loc>https://acme.example/a</loc></url></urlset>".to_string(),
            ),
            (
                "https://acme.example/sitemap.xml".to_string(),
                "<urlset><url><loc>https://acme.example/b</loc></url><url><loc>https://acme.example/a</loc></url></urlset>".to_string(),
            ),
        ]));

        let urls = probe().fetch_urls(&site, "https://acme.example/").await;
        assert_eq!(urls, vec!["https://acme.example/a", "https://acme.example/b"]);
    }

    #[tokio::test]
    async fn test_follows_sitemap_index() {
        let site = StaticSite(HashMap::from([
            (
                "https://acme.example/sitemap_index.xml".to_string(),
                "<sitemapindex><sitemap><loc>https://acme.example/ir.xml</loc></sitemap></sitemapindex>".to_string(),
            ),
            (
                "https://acme.example/ir.xml".to_string(),
                "<urlset><url><loc>https://acme.example/investors/ar-2023.pdf</loc></url></urlset>".to_string(),
            ),
        ]));

        let urls = probe().fetch_urls(&site, "https://acme.example").await;
        assert_eq!(urls, vec!["https://acme.example/investors/ar-2023.pdf"]);
    }

    #[tokio::test]
    async fn test_nested_limit() {
        let index: String = (0..30)
            .map(|i| format!("<sitemap><loc>https://acme.example/s{i}.xml</loc></sitemap>"))
            .collect();
        let mut pages = HashMap::from([(
            "https://acme.example/sitemap.xml".to_string(),
            format!("<sitemapindex>{index}</sitemapindex>"),
        )]);
        for i in 0..30 {
            pages.insert(
                format!("https://acme.example/s{i}.xml"),
                format!("<urlset><url><loc>https://acme.example/p{i}</loc></url></urlset>"),
            );
        }

        let urls = probe().fetch_urls(&StaticSite(pages), "https://acme.example").await;
        assert_eq!(urls.len(), MAX_NESTED_SITEMAPS);
    }

    #[tokio::test]
    async fn test_missing_sitemaps_yield_nothing() {
        let urls = probe()
            .fetch_urls(&StaticSite(HashMap::new()), "https://acme.example")
            .await;
        assert!(urls.is_empty());
    }

    #[test]
    fn test_observations() {
        let scanner = LinkScanner::new(&DiscoveryConfig::default().ir_keywords);
        let urls = vec![
            "https://acme.example/files/AR2023.PDF".to_string(),
            "https://acme.example/investors/overview".to_string(),
            "https://acme.example/careers".to_string(),
        ];
        let obs = sitemap_observations(&urls, &scanner);

        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].method, DiscoveryMethod::SitemapPdf);
        assert_eq!(obs[0].confidence, 0.95);
        assert_eq!(obs[1].method, DiscoveryMethod::SitemapPage);
        assert_eq!(obs[1].confidence, 0.75);
    }
}
