//! Conventional investor-relations path probing.

use std::time::Duration;

use tracing::debug;

use super::Observation;
use crate::discovery::link_scan::LinkScanner;
use crate::models::DiscoveryMethod;
use crate::scrapers::PageFetcher;

const PROBE_PATH_CONFIDENCE: f64 = 0.5;

/// Probes a fixed list of sub-paths under a domain root.
pub struct PathProbe {
    paths: Vec<String>,
    head_timeout: Duration,
    get_timeout: Duration,
}

impl PathProbe {
    pub fn new(paths: &[String], head_timeout: Duration, get_timeout: Duration) -> Self {
        Self {
            paths: paths.to_vec(),
            head_timeout,
            get_timeout,
        }
    }

    /// Probe every path and report the ones that exist and link somewhere relevant.
    ///
    /// A path is fetched only if its HEAD status is below 400, and counts
    /// only if the GET returns 200 with at least one relevant anchor.
    pub async fn probe(
        &self,
        fetcher: &dyn PageFetcher,
        scanner: &LinkScanner,
        root: &str,
    ) -> Vec<Observation> {
        let root = root.trim_end_matches('/');
        let mut found = Vec::new();

        for path in &self.paths {
            let url = format!("{}{}", root, path);

            match fetcher.head(&url, self.head_timeout).await {
                Ok(head) if head.status < 400 => {}
                Ok(head) => {
                    debug!("Probe {} -> {}", url, head.status);
                    continue;
                }
                Err(e) => {
                    debug!("Probe {} failed: {}", url, e);
                    continue;
                }
            }

            let page = match fetcher.get(&url, self.get_timeout).await {
                Ok(page) if page.status == 200 => page,
                Ok(page) => {
                    debug!("Probe GET {} -> {}", url, page.status);
                    continue;
                }
                Err(e) => {
                    debug!("Probe GET {} failed: {}", url, e);
                    continue;
                }
            };

            let links = scanner.scan(&url, &page.text());
            if links.is_empty() {
                debug!("Probe {} reachable but has no relevant links", url);
                continue;
            }

            debug!("Probe {} has {} relevant links", url, links.len());
            found.push(Observation::new(
                PROBE_PATH_CONFIDENCE,
                url,
                DiscoveryMethod::ProbePath,
            ));
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryConfig;
    use crate::scrapers::http_client::{FetchedPage, HeadInfo, NetworkFailure};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `(status, body)` per URL and counts GETs.
    struct ProbeSite {
        pages: HashMap<String, (u16, String)>,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for ProbeSite {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<FetchedPage, NetworkFailure> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            let (status, body) = self.pages.get(url).cloned().unwrap_or((404, String::new()));
            Ok(FetchedPage {
                status,
                final_url: url.to_string(),
                headers: HashMap::new(),
                body: body.into_bytes(),
            })
        }

        async fn head(&self, url: &str, _timeout: Duration) -> Result<HeadInfo, NetworkFailure> {
            match self.pages.get(url) {
                Some((status, _)) => Ok(HeadInfo {
                    status: *status,
                    final_url: url.to_string(),
                    headers: HashMap::new(),
                }),
                None => Err(NetworkFailure::Connect {
                    url: url.to_string(),
                    message: "refused".to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn test_probe_keeps_reachable_paths_with_links() {
        let site = ProbeSite {
            pages: HashMap::from([
                (
                    "https://acme.example/investors".to_string(),
                    (200, r#"<a href="/investors/reports">Reports</a>"#.to_string()),
                ),
                (
                    "https://acme.example/ir".to_string(),
                    (200, "<p>Nothing here</p>".to_string()),
                ),
                ("https://acme.example/reports".to_string(), (500, String::new())),
            ]),
            gets: AtomicUsize::new(0),
        };
        let config = DiscoveryConfig::default();
        let scanner = LinkScanner::new(&config.ir_keywords);
        let probe = PathProbe::new(
            &config.probe_paths,
            Duration::from_secs(1),
            Duration::from_secs(1),
        );

        let found = probe.probe(&site, &scanner, "https://acme.example/").await;

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "https://acme.example/investors");
        assert_eq!(found[0].confidence, 0.5);
        assert_eq!(found[0].method, DiscoveryMethod::ProbePath);
        // Only the two paths with HEAD < 400 were fetched.
        assert_eq!(site.gets.load(Ordering::SeqCst), 2);
    }
}
