//! The static discovery chain.
//!
//! Runs search, homepage scan, path probing and sitemap crawling in that
//! order, merges their observations into one candidate per normalized URL,
//! then inspects each candidate page for PDF links and scores them.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::link_scan::{extract_pdf_links, LinkScanner};
use super::scoring::{head_check, PdfScorer};
use super::sources::search::{investor_relations_query, serp_observations};
use super::sources::sitemap::sitemap_observations;
use super::sources::{Observation, PathProbe, SitemapProbe};
use super::url_utils::{domain_root, is_http, normalize_url};
use super::{DiscoveryConfig, DiscoveryError, SearchProvider};
use crate::models::{sort_ranked, Candidate, DiscoveryMethod, PdfCandidate};
use crate::scrapers::http_client::url_path_is_pdf;
use crate::scrapers::PageFetcher;

/// Homepage scanner confidence ceiling.
const HOMEPAGE_MAX_CONFIDENCE: f64 = 0.8;

/// Confidence for a homepage anchor with scanner score `score`.
pub fn homepage_confidence(score: u32) -> f64 {
    HOMEPAGE_MAX_CONFIDENCE.min(0.4 + f64::from(score) / 50.0)
}

/// Merge observations into one candidate per normalized URL.
///
/// The retained entry carries the highest confidence seen for that URL and
/// the method that produced it; on ties the earliest observation wins.
/// Output is ordered by confidence descending, then URL ascending.
pub fn dedupe_observations(observations: Vec<Observation>) -> Vec<Candidate> {
    let mut best: HashMap<String, (f64, DiscoveryMethod)> = HashMap::new();

    for obs in observations {
        let url = normalize_url(&obs.url);
        if url.is_empty() {
            continue;
        }
        match best.get_mut(&url) {
            Some(entry) if obs.confidence > entry.0 => *entry = (obs.confidence, obs.method),
            Some(_) => {}
            None => {
                best.insert(url, (obs.confidence, obs.method));
            }
        }
    }

    let mut candidates: Vec<Candidate> = best
        .into_iter()
        .map(|(url, (confidence, method))| Candidate::new(url, method, confidence))
        .collect();

    candidates.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.url.cmp(&b.url))
    });
    candidates
}

/// Output of one discovery run.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRun {
    pub candidates: Vec<Candidate>,
    /// Set when the search provider failed; the run then had nothing to
    /// anchor the other stages on.
    pub search_failure: Option<String>,
}

/// Runs the static discovery chain for a company.
pub struct CandidateAggregator {
    config: DiscoveryConfig,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    scanner: LinkScanner,
    scorer: PdfScorer,
    path_probe: PathProbe,
    sitemap_probe: SitemapProbe,
}

impl CandidateAggregator {
    pub fn new(
        config: DiscoveryConfig,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, DiscoveryError> {
        let scorer = PdfScorer::new(&config)?;
        let scanner = LinkScanner::new(&config.ir_keywords);
        let path_probe = PathProbe::new(
            &config.probe_paths,
            config.timeouts.probe_head(),
            config.timeouts.probe_get(),
        );
        let sitemap_probe = SitemapProbe::new(&config.sitemap_paths, config.timeouts.sitemap());

        Ok(Self {
            config,
            search,
            fetcher,
            scanner,
            scorer,
            path_probe,
            sitemap_probe,
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover and score candidates for `company`.
    ///
    /// Network failures never abort the run: failed stages contribute
    /// nothing, a failed search is reported on the returned run and failed
    /// page inspections are recorded on the candidate.
    /// Cancellation is checked between stages and between candidate pages.
    pub async fn discover(
        &self,
        company: &str,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryRun, DiscoveryError> {
        let company = company.trim();
        if company.is_empty() {
            return Err(DiscoveryError::Config(
                "company name must not be empty".to_string(),
            ));
        }

        let query = investor_relations_query(company);
        info!("Searching {}: {}", self.search.name(), query);
        let mut search_failure = None;
        let hits = match self
            .search
            .search(&query, self.config.max_search_results)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Search failed: {}", e);
                search_failure = Some(e.to_string());
                Vec::new()
            }
        };
        let hits: Vec<_> = hits.into_iter().filter(|h| is_http(&h.url)).collect();

        let mut observations = serp_observations(&hits, &self.scanner);
        let mut sitemap_urls = Vec::new();

        if let Some(root) = hits.first().and_then(|h| domain_root(&h.url)) {
            check_cancelled(cancel)?;
            observations.extend(self.scan_homepage(&root).await);

            check_cancelled(cancel)?;
            info!("Probing conventional paths under {}", root);
            observations.extend(
                self.path_probe
                    .probe(self.fetcher.as_ref(), &self.scanner, &root)
                    .await,
            );

            check_cancelled(cancel)?;
            info!("Reading sitemaps of {}", root);
            sitemap_urls = self
                .sitemap_probe
                .fetch_urls(self.fetcher.as_ref(), &root)
                .await;
            observations.extend(sitemap_observations(&sitemap_urls, &self.scanner));
        } else {
            info!("No search results for {}", company);
        }

        let mut candidates = dedupe_observations(observations);
        info!("{} candidates after deduplication", candidates.len());

        for candidate in &mut candidates {
            check_cancelled(cancel)?;
            self.inspect_candidate(candidate, &sitemap_urls).await;
        }

        Ok(DiscoveryRun {
            candidates,
            search_failure,
        })
    }

    async fn scan_homepage(&self, root: &str) -> Vec<Observation> {
        info!("Scanning homepage {}", root);
        match self.fetcher.get(root, self.config.timeouts.page()).await {
            Ok(page) if page.status == 200 => self
                .scanner
                .scan(root, &page.text())
                .into_iter()
                .map(|link| {
                    Observation::new(
                        homepage_confidence(link.score),
                        link.url,
                        DiscoveryMethod::HomepageScan,
                    )
                })
                .collect(),
            Ok(page) => {
                debug!("Homepage {} returned {}", root, page.status);
                Vec::new()
            }
            Err(e) => {
                warn!("Homepage fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Fetch a candidate page and attach its scored PDF links.
    async fn inspect_candidate(&self, candidate: &mut Candidate, sitemap_urls: &[String]) {
        debug!("Inspecting {}", candidate.url);

        let page = match self
            .fetcher
            .get(&candidate.url, self.config.timeouts.page())
            .await
        {
            Ok(page) => page,
            Err(e) => {
                debug!("Candidate fetch failed: {}", e);
                candidate.record_error(e.to_string());
                return;
            }
        };

        if page.status == 200 && page.is_text() {
            let html = page.text();
            for link in extract_pdf_links(&candidate.url, &html) {
                let pdf = self
                    .score_link(candidate, &link.url, &link.anchor, sitemap_urls)
                    .await;
                candidate.pdfs.push(pdf);
            }
        } else if url_path_is_pdf(&candidate.url) {
            let url = candidate.url.clone();
            let pdf = self.score_link(candidate, &url, "", sitemap_urls).await;
            candidate.pdfs.push(pdf);
        } else if page.status != 200 {
            candidate.record_error(format!("{} returned HTTP {}", candidate.url, page.status));
        }

        sort_ranked(&mut candidate.pdfs);
    }

    async fn score_link(
        &self,
        candidate: &mut Candidate,
        pdf_url: &str,
        anchor: &str,
        sitemap_urls: &[String],
    ) -> PdfCandidate {
        let head = match head_check(self.fetcher.as_ref(), pdf_url, self.config.timeouts.head()).await
        {
            Ok(head) => Some(head),
            Err(e) => {
                debug!("Existence check failed: {}", e);
                candidate.record_error(e.to_string());
                None
            }
        };

        self.scorer
            .build_candidate(pdf_url, anchor, &candidate.url, sitemap_urls, head)
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), DiscoveryError> {
    if cancel.is_cancelled() {
        Err(DiscoveryError::Cancelled)
    } else {
        Ok(())
    }
}
