//! Discovery-then-escalation orchestration.
//!
//! Serves candidates from the cache when fresh, otherwise runs the static
//! discovery chain and caches its output. If no statically found PDF clears
//! the acceptance bar, the browser fallback is run on the top candidates.
//! The decision is a pure function of the scored candidates.

use std::sync::Arc;

use chrono::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::escalation::{EscalationError, EscalationResult, FallbackEscalator};
use crate::cache::CandidateCache;
use crate::discovery::url_utils::url_basename;
use crate::discovery::{CandidateAggregator, DiscoveryConfig, DiscoveryError};
use crate::models::{sort_ranked, Candidate, PdfCandidate};
use crate::scrapers::{BrowserError, PageFetcher};
use crate::storage::{DocumentStore, StoredDocument};

/// Error type for pipeline runs. Each variant has its own exit code.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Required component unavailable: {0}")]
    ModuleUnavailable(String),

    #[error("Failed to set up discovery: {0}")]
    DiscoveryLoad(DiscoveryError),

    #[error("Discovery failed: {0}")]
    Discovery(DiscoveryError),

    #[error("Failed to start browser fallback: {0}")]
    Escalation(EscalationError),

    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ModuleUnavailable(_) => 2,
            Self::DiscoveryLoad(_) => 3,
            Self::Discovery(_) => 4,
            Self::Escalation(_) => 5,
            Self::Cancelled => 130,
        }
    }
}

impl From<DiscoveryError> for PipelineError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::Cancelled => Self::Cancelled,
            other => Self::Discovery(other),
        }
    }
}

impl From<EscalationError> for PipelineError {
    fn from(e: EscalationError) -> Self {
        match e {
            EscalationError::Cancelled => Self::Cancelled,
            EscalationError::Browser(BrowserError::Unavailable(msg)) => {
                Self::ModuleUnavailable(msg)
            }
            other => Self::Escalation(other),
        }
    }
}

/// Exit code when the browser fallback ran and saved nothing.
pub const EXIT_NOTHING_FOUND: u8 = 6;

/// Per-run options.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub ttl: Duration,
    pub force_refresh: bool,
}

/// Candidates for a company and where they came from.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub candidates: Vec<Candidate>,
    pub from_cache: bool,
    /// Search provider error from a fresh run. Such runs are not cached.
    pub search_failure: Option<String>,
}

/// How a run was resolved.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Static discovery found acceptable PDFs; no browser was started.
    Static {
        accepted: Vec<PdfCandidate>,
        downloaded: Vec<StoredDocument>,
    },
    /// The browser fallback ran. Its results are never cached.
    Escalated { results: Vec<EscalationResult> },
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub company: String,
    pub discovered: Discovered,
    pub verdict: Verdict,
}

impl PipelineOutcome {
    pub fn exit_code(&self) -> u8 {
        match &self.verdict {
            Verdict::Escalated { results } if results.is_empty() => EXIT_NOTHING_FOUND,
            _ => 0,
        }
    }

    /// Best PDF across all candidates, accepted or not.
    pub fn top_pdf(&self) -> Option<&PdfCandidate> {
        top_pdf(&self.discovered.candidates)
    }
}

/// Best PDF across candidates, by score then fiscal year.
pub fn top_pdf(candidates: &[Candidate]) -> Option<&PdfCandidate> {
    candidates
        .iter()
        .flat_map(|c| c.pdfs.iter())
        .min_by(|a, b| a.rank_cmp(b))
}

/// Every PDF that clears the acceptance bar, best first.
pub fn accepted_pdfs(candidates: &[Candidate], config: &DiscoveryConfig) -> Vec<PdfCandidate> {
    let mut accepted: Vec<PdfCandidate> = candidates
        .iter()
        .flat_map(|c| c.pdfs.iter())
        .filter(|p| p.is_acceptable(config.pdf_score_threshold, config.min_pdf_bytes))
        .cloned()
        .collect();
    sort_ranked(&mut accepted);
    accepted
}

/// Orchestrates cache, discovery and the browser fallback.
pub struct Pipeline {
    aggregator: CandidateAggregator,
    cache: Arc<dyn CandidateCache>,
    escalator: Option<FallbackEscalator>,
    downloads: Option<(Arc<dyn PageFetcher>, DocumentStore)>,
}

impl Pipeline {
    pub fn new(aggregator: CandidateAggregator, cache: Arc<dyn CandidateCache>) -> Self {
        Self {
            aggregator,
            cache,
            escalator: None,
            downloads: None,
        }
    }

    pub fn with_escalator(mut self, escalator: FallbackEscalator) -> Self {
        self.escalator = Some(escalator);
        self
    }

    /// Store accepted static PDFs, fetched with `fetcher`.
    pub fn with_downloads(mut self, fetcher: Arc<dyn PageFetcher>, store: DocumentStore) -> Self {
        self.downloads = Some((fetcher, store));
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        self.aggregator.config()
    }

    /// Cached candidates when fresh, otherwise a new discovery run.
    ///
    /// `force_refresh` skips the cache lookup but still stores the result.
    /// A run whose search failed is returned but never stored.
    pub async fn discover(
        &self,
        company: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<Discovered, PipelineError> {
        if !options.force_refresh {
            if let Some(entry) = self.cache.get(company, options.ttl).await {
                info!(
                    "Using cached candidates for '{}' from {}",
                    entry.company, entry.cached_at
                );
                return Ok(Discovered {
                    candidates: entry.candidates,
                    from_cache: true,
                    search_failure: None,
                });
            }
        }

        info!("Running discovery for '{}'", company.trim());
        let run = self.aggregator.discover(company, cancel).await?;

        if run.search_failure.is_some() {
            warn!("Not caching results for '{}': search failed", company.trim());
        } else if let Err(e) = self.cache.put(company, &run.candidates).await {
            warn!("Failed to cache candidates: {}", e);
        }

        Ok(Discovered {
            candidates: run.candidates,
            from_cache: false,
            search_failure: run.search_failure,
        })
    }

    /// Discover, then accept statically found PDFs or escalate.
    pub async fn run(
        &self,
        company: &str,
        options: &RunOptions,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let discovered = self.discover(company, options, cancel).await?;
        if discovered.candidates.is_empty() {
            info!("Discovery returned no candidates");
        }

        let accepted = accepted_pdfs(&discovered.candidates, self.config());
        let verdict = if !accepted.is_empty() {
            info!("Static discovery found {} acceptable PDFs", accepted.len());
            let downloaded = self.download(company, &accepted).await;
            Verdict::Static {
                accepted,
                downloaded,
            }
        } else {
            info!("No acceptable static PDFs; running browser fallback");
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let escalator = self.escalator.as_ref().ok_or_else(|| {
                PipelineError::ModuleUnavailable("no browser fallback configured".to_string())
            })?;
            let results = escalator
                .escalate(company, &discovered.candidates, cancel)
                .await?;
            Verdict::Escalated { results }
        };

        Ok(PipelineOutcome {
            company: company.trim().to_string(),
            discovered,
            verdict,
        })
    }

    async fn download(&self, company: &str, accepted: &[PdfCandidate]) -> Vec<StoredDocument> {
        let Some((fetcher, store)) = &self.downloads else {
            return Vec::new();
        };
        let timeout = self.config().timeouts.page();

        let mut stored = Vec::new();
        for pdf in accepted {
            let url = if pdf.resolved_url.is_empty() {
                &pdf.pdf_url
            } else {
                &pdf.resolved_url
            };

            let page = match fetcher.get(url, timeout).await {
                Ok(page) if page.status == 200 => page,
                Ok(page) => {
                    warn!("Download of {} returned HTTP {}", url, page.status);
                    continue;
                }
                Err(e) => {
                    warn!("Download failed: {}", e);
                    continue;
                }
            };

            let name = page
                .content_disposition_filename()
                .unwrap_or_else(|| url_basename(url));
            match store.save_unique(company, &name, &page.body) {
                Ok(Some(doc)) => {
                    info!("Stored {}", doc.path.display());
                    stored.push(doc);
                }
                Ok(None) => debug!("{} already stored", url),
                Err(e) => warn!("Failed to store {}: {}", url, e),
            }
        }
        stored
    }
}
