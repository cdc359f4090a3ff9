//! Shared CLI helpers: component wiring and report printing.

use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::cache::{CandidateCache, JsonFileCache, MemoryCache};
use crate::config::{Config, Settings};
use crate::discovery::{CandidateAggregator, DuckDuckGoSearch};
use crate::models::{Candidate, PdfCandidate};
use crate::scrapers::{ChromiumDriver, HttpClient, RateLimiter};
use crate::services::pipeline::{Discovered, PipelineError};
use crate::services::{EscalationResult, FallbackEscalator};
use crate::storage::DocumentStore;
use crate::utils::{format_size, truncate_chars};

/// Rate-limited HTTP client for static discovery.
pub fn http_client(config: &Config) -> anyhow::Result<HttpClient> {
    let limiter = RateLimiter::new(config.discovery.request_delay());
    HttpClient::new(&config.discovery.user_agent, limiter).context("Failed to create HTTP client")
}

/// Static discovery chain over DuckDuckGo and the given client.
pub fn aggregator(config: &Config, client: &HttpClient) -> Result<CandidateAggregator, PipelineError> {
    let search = DuckDuckGoSearch::new(client.clone(), config.discovery.timeouts.search());
    CandidateAggregator::new(
        config.discovery.clone(),
        Arc::new(search),
        Arc::new(client.clone()),
    )
    .map_err(PipelineError::DiscoveryLoad)
}

pub fn cache(settings: &Settings, no_cache: bool) -> Arc<dyn CandidateCache> {
    if no_cache {
        Arc::new(MemoryCache::new())
    } else {
        Arc::new(JsonFileCache::new(&settings.cache_path))
    }
}

/// Browser fallback saving into the storage root.
pub fn escalator(settings: &Settings, config: &Config) -> Result<FallbackEscalator, PipelineError> {
    let driver = ChromiumDriver::new(config.browser.clone());
    FallbackEscalator::new(
        Arc::new(driver),
        DocumentStore::new(&settings.storage_root),
        &config.discovery,
        config.browser.clone(),
    )
    .map_err(PipelineError::Escalation)
}

/// Cache TTL from the command line, or the configured default.
pub fn ttl(config: &Config, days: Option<i64>) -> anyhow::Result<chrono::Duration> {
    match days {
        Some(days) => chrono::Duration::try_days(days)
            .with_context(|| format!("--ttl {} days is out of range", days)),
        None => config.discovery.ttl().with_context(|| {
            format!(
                "discovery.ttl_days = {} is out of range",
                config.discovery.ttl_days
            )
        }),
    }
}

/// Warn on stderr when the search stage failed; such results are not cached.
pub fn warn_search_failure(discovered: &Discovered) {
    if let Some(failure) = &discovered.search_failure {
        eprintln!(
            "{} Search failed, results are incomplete and were not cached: {}",
            style("!").yellow(),
            failure
        );
    }
}

pub fn print_candidates(candidates: &[Candidate]) {
    if candidates.is_empty() {
        println!("{} No candidates found", style("!").yellow());
        return;
    }

    println!("\n{}", style("Candidates").bold());
    println!("{}", "-".repeat(78));
    println!("{:<6} {:<14} {:<5} URL", "Conf", "Method", "PDFs");
    println!("{}", "-".repeat(78));

    for candidate in candidates {
        println!(
            "{:<6.2} {:<14} {:<5} {}",
            candidate.confidence,
            candidate.method.as_str(),
            candidate.pdfs.len(),
            candidate.url
        );
        for pdf in candidate.pdfs.iter().take(3) {
            println!(
                "       {} {:.2} {:<9} {}",
                style("↳").dim(),
                pdf.score,
                pdf.doc_type.as_str(),
                truncate_chars(&pdf.pdf_url, 70)
            );
        }
        for error in &candidate.errors {
            println!("       {} {}", style("!").yellow(), truncate_chars(error, 70));
        }
    }
}

pub fn print_pdf(label: &str, pdf: &PdfCandidate) {
    let year = pdf
        .fiscal_year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "-".to_string());
    let size = pdf
        .content_length
        .map(format_size)
        .unwrap_or_else(|| "?".to_string());

    println!(
        "{} score={:.2} type={} year={} pdf={} size={}",
        label,
        pdf.score,
        pdf.doc_type,
        year,
        if pdf.head_confirmed_pdf { "yes" } else { "no" },
        size
    );
    println!("    {}", pdf.pdf_url);
}

pub fn print_escalation_results(results: &[EscalationResult]) {
    for result in results {
        println!(
            "{} {} ({}, {}) from {}",
            style("✓").green(),
            result.saved_path.display(),
            result.source,
            format_size(result.size_bytes),
            result.pdf_url
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_from_flag_or_config() {
        let config = Config::default();
        assert_eq!(ttl(&config, Some(2)).unwrap(), chrono::Duration::days(2));
        assert_eq!(ttl(&config, None).unwrap(), chrono::Duration::days(7));
    }

    #[test]
    fn test_ttl_out_of_range_is_an_error() {
        let mut config = Config::default();
        let err = ttl(&config, Some(9_999_999_999_999)).unwrap_err();
        assert!(err.to_string().contains("--ttl"));

        config.discovery.ttl_days = i64::MIN;
        let err = ttl(&config, None).unwrap_err();
        assert!(err.to_string().contains("ttl_days"));
    }
}
