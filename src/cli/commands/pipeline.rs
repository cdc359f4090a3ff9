//! Full discovery-then-escalation run.

use std::sync::Arc;

use console::style;
use tokio_util::sync::CancellationToken;

use super::super::helpers;
use super::discover::report_error;
use crate::config::{Config, Settings};
use crate::scrapers::PageFetcher;
use crate::services::pipeline::{Pipeline, RunOptions, Verdict};
use crate::storage::DocumentStore;

#[allow(clippy::too_many_arguments)]
pub async fn cmd_pipeline(
    settings: &Settings,
    config: &Config,
    company: &str,
    force: bool,
    ttl: Option<i64>,
    download: bool,
    no_cache: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<u8> {
    let client = helpers::http_client(config)?;
    let aggregator = match helpers::aggregator(config, &client) {
        Ok(aggregator) => aggregator,
        Err(e) => return Ok(report_error(&e)),
    };
    let escalator = match helpers::escalator(settings, config) {
        Ok(escalator) => escalator,
        Err(e) => return Ok(report_error(&e)),
    };

    let mut pipeline =
        Pipeline::new(aggregator, helpers::cache(settings, no_cache)).with_escalator(escalator);
    if download {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(client);
        pipeline = pipeline.with_downloads(fetcher, DocumentStore::new(&settings.storage_root));
    }

    let options = RunOptions {
        ttl: helpers::ttl(config, ttl)?,
        force_refresh: force,
    };
    let outcome = match pipeline.run(company, &options, cancel).await {
        Ok(outcome) => outcome,
        Err(e) => return Ok(report_error(&e)),
    };
    helpers::warn_search_failure(&outcome.discovered);

    println!(
        "{} {} candidates for '{}'{}",
        style("✓").green(),
        outcome.discovered.candidates.len(),
        outcome.company,
        if outcome.discovered.from_cache {
            style(" (cached)").dim().to_string()
        } else {
            String::new()
        }
    );

    match &outcome.verdict {
        Verdict::Static {
            accepted,
            downloaded,
        } => {
            println!(
                "{} {} PDFs accepted from static discovery",
                style("✓").green(),
                accepted.len()
            );
            for (i, pdf) in accepted.iter().enumerate() {
                helpers::print_pdf(&format!("  {}.", i + 1), pdf);
            }
            for doc in downloaded {
                println!("{} Stored {}", style("✓").green(), doc.path.display());
            }
        }
        Verdict::Escalated { results } => {
            if let Some(pdf) = outcome.top_pdf() {
                helpers::print_pdf(&format!("{} Best static PDF (rejected)", style("!").yellow()), pdf);
            }
            if results.is_empty() {
                println!("{} Browser fallback found no PDFs", style("✗").red());
            } else {
                println!(
                    "{} Browser fallback saved {} PDFs",
                    style("✓").green(),
                    results.len()
                );
                helpers::print_escalation_results(results);
            }
        }
    }

    Ok(outcome.exit_code())
}
