//! Static discovery command.

use console::style;
use tokio_util::sync::CancellationToken;

use super::super::helpers;
use crate::config::{Config, Settings};
use crate::services::pipeline::{top_pdf, Pipeline, PipelineError, RunOptions};

/// Find and rank candidates for a company without starting a browser.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_discover(
    settings: &Settings,
    config: &Config,
    company: &str,
    force: bool,
    ttl: Option<i64>,
    json: bool,
    no_cache: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<u8> {
    let client = helpers::http_client(config)?;
    let aggregator = match helpers::aggregator(config, &client) {
        Ok(aggregator) => aggregator,
        Err(e) => return Ok(report_error(&e)),
    };
    let pipeline = Pipeline::new(aggregator, helpers::cache(settings, no_cache));

    let options = RunOptions {
        ttl: helpers::ttl(config, ttl)?,
        force_refresh: force,
    };
    let discovered = match pipeline.discover(company, &options, cancel).await {
        Ok(discovered) => discovered,
        Err(e) => return Ok(report_error(&e)),
    };
    helpers::warn_search_failure(&discovered);

    if json {
        println!("{}", serde_json::to_string_pretty(&discovered.candidates)?);
        return Ok(0);
    }

    println!(
        "{} {} candidates for '{}'{}",
        style("✓").green(),
        discovered.candidates.len(),
        company.trim(),
        if discovered.from_cache {
            style(" (cached)").dim().to_string()
        } else {
            String::new()
        }
    );
    helpers::print_candidates(&discovered.candidates);

    if let Some(pdf) = top_pdf(&discovered.candidates) {
        println!();
        helpers::print_pdf(&style("Top PDF").bold().to_string(), pdf);
    }

    Ok(0)
}

pub(super) fn report_error(e: &PipelineError) -> u8 {
    eprintln!("{} {}", style("✗").red(), e);
    e.exit_code()
}
