//! Browser fallback against a single page.

use console::style;

use super::super::helpers;
use super::discover::report_error;
use crate::config::{Config, Settings};
use crate::services::pipeline::{PipelineError, EXIT_NOTHING_FOUND};

pub async fn cmd_escalate(
    settings: &Settings,
    config: &Config,
    company: &str,
    url: &str,
) -> anyhow::Result<u8> {
    let escalator = match helpers::escalator(settings, config) {
        Ok(escalator) => escalator,
        Err(e) => return Ok(report_error(&e)),
    };

    println!("{} Opening {}", style("→").cyan(), url);
    let results = match escalator.escalate_page(company, url).await {
        Ok(results) => results,
        Err(e) => return Ok(report_error(&PipelineError::from(e))),
    };

    if results.is_empty() {
        println!("{} No PDFs found", style("✗").red());
        return Ok(EXIT_NOTHING_FOUND);
    }

    helpers::print_escalation_results(&results);
    Ok(0)
}
