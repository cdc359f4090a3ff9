//! Discovery cache inspection.

use console::style;

use super::super::helpers;
use crate::cache::{CandidateCache, JsonFileCache};
use crate::config::{Config, Settings};
use crate::utils::format_size;

pub async fn cmd_cache_show(
    settings: &Settings,
    config: &Config,
    company: Option<&str>,
) -> anyhow::Result<u8> {
    let cache = JsonFileCache::new(&settings.cache_path);
    let entries = cache.entries().await;
    let ttl = helpers::ttl(config, None)?;
    let now = chrono::Utc::now();

    if let Some(company) = company {
        let key = crate::cache::cache_key(company);
        let Some(entry) = entries
            .into_iter()
            .find(|e| crate::cache::cache_key(&e.company) == key)
        else {
            println!("{} No cached entry for '{}'", style("!").yellow(), company);
            return Ok(0);
        };
        println!(
            "{} '{}' cached {} ({})",
            style("✓").green(),
            entry.company,
            entry.cached_at.format("%Y-%m-%d %H:%M"),
            if entry.is_fresh(ttl, now) { "fresh" } else { "stale" }
        );
        helpers::print_candidates(&entry.candidates);
        return Ok(0);
    }

    if entries.is_empty() {
        println!("{} Cache is empty", style("!").yellow());
        return Ok(0);
    }

    let size = tokio::fs::metadata(&settings.cache_path)
        .await
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "?".to_string());
    println!(
        "{} ({}, {} entries)",
        settings.cache_path.display(),
        size,
        entries.len()
    );
    println!("{}", "-".repeat(60));
    println!("{:<30} {:<18} {:<6} State", "Company", "Cached", "Cands");
    println!("{}", "-".repeat(60));
    for entry in &entries {
        println!(
            "{:<30} {:<18} {:<6} {}",
            crate::utils::truncate_chars(&entry.company, 30),
            entry.cached_at.format("%Y-%m-%d %H:%M"),
            entry.candidates.len(),
            if entry.is_fresh(ttl, now) {
                style("fresh").green()
            } else {
                style("stale").dim()
            }
        );
    }
    Ok(0)
}

pub async fn cmd_cache_clear(settings: &Settings, company: Option<&str>) -> anyhow::Result<u8> {
    let cache = JsonFileCache::new(&settings.cache_path);
    let removed = cache.remove(company).await?;
    match company {
        Some(company) if removed == 0 => {
            println!("{} No cached entry for '{}'", style("!").yellow(), company)
        }
        _ => println!("{} Removed {} cache entries", style("✓").green(), removed),
    }
    Ok(0)
}
