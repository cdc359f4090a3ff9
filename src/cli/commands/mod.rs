//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod cache;
mod discover;
mod escalate;
mod pipeline;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tokio_util::sync::CancellationToken;

use crate::config::{load_settings_with_options, LoadOptions};

/// Exit code for usage and setup errors.
const EXIT_FAILURE: u8 = 1;

#[derive(Parser)]
#[command(name = "reportscout")]
#[command(about = "Locate financial report PDFs for a company")]
#[command(version)]
pub struct Cli {
    /// Data directory (cache and stored PDFs)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keep discovery results in memory only
    #[arg(long, global = true)]
    no_cache: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Find and rank candidate pages and report PDFs (no browser)
    Discover {
        /// Company name
        company: String,
        /// Ignore cached results (the new results are still cached)
        #[arg(long)]
        force: bool,
        /// Cache freshness in days (default: from config)
        #[arg(long)]
        ttl: Option<i64>,
        /// Print candidates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Discover, then fall back to a browser if nothing good was found
    Pipeline {
        /// Company name
        company: String,
        /// Ignore cached results (the new results are still cached)
        #[arg(long)]
        force: bool,
        /// Cache freshness in days (default: from config)
        #[arg(long)]
        ttl: Option<i64>,
        /// Store accepted static PDFs under the storage root
        #[arg(long)]
        download: bool,
    },

    /// Run the browser fallback against a single page
    Escalate {
        /// Company name (names the storage folder)
        company: String,
        /// Page to open
        url: String,
    },

    /// Inspect or clear the discovery cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached companies
    Show {
        /// Show one company's candidates
        company: Option<String>,
    },
    /// Remove one company, or everything
    Clear {
        /// Company to remove (all if omitted)
        company: Option<String>,
    },
}

/// Run the CLI and return the process exit code.
pub async fn run() -> u8 {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data: cli.data,
    };
    let (settings, config) = match load_settings_with_options(options).await {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            return EXIT_FAILURE;
        }
    };

    // Ctrl-C stops the run between stages
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let result = match cli.command {
        Commands::Discover {
            company,
            force,
            ttl,
            json,
        } => {
            discover::cmd_discover(
                &settings,
                &config,
                &company,
                force,
                ttl,
                json,
                cli.no_cache,
                &cancel,
            )
            .await
        }
        Commands::Pipeline {
            company,
            force,
            ttl,
            download,
        } => {
            pipeline::cmd_pipeline(
                &settings,
                &config,
                &company,
                force,
                ttl,
                download,
                cli.no_cache,
                &cancel,
            )
            .await
        }
        Commands::Escalate { company, url } => {
            escalate::cmd_escalate(&settings, &config, &company, &url).await
        }
        Commands::Cache { command } => match command {
            CacheCommands::Show { company } => {
                cache::cmd_cache_show(&settings, &config, company.as_deref()).await
            }
            CacheCommands::Clear { company } => {
                cache::cmd_cache_clear(&settings, company.as_deref()).await
            }
        },
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", style("✗").red(), e);
            EXIT_FAILURE
        }
    }
}
