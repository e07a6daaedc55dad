//! sitefeed CLI
//!
//! Thin caller around the run coordinator: which site to run, how often
//! and with what retention is the operator's scheduling concern.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use sitefeed::{
    config::{Config, SiteConfig},
    error::Result,
    models::RunReport,
    pipeline::{FetchProcessor, RetentionManager, RunCoordinator},
    source::SitemapSource,
    state::{SqliteStateStore, StateStore},
    utils::log as summary,
};

/// sitefeed - incremental sitemap-to-feed engine
#[derive(Parser, Debug)]
#[command(name = "sitefeed", version, about = "Incremental sitemap-to-feed engine")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "sitefeed.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one incremental cycle (all sites, or one with --site)
    Run {
        /// Restrict the run to a single site
        #[arg(long)]
        site: Option<String>,

        /// Emit run reports as JSON instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// Show per-status URL counts for a site
    Stats {
        site: String,

        /// Emit the stats as JSON instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// Apply the retention policy (all sites, or one with --site)
    Prune {
        /// Restrict pruning to a single site
        #[arg(long)]
        site: Option<String>,
    },

    /// Delete all recorded state for a site
    Reset {
        site: String,

        /// Confirm the deletion
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Resolve the sites a command applies to.
fn select_sites<'a>(config: &'a Config, site: &Option<String>) -> Result<Vec<&'a SiteConfig>> {
    match site {
        Some(name) => {
            let site = config.site(name).ok_or_else(|| {
                sitefeed::error::AppError::config(format!("site {name} is not configured"))
            })?;
            Ok(vec![site])
        }
        None => {
            if config.sites.is_empty() {
                return Err(sitefeed::error::AppError::config("no sites configured"));
            }
            Ok(config.sites.iter().collect())
        }
    }
}

fn emit_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    print_report(report);
    Ok(())
}

fn print_report(report: &RunReport) {
    summary::success(&format!(
        "{}: {}",
        report.site_name,
        report.outcome.as_str()
    ));
    summary::sub_item(&format!(
        "total {} | new {} | retry {} | skip {}",
        report.counts.total, report.counts.new, report.counts.retry, report.counts.skip
    ));
    summary::sub_item(&format!(
        "succeeded {} | failed {}",
        report.counts.succeeded, report.counts.failed
    ));
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);

    if let Command::Validate = cli.command {
        config.validate()?;
        summary::success(&format!("Configuration OK ({} site(s))", config.sites.len()));
        return Ok(());
    }

    config.validate()?;
    let store = Arc::new(SqliteStateStore::connect(&config.store.db_path).await?);

    match cli.command {
        Command::Run { site, json } => {
            let sites = select_sites(&config, &site)?;

            let client = reqwest::Client::builder()
                .user_agent(&config.fetch.user_agent)
                .timeout(config.fetch.timeout())
                .build()?;
            let processor = Arc::new(FetchProcessor::with_client(
                client.clone(),
                config.fetch.max_concurrent,
            ));
            let coordinator = RunCoordinator::new(store.clone(), processor, &config.run);

            if !json {
                summary::header(&format!("Incremental run ({} site(s))", sites.len()));
            }
            let mut aborted = 0;
            for site in sites {
                let source = SitemapSource::new(client.clone(), &site.sitemap_url);
                match coordinator.run(&site.name, &source).await {
                    Ok(report) => emit_report(&report, json)?,
                    Err(e) => {
                        summary::failure(&format!("{}: {}", site.name, e));
                        emit_report(&RunReport::aborted(&site.name), json)?;
                        aborted += 1;
                    }
                }
            }
            if aborted > 0 {
                std::process::exit(1);
            }
        }

        Command::Stats { site, json } => {
            let stats = store.site_stats(&site).await?;
            let state = store.get_site_state(&site).await?;

            if json {
                let payload = serde_json::json!({
                    "site_name": site,
                    "source_url": state.as_ref().map(|s| s.source_url.clone()),
                    "last_run_at": state.as_ref().and_then(|s| s.last_run_at),
                    "stats": stats,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
                return Ok(());
            }

            summary::header(&format!("Site: {}", site));
            match state {
                Some(state) => {
                    summary::sub_item(&format!("source: {}", state.source_url));
                    summary::sub_item(&format!(
                        "last run: {}",
                        state
                            .last_run_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "never".to_string())
                    ));
                }
                None => summary::sub_item("not tracked yet"),
            }
            summary::sub_item(&format!(
                "urls: {} total | {} unprocessed | {} processed | {} failed",
                stats.total_urls, stats.unprocessed, stats.processed, stats.failed
            ));
        }

        Command::Prune { site } => {
            let sites = select_sites(&config, &site)?;
            let manager = RetentionManager::new(store.clone());
            let policy = config.retention.policy();

            for site in sites {
                let report = manager.prune(&site.name, &policy).await?;
                summary::success(&format!(
                    "{}: pruned {} row(s) ({} expired, {} overflow)",
                    site.name,
                    report.total(),
                    report.expired,
                    report.overflow
                ));
            }
        }

        Command::Reset { site, force } => {
            if !force {
                summary::failure(&format!(
                    "Refusing to reset {site} without --force; this deletes all recorded state"
                ));
                std::process::exit(1);
            }
            store.reset_site(&site).await?;
            summary::success(&format!("Reset all state for {site}"));
        }

        Command::Validate => unreachable!("handled above"),
    }

    Ok(())
}
