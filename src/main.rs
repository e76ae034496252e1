//! Site-Spider main entry point
//!
//! This is the command-line interface run by the scheduler, once per
//! invocation of a pass.

use anyhow::Context;
use clap::Parser;
use site_spider::config::load_config_with_hash;
use site_spider::crawler::{crawl, RunOptions};
use site_spider::notify::{ConsoleNotifier, Notifier};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Site-Spider: a resumable, time-boxed site crawler
///
/// Each invocation crawls for at most the configured script timeout and
/// checkpoints the frontier. The invocation that completes the pass writes
/// the sitemap, the image sitemap and the radar report, and reports what
/// changed since the previous pass.
#[derive(Parser, Debug)]
#[command(name = "site-spider")]
#[command(version)]
#[command(about = "A resumable, time-boxed site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl even if the sitemap was already written today
    #[arg(long)]
    force: bool,

    /// Discard checkpoints and start a new pass
    #[arg(long)]
    clear: bool,

    /// Do not deliver notifications (test mode)
    #[arg(long)]
    no_notify: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::debug!("Configuration hash: {}", config_hash);

    let options = RunOptions {
        force: cli.force,
        clear: cli.clear,
        notify: !cli.no_notify,
    };

    let host = config.host();
    let email_cron = config.notify.email_cron.clone();

    let report = crawl(config, options, &config_hash)
        .await
        .context("Crawl stopped")?;

    let summary = report.summary();
    println!("\n{}", summary);

    if options.notify && !email_cron.is_empty() {
        ConsoleNotifier::new(&host, &email_cron, true).notify(
            &summary,
            None,
            Some(&format!("{} sitemap cron", host)),
        );
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_spider=info,warn"),
            1 => EnvFilter::new("site_spider=debug,info"),
            2 => EnvFilter::new("site_spider=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
