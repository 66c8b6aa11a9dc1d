//! Feedwatch CLI
//!
//! Watches one publisher's article listing and posts new articles to a
//! group chat webhook.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use feedwatch::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, CycleOutcome, Monitor},
    services::{HttpPageSource, WebhookNotifier},
    storage::SqliteStore,
};
use tokio::sync::watch;

/// Feedwatch - publisher article monitor
#[derive(Parser, Debug)]
#[command(
    name = "feedwatch",
    version,
    about = "Announce new articles from a publisher's profile page"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check periodically until interrupted
    Start,

    /// Run a single check
    Check,

    /// Show stored articles and pending notifications
    Status {
        /// Number of recent articles to list
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// Test listing access, the store and the webhook
    Test {
        /// Do not send a test message to the webhook
        #[arg(long)]
        skip_notification: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag and configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Stop flag raised by Ctrl-C.
fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Received Ctrl-C, stopping after the current step");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn build_monitor(config: &Config, stop: watch::Receiver<bool>) -> Result<Monitor> {
    let source = HttpPageSource::new(&config.crawler, &config.source)?;
    let store = SqliteStore::open(&config.storage.path).await?;
    let notifier = WebhookNotifier::new(&config.notifier)?;
    Monitor::new(
        config,
        Box::new(source),
        Box::new(store),
        Box::new(notifier),
        stop,
    )
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };
    init_logging(cli.verbose, &config.logging.level);

    match loaded {
        Ok(_) => log::info!("Loaded configuration from {}", cli.config.display()),
        Err(e) => log::warn!(
            "Failed to load {}: {e}. Using defaults.",
            cli.config.display()
        ),
    }

    match cli.command {
        Command::Start => {
            config.validate()?;
            let stop = stop_on_ctrl_c();
            let mut monitor = build_monitor(&config, stop.clone()).await?;

            let report = pipeline::self_test(&mut monitor, None).await;
            if !report.passed() {
                for error in &report.errors {
                    log::error!("Self-test: {error}");
                }
                return Err(AppError::CheckFailed(
                    "self-test failed, monitoring not started".into(),
                ));
            }

            pipeline::run_scheduler(&mut monitor, config.source.check_interval(), stop).await;
        }

        Command::Check => {
            config.validate()?;
            let mut monitor = build_monitor(&config, stop_on_ctrl_c()).await?;
            let report = monitor.run_cycle().await;

            if let CycleOutcome::Aborted { phase, reason } = &report.outcome {
                return Err(AppError::CheckFailed(format!("aborted while {phase}: {reason}")));
            }
            log::info!("Check finished: {report}");
        }

        Command::Status { limit } => {
            let store = SqliteStore::open(&config.storage.path).await?;
            let status = pipeline::collect_status(&store, &config.source.blogger_url, limit).await?;
            println!("{status}");
            store.close().await;
        }

        Command::Test { skip_notification } => {
            config.validate()?;
            let mut monitor = build_monitor(&config, stop_on_ctrl_c()).await?;
            let notifier = if skip_notification {
                None
            } else {
                Some(WebhookNotifier::new(&config.notifier)?)
            };

            let report = pipeline::self_test(&mut monitor, notifier.as_ref()).await;
            log::info!("Articles found: {}", report.articles_found);
            if let Some(sample) = &report.sample {
                log::info!(
                    "Sample: {} [{}] by {}",
                    sample.title,
                    sample.publish_time.as_deref().unwrap_or("-"),
                    sample.author.as_deref().unwrap_or("-")
                );
            }
            log::info!("Store: {}", if report.store_ok { "ok" } else { "failed" });
            match report.notification_ok {
                Some(true) => log::info!("Webhook: ok"),
                Some(false) => log::info!("Webhook: failed"),
                None => log::info!("Webhook: skipped"),
            }
            for error in &report.errors {
                log::warn!("{error}");
            }

            if !report.passed() {
                return Err(AppError::CheckFailed("self-test failed".into()));
            }
            log::info!("All tests passed!");
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }
    }

    Ok(())
}
