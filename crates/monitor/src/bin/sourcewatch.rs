//! sourcewatch: emails advertisers' newly failing data sources.
//!
//! Intended to be run by a scheduler. Each invocation fetches the current
//! failures, compares them with the snapshot left by the previous run,
//! sends one email per advertiser with new failures and saves the new
//! snapshot.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sourcewatch_core::config::{load_dotenv, load_dotenv_from};
use sourcewatch_core::Config;
use sourcewatch_monitor::{FileSnapshotStore, HttpFeed, Monitor, RunOutcome};
use sourcewatch_notify::{EmailNotifier, LogNotifier, Notifier, TemplateRenderer};

// ── CLI ─────────────────────────────────────────────────────────────

/// Advertiser source-failure monitor.
#[derive(Parser, Debug)]
#[command(name = "sourcewatch", version, about)]
struct Cli {
    /// Env file with credentials and settings (defaults to `.env`).
    #[arg(long, env = "SOURCEWATCH_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Snapshot file path; overrides SNAPSHOT_FILE.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Log notifications instead of sending them and leave the snapshot untouched.
    #[arg(long)]
    dry_run: bool,

    /// Debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match &cli.env_file {
        Some(path) => load_dotenv_from(path),
        None => load_dotenv(),
    }

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(path) = cli.snapshot {
        config.snapshot_path = path;
    }
    config.log_summary();

    let feed = HttpFeed::from_config(&config.api).context("failed to build feed client")?;
    let store = FileSnapshotStore::new(&config.snapshot_path);
    let renderer = TemplateRenderer::new(config.smtp.subject_template.as_str())
        .context("invalid EMAIL_SUBJECT_TEMPLATE")?;
    let notifier: Box<dyn Notifier> = if cli.dry_run {
        Box::new(LogNotifier)
    } else {
        Box::new(EmailNotifier::from_config(&config.smtp).context("failed to build SMTP notifier")?)
    };

    let monitor = Monitor::new(Box::new(feed), Box::new(store), notifier, renderer)
        .with_policy(config.failure_policy)
        .dry_run(cli.dry_run);

    let report = monitor.run().await?;

    match report.outcome {
        RunOutcome::Bootstrap => info!("baseline recorded"),
        RunOutcome::Completed => info!(
            notified = report.notified.len(),
            failed = report.failed.len(),
            "run complete"
        ),
    }

    if !report.is_clean() {
        let ids: Vec<&str> = report
            .failed
            .iter()
            .map(|f| f.advertiser_id.as_str())
            .collect();
        bail!(
            "{} notification(s) could not be delivered (advertisers: {}); they will be retried next run",
            ids.len(),
            ids.join(", ")
        );
    }

    Ok(())
}
