//! tickwatch-worker — periodic price ingestion, alerting, and retention.
//!
//! `run` (the default) starts the periodic schedule when ENABLE_BEAT is
//! set, plus the metrics endpoint; `job` executes one registered task
//! immediately and exits; `schedule` prints the job table that would
//! run.

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use tickwatch_core::{load_dotenv, WatchConfig, WorkerMetrics};
use tickwatch_feed::PriceFeed;
use tickwatch_store::Store;
use tickwatch_worker::metrics_http::spawn_metrics_server;
use tickwatch_worker::{build_schedule, JobContext, JobRegistry, LazySchedule, Runner};

/// Price ingestion worker: scheduled fetches, alert evaluation, and
/// storage retention.
#[derive(Parser, Debug)]
#[command(name = "tickwatch-worker", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the periodic schedule (requires ENABLE_BEAT=true).
    Run,
    /// Execute one task immediately with positional arguments, then exit.
    Job {
        /// Task identifier (e.g. fetch_price, compute_alerts).
        task: String,
        /// Positional arguments passed to the task.
        args: Vec<String>,
    },
    /// Print the job table built from the current configuration.
    Schedule,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    load_dotenv();
    let config = WatchConfig::from_env();
    config.log_summary();

    let store = Store::connect(&config.database_url).await?;
    let feed = PriceFeed::new(&config.quote_base_url)?;
    let metrics = WorkerMetrics::new();

    let ctx = JobContext {
        store,
        feed,
        config: config.clone(),
        metrics: metrics.clone(),
    };
    let runner = Runner::new(JobRegistry::standard(), ctx);

    match cli.command.unwrap_or(Command::Run) {
        Command::Job { task, args } => {
            let summary = runner.run_now(&task, args).await?;
            info!(%task, %summary, "job finished");
        }

        Command::Schedule => {
            for (job, entry) in build_schedule(&config) {
                println!(
                    "{job}: {} every {}s {:?}",
                    entry.task,
                    entry.interval.as_secs(),
                    entry.args
                );
            }
        }

        Command::Run => {
            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

            if config.metrics.enabled {
                spawn_metrics_server(config.metrics.port, metrics.clone(), shutdown_rx.clone());
            }

            let handle = if config.enable_beat {
                // Lazily built so configuration finalized after startup is
                // honored by invalidating and re-reading the table.
                let schedule = LazySchedule::new(|| build_schedule(&WatchConfig::from_env()));
                Some(runner.start(&schedule.get())?)
            } else {
                warn!("periodic scheduling disabled (set ENABLE_BEAT=true); serving metrics only");
                None
            };

            tokio::signal::ctrl_c().await?;
            info!("shutdown signal received");

            let _ = shutdown_tx.send(true);
            if let Some(handle) = handle {
                handle.shutdown().await;
            }
        }
    }

    Ok(())
}
