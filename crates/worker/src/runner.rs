//! Job registry and scheduling substrate.
//!
//! Each schedule entry runs on its own tokio task with its own interval
//! ticker, so a slow or failing job never delays another entry's
//! triggers. A job failure is logged, counted, and dropped; the next
//! tick fires regardless. Overlapping or repeated executions are safe
//! because every write path is duplicate-tolerant at the store level --
//! no cross-job locking is taken.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use tickwatch_core::metrics::names;
use tickwatch_core::{WatchConfig, WorkerMetrics};
use tickwatch_feed::PriceFeed;
use tickwatch_store::Store;

use crate::jobs::{self, JobError};
use crate::schedule::{tasks, ScheduleEntry};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// A schedule entry names a task with no registered handler. This is
    /// a startup-time configuration error, not a silently skipped job.
    #[error("no handler registered for task '{task}' (schedule entry '{job}')")]
    MissingHandler { job: String, task: String },

    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error(transparent)]
    Job(#[from] JobError),
}

// ── Job context ───────────────────────────────────────────────

/// Dependencies handed to every job. Cloning is cheap: the store shares
/// its pool, the feed its HTTP client, the metrics its collector.
#[derive(Clone)]
pub struct JobContext {
    pub store: Store,
    pub feed: PriceFeed,
    pub config: WatchConfig,
    pub metrics: WorkerMetrics,
}

// ── Registry ──────────────────────────────────────────────────

/// Boxed async job handler: positional string args in, summary line out.
pub type JobFuture = Pin<Box<dyn Future<Output = Result<String, JobError>> + Send>>;
pub type JobHandler = Arc<dyn Fn(JobContext, Vec<String>) -> JobFuture + Send + Sync>;

/// Explicit mapping from task identifier to handler.
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, JobHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a task identifier.
    pub fn register<F, Fut>(&mut self, task: impl Into<String>, handler: F)
    where
        F: Fn(JobContext, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, JobError>> + Send + 'static,
    {
        self.handlers
            .insert(task.into(), Arc::new(move |ctx, args| Box::pin(handler(ctx, args))));
    }

    pub fn contains(&self, task: &str) -> bool {
        self.handlers.contains_key(task)
    }

    fn handler_for(&self, task: &str) -> Option<JobHandler> {
        self.handlers.get(task).cloned()
    }

    /// Registry with every built-in job wired up.
    pub fn standard() -> Self {
        let mut registry = Self::new();

        registry.register(tasks::FETCH_PRICE, |ctx, args| async move {
            let symbol = jobs::required_arg(&args, 0, "symbol")?;
            let price = jobs::prices::fetch_price(&ctx, &symbol).await?;
            Ok(format!("{symbol} = {price}"))
        });

        registry.register(tasks::COMPUTE_ALERTS, |ctx, args| async move {
            let symbol = jobs::required_arg(&args, 0, "symbol")?;
            let window = jobs::optional_arg(&args, 1, "window_minutes")?;
            let threshold = jobs::optional_arg(&args, 2, "threshold_pct")?;
            let created = jobs::alerts::compute_alerts(&ctx, &symbol, window, threshold).await?;
            Ok(format!("{created} alert(s) for {symbol}"))
        });

        registry.register(tasks::PRUNE_OLD_PRICES, |ctx, args| async move {
            let days = jobs::optional_arg(&args, 0, "retention_days")?;
            let removed = jobs::maintenance::prune_old_prices(&ctx, days).await?;
            Ok(format!("{removed} sample(s) pruned"))
        });

        registry.register(tasks::SEED_MOCK_PRICES, |ctx, args| async move {
            let symbol = jobs::required_arg(&args, 0, "symbol")?;
            let hours = jobs::optional_arg(&args, 1, "hours")?;
            let interval = jobs::optional_arg(&args, 2, "interval_seconds")?;
            let inserted = jobs::seed::seed_mock_prices(&ctx, &symbol, hours, interval).await?;
            Ok(format!("{inserted} synthetic sample(s) for {symbol}"))
        });

        registry.register(tasks::BACKFILL_PRICES, |ctx, args| async move {
            let symbol = jobs::required_arg(&args, 0, "symbol")?;
            let hours = jobs::optional_arg(&args, 1, "hours")?;
            let inserted = jobs::prices::backfill_prices(&ctx, &symbol, hours).await?;
            Ok(format!("{inserted} historical sample(s) for {symbol}"))
        });

        registry
    }
}

// ── Runner ────────────────────────────────────────────────────

/// Triggers schedule entries at their configured intervals and exposes
/// an ad hoc entry point for immediate execution.
pub struct Runner {
    registry: Arc<JobRegistry>,
    ctx: JobContext,
}

impl Runner {
    pub fn new(registry: JobRegistry, ctx: JobContext) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx,
        }
    }

    /// Spawn one ticker task per schedule entry.
    ///
    /// Fails upfront if any entry references an unregistered task, so a
    /// misconfigured schedule is caught at startup rather than logged
    /// away tick by tick.
    pub fn start(
        &self,
        schedule: &BTreeMap<String, ScheduleEntry>,
    ) -> Result<RunnerHandle, RunnerError> {
        let mut resolved = Vec::with_capacity(schedule.len());
        for (job, entry) in schedule {
            let handler =
                self.registry
                    .handler_for(&entry.task)
                    .ok_or_else(|| RunnerError::MissingHandler {
                        job: job.clone(),
                        task: entry.task.clone(),
                    })?;
            resolved.push((job.clone(), entry.clone(), handler));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(resolved.len());

        for (job, entry, handler) in resolved {
            let ctx = self.ctx.clone();
            let mut shutdown = shutdown_rx.clone();
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(entry.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // Skip the immediate first tick; entries fire after one
                // full interval, matching the configured cadence.
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            run_entry(&ctx, &job, &handler, &entry.args).await;
                        }
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                debug!(job = %job, "schedule entry stopping");
                                break;
                            }
                        }
                    }
                }
            }));
        }

        info!(entries = tasks.len(), "schedule started");
        Ok(RunnerHandle {
            shutdown: shutdown_tx,
            tasks,
        })
    }

    /// Execute a registered task immediately, outside the schedule.
    /// Unlike scheduled ticks, the job's error propagates to the caller.
    pub async fn run_now(&self, task: &str, args: Vec<String>) -> Result<String, RunnerError> {
        let handler = self
            .registry
            .handler_for(task)
            .ok_or_else(|| RunnerError::UnknownTask(task.to_string()))?;
        Ok(handler(self.ctx.clone(), args).await?)
    }
}

/// Run one scheduled trigger, isolating any failure to this entry.
async fn run_entry(ctx: &JobContext, job: &str, handler: &JobHandler, args: &[String]) {
    match handler(ctx.clone(), args.to_vec()).await {
        Ok(summary) => debug!(job = %job, %summary, "job completed"),
        Err(err) => {
            ctx.metrics.incr(names::JOB_FAILURE, job);
            error!(job = %job, error = %err, "job failed");
        }
    }
}

// ── Handle ────────────────────────────────────────────────────

/// Handle to a started schedule; dropping it without calling
/// [`shutdown`](RunnerHandle::shutdown) aborts nothing (tasks keep
/// running until process exit).
pub struct RunnerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunnerHandle {
    pub fn job_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal all entries to stop and wait for their tasks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        info!("schedule stopped");
    }
}

// ── Tests ─────────────────────────────────────────────────────
