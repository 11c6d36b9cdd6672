//! Periodic job table.
//!
//! [`build_schedule`] is a pure function over an explicit [`WatchConfig`]
//! value; there is no globally cached table. [`LazySchedule`] defers the
//! first build until the table is actually read and can be invalidated,
//! so configuration finalized after process start is honored on the next
//! read without a restart.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tickwatch_core::WatchConfig;

/// Task identifiers bound into schedule entries and resolved through the
/// job registry.
pub mod tasks {
    pub const FETCH_PRICE: &str = "fetch_price";
    pub const COMPUTE_ALERTS: &str = "compute_alerts";
    pub const PRUNE_OLD_PRICES: &str = "prune_old_prices";
    pub const SEED_MOCK_PRICES: &str = "seed_mock_prices";
    pub const BACKFILL_PRICES: &str = "backfill_prices";
}

/// One named periodic job: which task runs, how often, with what args.
/// Ephemeral; rebuilt from configuration, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub task: String,
    pub interval: Duration,
    pub args: Vec<String>,
}

/// Build the job table for the configured assets.
///
/// Symbols are trimmed, uppercased, and de-duplicated implicitly by map
/// key collision. Each symbol gets a fetch entry and a paired alert
/// entry on the same cadence; a single global retention entry is
/// appended at its own interval when retention is enabled.
pub fn build_schedule(config: &WatchConfig) -> BTreeMap<String, ScheduleEntry> {
    let every = Duration::from_secs(config.fetch_interval_seconds.max(1));

    let mut schedule = BTreeMap::new();
    for raw in &config.assets {
        let sym = raw.trim().to_uppercase();
        if sym.is_empty() {
            continue;
        }
        schedule.insert(
            format!("fetch_{sym}"),
            ScheduleEntry {
                task: tasks::FETCH_PRICE.to_string(),
                interval: every,
                args: vec![sym.clone()],
            },
        );
        schedule.insert(
            format!("compute_{sym}"),
            ScheduleEntry {
                task: tasks::COMPUTE_ALERTS.to_string(),
                interval: every,
                args: vec![sym.clone()],
            },
        );
    }

    if config.retention.enabled() {
        schedule.insert(
            tasks::PRUNE_OLD_PRICES.to_string(),
            ScheduleEntry {
                task: tasks::PRUNE_OLD_PRICES.to_string(),
                interval: Duration::from_secs(config.retention.interval_seconds.max(1)),
                args: Vec::new(),
            },
        );
    }

    schedule
}

// ── Lazy table ────────────────────────────────────────────────

type ScheduleFactory = Box<dyn Fn() -> BTreeMap<String, ScheduleEntry> + Send + Sync>;

/// A schedule table computed on first access and cached until
/// [`invalidate`](LazySchedule::invalidate) is called.
pub struct LazySchedule {
    factory: ScheduleFactory,
    cache: Mutex<Option<Arc<BTreeMap<String, ScheduleEntry>>>>,
}

impl LazySchedule {
    pub fn new(
        factory: impl Fn() -> BTreeMap<String, ScheduleEntry> + Send + Sync + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            cache: Mutex::new(None),
        }
    }

    /// The current table, building it if no cached copy exists.
    pub fn get(&self) -> Arc<BTreeMap<String, ScheduleEntry>> {
        let mut cache = self.cache.lock().expect("schedule cache mutex poisoned");
        match cache.as_ref() {
            Some(table) => Arc::clone(table),
            None => {
                let table = Arc::new((self.factory)());
                *cache = Some(Arc::clone(&table));
                table
            }
        }
    }

    /// Drop the cached table; the next read recomputes it.
    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().expect("schedule cache mutex poisoned");
        *cache = None;
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tickwatch_core::config::{
        AlertConfig, MetricsConfig, RetentionConfig, SeedConfig,
    };

    fn config_with_assets(assets: Vec<&str>) -> WatchConfig {
        WatchConfig {
            assets: assets.into_iter().map(String::from).collect(),
            fetch_interval_seconds: 120,
            enable_beat: true,
            database_url: "sqlite::memory:".to_string(),
            quote_base_url: "http://127.0.0.1:9".to_string(),
            alert: AlertConfig { window_minutes: 60, threshold_pct: 5.0 },
            retention: RetentionConfig { days: 30, interval_seconds: 3_600 },
            seed: SeedConfig { hours: 168, interval_seconds: 300 },
            metrics: MetricsConfig { enabled: false, port: 0 },
        }
    }

    #[test]
    fn builds_paired_fetch_and_compute_entries() {
        let schedule = build_schedule(&config_with_assets(vec!["BTC", "ETH"]));

        let fetch = &schedule["fetch_BTC"];
        assert_eq!(fetch.task, tasks::FETCH_PRICE);
        assert_eq!(fetch.interval, Duration::from_secs(120));
        assert_eq!(fetch.args, vec!["BTC"]);

        let compute = &schedule["compute_BTC"];
        assert_eq!(compute.task, tasks::COMPUTE_ALERTS);
        assert_eq!(compute.interval, Duration::from_secs(120));
        assert_eq!(compute.args, vec!["BTC"]);

        assert!(schedule.contains_key("fetch_ETH"));
        assert!(schedule.contains_key("compute_ETH"));
    }

    #[test]
    fn normalizes_and_deduplicates_symbols() {
        let schedule = build_schedule(&config_with_assets(vec!["BTC", " eth ", "", "btc"]));

        // 2 unique symbols × 2 entries + 1 retention entry.
        assert_eq!(schedule.len(), 5);
        assert!(schedule.contains_key("fetch_BTC"));
        assert!(schedule.contains_key("fetch_ETH"));
    }

    #[test]
    fn retention_entry_present_only_when_enabled() {
        let enabled = build_schedule(&config_with_assets(vec!["BTC"]));
        let prune = &enabled[tasks::PRUNE_OLD_PRICES];
        assert_eq!(prune.task, tasks::PRUNE_OLD_PRICES);
        assert_eq!(prune.interval, Duration::from_secs(3_600));
        assert!(prune.args.is_empty());

        let mut config = config_with_assets(vec!["BTC"]);
        config.retention.days = 0;
        assert!(!build_schedule(&config).contains_key(tasks::PRUNE_OLD_PRICES));
    }

    #[test]
    fn lazy_schedule_builds_once_until_invalidated() {
        let builds = Arc::new(AtomicUsize::new(0));
        let builds_factory = builds.clone();
        let lazy = LazySchedule::new(move || {
            builds_factory.fetch_add(1, Ordering::SeqCst);
            build_schedule(&config_with_assets(vec!["BTC"]))
        });

        assert_eq!(builds.load(Ordering::SeqCst), 0);
        let first = lazy.get();
        let second = lazy.get();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));

        lazy.invalidate();
        let third = lazy.get();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert_eq!(*third, *first);
    }

    #[test]
    fn lazy_schedule_sees_factory_changes_after_invalidate() {
        let symbols = Arc::new(Mutex::new(vec!["BTC"]));
        let symbols_factory = symbols.clone();
        let lazy = LazySchedule::new(move || {
            let current = symbols_factory.lock().unwrap().clone();
            build_schedule(&config_with_assets(current))
        });

        assert!(!lazy.get().contains_key("fetch_ETH"));

        symbols.lock().unwrap().push("ETH");
        // Cached table is stale until explicitly invalidated.
        assert!(!lazy.get().contains_key("fetch_ETH"));

        lazy.invalidate();
        assert!(lazy.get().contains_key("fetch_ETH"));
    }
}
