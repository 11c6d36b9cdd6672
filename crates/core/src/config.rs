use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Operator-style boolean: accepts 1/true/yes/on (case-insensitive).
fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Split a comma-separated symbol list, trimming and uppercasing each entry.
fn parse_assets(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

/// Full worker configuration, read once from the environment and passed
/// by value into the schedule builder and job context. There is no
/// global cached instance; callers that need to pick up changed
/// environment values re-read with [`WatchConfig::from_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Tracked symbols, normalized to uppercase.
    pub assets: Vec<String>,
    /// Cadence of the per-asset fetch (and paired alert) jobs.
    pub fetch_interval_seconds: u64,
    /// Whether the periodic schedule runs at all. Ad hoc job execution
    /// is always available regardless of this flag.
    pub enable_beat: bool,
    /// SQLite connection string for the time-series store.
    pub database_url: String,
    /// Base URL of the upstream quote API.
    pub quote_base_url: String,
    pub alert: AlertConfig,
    pub retention: RetentionConfig,
    pub seed: SeedConfig,
    pub metrics: MetricsConfig,
}

impl WatchConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            assets: parse_assets(&env_or("ASSETS", "BTC,ETH")),
            fetch_interval_seconds: env_u64("FETCH_INTERVAL_SECONDS", 300),
            enable_beat: env_flag("ENABLE_BEAT", false),
            database_url: env_or("DATABASE_URL", "sqlite://tickwatch.db"),
            quote_base_url: env_or("QUOTE_API_BASE_URL", "https://api.coingecko.com/api/v3"),
            alert: AlertConfig::from_env(),
            retention: RetentionConfig::from_env(),
            seed: SeedConfig::from_env(),
            metrics: MetricsConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  assets:     {}", self.assets.join(","));
        tracing::info!(
            "  fetch:      every {}s (beat {})",
            self.fetch_interval_seconds,
            if self.enable_beat { "enabled" } else { "disabled" }
        );
        tracing::info!("  database:   {}", self.database_url);
        tracing::info!("  quotes:     {}", self.quote_base_url);
        tracing::info!(
            "  alerts:     window={}m threshold={}%",
            self.alert.window_minutes,
            self.alert.threshold_pct
        );
        tracing::info!(
            "  retention:  {} days, swept every {}s",
            self.retention.days,
            self.retention.interval_seconds
        );
        tracing::info!(
            "  seeding:    {}h of history at {}s steps",
            self.seed.hours,
            self.seed.interval_seconds
        );
        tracing::info!(
            "  metrics:    {} (port {})",
            if self.metrics.enabled { "enabled" } else { "disabled" },
            self.metrics.port
        );
    }
}

// ── Alerts ────────────────────────────────────────────────────

/// Global alert defaults; per-asset overrides on the asset record and
/// explicit call arguments take precedence (see `resolve_override`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub window_minutes: i64,
    pub threshold_pct: f64,
}

impl AlertConfig {
    fn from_env() -> Self {
        Self {
            window_minutes: env_i64("ALERT_WINDOW_MINUTES", 60),
            threshold_pct: env_f64("ALERT_THRESHOLD_PCT", 5.0),
        }
    }
}

// ── Retention ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Maximum sample age in days. Zero or negative disables pruning.
    pub days: i64,
    pub interval_seconds: u64,
}

impl RetentionConfig {
    fn from_env() -> Self {
        Self {
            days: env_i64("RETENTION_DAYS", 30),
            interval_seconds: env_u64("RETENTION_INTERVAL_SECONDS", 86_400),
        }
    }

    pub fn enabled(&self) -> bool {
        self.days > 0
    }
}

// ── Synthetic seeding ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Lookback coverage to guarantee, in hours.
    pub hours: i64,
    /// Spacing between generated samples.
    pub interval_seconds: u64,
}

impl SeedConfig {
    fn from_env() -> Self {
        Self {
            hours: env_i64("MOCK_SEED_HOURS", 168),
            interval_seconds: env_u64("MOCK_SEED_INTERVAL_SECONDS", 300),
        }
    }
}

// ── Metrics endpoint ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl MetricsConfig {
    fn from_env() -> Self {
        Self {
            enabled: env_flag("ENABLE_WORKER_METRICS", true),
            port: env_u16("WORKER_METRICS_PORT", 8001),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_assets_trims_uppercases_and_drops_empty() {
        assert_eq!(parse_assets("BTC, eth ,  "), vec!["BTC", "ETH"]);
        assert_eq!(parse_assets(""), Vec::<String>::new());
        assert_eq!(parse_assets(" sol "), vec!["SOL"]);
    }

    #[test]
    fn env_flag_accepts_operator_spellings() {
        std::env::set_var("TW_TEST_FLAG", "YES");
        assert!(env_flag("TW_TEST_FLAG", false));
        std::env::set_var("TW_TEST_FLAG", "off");
        assert!(!env_flag("TW_TEST_FLAG", true));
        std::env::remove_var("TW_TEST_FLAG");
        assert!(env_flag("TW_TEST_FLAG", true));
        assert!(!env_flag("TW_TEST_FLAG", false));
    }

    // Defaults are asserted without touching the process environment so
    // this test cannot race other env-reading tests in the binary.
    #[test]
    fn defaults_match_documented_values() {
        let alert = AlertConfig { window_minutes: 60, threshold_pct: 5.0 };
        assert_eq!(alert.window_minutes, 60);

        let retention = RetentionConfig { days: 30, interval_seconds: 86_400 };
        assert!(retention.enabled());

        let disabled = RetentionConfig { days: 0, interval_seconds: 86_400 };
        assert!(!disabled.enabled());
        let negative = RetentionConfig { days: -3, interval_seconds: 86_400 };
        assert!(!negative.enabled());
    }
}
