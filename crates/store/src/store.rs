//! SQLite-backed time-series store.
//!
//! Owns all read/write access to assets, price history, and alerts.
//! Concurrent writers rely on the `(asset_id, ts)` uniqueness constraint
//! rather than application-level locking: a duplicate insert is absorbed
//! as `inserted = false`, and a retention delete racing an insert is
//! resolved by whichever statement commits first.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::StoreError;
use crate::models::{AlertEvent, Asset, Sample};

/// Idempotent schema, applied at startup.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS assets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        name TEXT,
        alert_window_minutes INTEGER,
        alert_threshold_pct REAL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS price_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
        ts TEXT NOT NULL,
        price REAL NOT NULL,
        UNIQUE(asset_id, ts)
    )",
    "CREATE INDEX IF NOT EXISTS idx_price_history_ts ON price_history(ts)",
    "CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        asset_id INTEGER NOT NULL REFERENCES assets(id) ON DELETE CASCADE,
        triggered_at TEXT NOT NULL,
        window_minutes INTEGER NOT NULL,
        change_pct REAL NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_alerts_asset_triggered
        ON alerts(asset_id, triggered_at)",
];

/// Handle to the store. Cloning shares the underlying pool.
#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open a private in-memory database (used by tests and demos).
    ///
    /// The pool is pinned to a single connection: each SQLite `:memory:`
    /// connection is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("store schema ensured");
        Ok(())
    }

    // ── Assets ────────────────────────────────────────────────

    /// Find an asset by symbol (normalized to uppercase).
    pub async fn find_asset(&self, symbol: &str) -> Result<Option<Asset>, StoreError> {
        let sym = normalize(symbol);
        let asset = sqlx::query_as::<_, Asset>(
            "SELECT id, symbol, name, alert_window_minutes, alert_threshold_pct, created_at
             FROM assets WHERE symbol = ?",
        )
        .bind(&sym)
        .fetch_optional(&self.pool)
        .await?;
        Ok(asset)
    }

    /// Get or create the asset for `symbol`. Existing rows are returned
    /// unchanged; concurrent creators are reconciled by the symbol
    /// uniqueness constraint.
    pub async fn upsert_asset(&self, symbol: &str) -> Result<Asset, StoreError> {
        let sym = normalize(symbol);
        sqlx::query(
            "INSERT INTO assets (symbol, created_at) VALUES (?, ?)
             ON CONFLICT(symbol) DO NOTHING",
        )
        .bind(&sym)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let asset = sqlx::query_as::<_, Asset>(
            "SELECT id, symbol, name, alert_window_minutes, alert_threshold_pct, created_at
             FROM assets WHERE symbol = ?",
        )
        .bind(&sym)
        .fetch_one(&self.pool)
        .await?;
        Ok(asset)
    }

    /// Create an asset, failing with [`StoreError::AssetExists`] when the
    /// symbol is already registered.
    pub async fn create_asset(
        &self,
        symbol: &str,
        name: Option<&str>,
    ) -> Result<Asset, StoreError> {
        let sym = normalize(symbol);
        let result = sqlx::query("INSERT INTO assets (symbol, name, created_at) VALUES (?, ?, ?)")
            .bind(&sym)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::AssetExists(sym));
            }
            Err(e) => return Err(e.into()),
        }

        let asset = sqlx::query_as::<_, Asset>(
            "SELECT id, symbol, name, alert_window_minutes, alert_threshold_pct, created_at
             FROM assets WHERE symbol = ?",
        )
        .bind(&sym)
        .fetch_one(&self.pool)
        .await?;
        Ok(asset)
    }

    /// All registered assets, ordered by symbol.
    pub async fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        let assets = sqlx::query_as::<_, Asset>(
            "SELECT id, symbol, name, alert_window_minutes, alert_threshold_pct, created_at
             FROM assets ORDER BY symbol",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(assets)
    }

    /// Set or clear the per-asset alert overrides. Returns false when the
    /// symbol is unknown.
    pub async fn set_alert_overrides(
        &self,
        symbol: &str,
        window_minutes: Option<i64>,
        threshold_pct: Option<f64>,
    ) -> Result<bool, StoreError> {
        let sym = normalize(symbol);
        let result = sqlx::query(
            "UPDATE assets SET alert_window_minutes = ?, alert_threshold_pct = ?
             WHERE symbol = ?",
        )
        .bind(window_minutes)
        .bind(threshold_pct)
        .bind(&sym)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ── Samples ───────────────────────────────────────────────

    /// Append one observation. Returns false when a sample for the same
    /// `(asset, ts)` already exists; the collision is absorbed, never an
    /// error. Any other database failure propagates.
    pub async fn insert_sample(
        &self,
        asset_id: i64,
        ts: DateTime<Utc>,
        price: f64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO price_history (asset_id, ts, price) VALUES (?, ?, ?)
             ON CONFLICT(asset_id, ts) DO NOTHING",
        )
        .bind(asset_id)
        .bind(ts)
        .bind(price)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Samples for an asset, ascending by timestamp, optionally bounded
    /// to `ts >= since`.
    pub async fn samples_since(
        &self,
        asset_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Sample>, StoreError> {
        let samples = match since {
            Some(start) => {
                sqlx::query_as::<_, Sample>(
                    "SELECT id, asset_id, ts, price FROM price_history
                     WHERE asset_id = ? AND ts >= ? ORDER BY ts ASC",
                )
                .bind(asset_id)
                .bind(start)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Sample>(
                    "SELECT id, asset_id, ts, price FROM price_history
                     WHERE asset_id = ? ORDER BY ts ASC",
                )
                .bind(asset_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(samples)
    }

    /// Timestamp of the oldest stored sample for an asset, if any.
    pub async fn earliest_sample_ts(
        &self,
        asset_id: i64,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let earliest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MIN(ts) FROM price_history WHERE asset_id = ?",
        )
        .bind(asset_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(earliest)
    }

    /// Delete samples strictly older than `cutoff` across all assets.
    /// Returns the number of rows removed.
    pub async fn delete_samples_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM price_history WHERE ts < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ── Alerts ────────────────────────────────────────────────

    /// Record one threshold-crossing event.
    pub async fn insert_alert(
        &self,
        asset_id: i64,
        triggered_at: DateTime<Utc>,
        window_minutes: i64,
        change_pct: f64,
    ) -> Result<AlertEvent, StoreError> {
        let result = sqlx::query(
            "INSERT INTO alerts (asset_id, triggered_at, window_minutes, change_pct)
             VALUES (?, ?, ?, ?)",
        )
        .bind(asset_id)
        .bind(triggered_at)
        .bind(window_minutes)
        .bind(change_pct)
        .execute(&self.pool)
        .await?;

        Ok(AlertEvent {
            id: result.last_insert_rowid(),
            asset_id,
            triggered_at,
            window_minutes,
            change_pct,
        })
    }

    /// Most recent alerts for an asset, newest first.
    pub async fn recent_alerts(
        &self,
        asset_id: i64,
        limit: i64,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        let alerts = sqlx::query_as::<_, AlertEvent>(
            "SELECT id, asset_id, triggered_at, window_minutes, change_pct
             FROM alerts WHERE asset_id = ?
             ORDER BY triggered_at DESC LIMIT ?",
        )
        .bind(asset_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(alerts)
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

// ── Tests ─────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn upsert_asset_creates_then_reuses() {
        let store = Store::in_memory().await.unwrap();

        let first = store.upsert_asset(" btc ").await.unwrap();
        assert_eq!(first.symbol, "BTC");

        let second = store.upsert_asset("BTC").await.unwrap();
        assert_eq!(second.id, first.id);

        assert_eq!(store.list_assets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_asset_conflicts_on_duplicate_symbol() {
        let store = Store::in_memory().await.unwrap();

        store.create_asset("BTC", Some("Bitcoin")).await.unwrap();
        let err = store.create_asset("btc", None).await.unwrap_err();
        assert!(matches!(err, StoreError::AssetExists(ref s) if s == "BTC"));
    }

    #[tokio::test]
    async fn duplicate_sample_is_absorbed() {
        let store = Store::in_memory().await.unwrap();
        let asset = store.upsert_asset("BTC").await.unwrap();
        let ts = Utc::now();

        assert!(store.insert_sample(asset.id, ts, 100.0).await.unwrap());
        assert!(!store.insert_sample(asset.id, ts, 100.0).await.unwrap());

        let samples = store.samples_since(asset.id, None).await.unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[tokio::test]
    async fn samples_since_orders_and_filters() {
        let store = Store::in_memory().await.unwrap();
        let asset = store.upsert_asset("ETH").await.unwrap();
        let now = Utc::now();

        store.insert_sample(asset.id, now - Duration::hours(2), 90.0).await.unwrap();
        store.insert_sample(asset.id, now - Duration::minutes(5), 110.0).await.unwrap();
        store.insert_sample(asset.id, now - Duration::hours(1), 100.0).await.unwrap();

        let all = store.samples_since(asset.id, None).await.unwrap();
        assert_eq!(
            all.iter().map(|s| s.price).collect::<Vec<_>>(),
            vec![90.0, 100.0, 110.0]
        );

        let recent = store
            .samples_since(asset.id, Some(now - Duration::minutes(90)))
            .await
            .unwrap();
        assert_eq!(
            recent.iter().map(|s| s.price).collect::<Vec<_>>(),
            vec![100.0, 110.0]
        );
    }

    #[tokio::test]
    async fn earliest_sample_ts_reports_oldest() {
        let store = Store::in_memory().await.unwrap();
        let asset = store.upsert_asset("BTC").await.unwrap();

        assert!(store.earliest_sample_ts(asset.id).await.unwrap().is_none());

        let now = Utc::now();
        let oldest = now - Duration::hours(3);
        store.insert_sample(asset.id, now, 101.0).await.unwrap();
        store.insert_sample(asset.id, oldest, 100.0).await.unwrap();

        let earliest = store.earliest_sample_ts(asset.id).await.unwrap().unwrap();
        assert_eq!(earliest, oldest);
    }

    #[tokio::test]
    async fn delete_samples_before_counts_removed_rows() {
        let store = Store::in_memory().await.unwrap();
        let asset = store.upsert_asset("BTC").await.unwrap();
        let now = Utc::now();

        store.insert_sample(asset.id, now - Duration::days(31), 100.0).await.unwrap();
        store.insert_sample(asset.id, now - Duration::days(40), 101.0).await.unwrap();
        store.insert_sample(asset.id, now - Duration::days(1), 102.0).await.unwrap();

        let cutoff = now - Duration::days(30);
        assert_eq!(store.delete_samples_before(cutoff).await.unwrap(), 2);
        // Idempotent: a second sweep with the same cutoff removes nothing.
        assert_eq!(store.delete_samples_before(cutoff).await.unwrap(), 0);

        let remaining = store.samples_since(asset.id, None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].price, 102.0);
    }

    #[tokio::test]
    async fn recent_alerts_newest_first_with_limit() {
        let store = Store::in_memory().await.unwrap();
        let asset = store.upsert_asset("BTC").await.unwrap();
        let now = Utc::now();

        for i in 0..5 {
            store
                .insert_alert(asset.id, now - Duration::minutes(i), 60, 6.0 + i as f64)
                .await
                .unwrap();
        }

        let alerts = store.recent_alerts(asset.id, 3).await.unwrap();
        assert_eq!(alerts.len(), 3);
        // Newest (i = 0) first.
        assert_eq!(alerts[0].change_pct, 6.0);
        assert!(alerts[0].triggered_at > alerts[1].triggered_at);
    }

    #[tokio::test]
    async fn alert_overrides_round_trip() {
        let store = Store::in_memory().await.unwrap();
        store.upsert_asset("BTC").await.unwrap();

        assert!(store.set_alert_overrides("BTC", Some(30), Some(2.5)).await.unwrap());
        let asset = store.find_asset("BTC").await.unwrap().unwrap();
        assert_eq!(asset.alert_window_minutes, Some(30));
        assert_eq!(asset.alert_threshold_pct, Some(2.5));

        assert!(!store.set_alert_overrides("NOPE", Some(30), None).await.unwrap());
    }
}
