//! Row types for the time-series store.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A tracked symbol. Created on first reference (explicit registration
/// or first successful fetch/seed) and never deleted automatically.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Asset {
    pub id: i64,
    /// Uppercase, unique.
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Per-asset alert window override; falls back to the global default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_window_minutes: Option<i64>,
    /// Per-asset alert threshold override; falls back to the global default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_threshold_pct: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// One (asset, timestamp, price) observation. Immutable once written;
/// removed only in bulk by the retention sweep.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Sample {
    pub id: i64,
    pub asset_id: i64,
    pub ts: DateTime<Utc>,
    pub price: f64,
}

/// A threshold-crossing event: the asset's price moved by at least the
/// effective threshold within the window ending at `triggered_at`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AlertEvent {
    pub id: i64,
    pub asset_id: i64,
    pub triggered_at: DateTime<Utc>,
    pub window_minutes: i64,
    /// Signed percent change over the window (first vs last sample).
    pub change_pct: f64,
}
