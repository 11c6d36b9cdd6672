//! Query surface consumed by the web layer.
//!
//! Unknown symbols are tolerated as empty results inside the worker's
//! jobs, but at this externally-facing boundary "asset not found" and
//! "malformed window" are distinct, reportable conditions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use tickwatch_core::window::{parse_window, WindowError};

use crate::error::StoreError;
use crate::models::{AlertEvent, Asset, Sample};
use crate::store::Store;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("asset already exists: {0}")]
    Conflict(String),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AssetExists(symbol) => QueryError::Conflict(symbol),
            other => QueryError::Store(other),
        }
    }
}

/// Aggregates over a trailing window. All aggregate fields are `None`
/// when no samples fall inside the window.
#[derive(Debug, Clone, Serialize)]
pub struct PriceSummary {
    pub points: u64,
    pub first: Option<f64>,
    pub last: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
}

/// Resolve a window expression ("24h", "30", ...) to its start instant.
///
/// Malformed input surfaces the dedicated [`WindowError`] so the web
/// layer can map it to a bad-request response unambiguously.
pub fn since_from_window(window: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, QueryError> {
    let span = parse_window(window)?;
    Ok(now - span)
}

/// Samples for `symbol`, ascending by timestamp, optionally bounded below.
pub async fn list_recent_samples(
    store: &Store,
    symbol: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<Sample>, QueryError> {
    let asset = require_asset(store, symbol).await?;
    Ok(store.samples_since(asset.id, since).await?)
}

/// Count/first/last/min/max/avg over samples with `ts >= since`.
pub async fn summarize(
    store: &Store,
    symbol: &str,
    since: DateTime<Utc>,
) -> Result<PriceSummary, QueryError> {
    let asset = require_asset(store, symbol).await?;
    let samples = store.samples_since(asset.id, Some(since)).await?;

    if samples.is_empty() {
        return Ok(PriceSummary {
            points: 0,
            first: None,
            last: None,
            min: None,
            max: None,
            avg: None,
        });
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for sample in &samples {
        min = min.min(sample.price);
        max = max.max(sample.price);
        sum += sample.price;
    }

    Ok(PriceSummary {
        points: samples.len() as u64,
        first: samples.first().map(|s| s.price),
        last: samples.last().map(|s| s.price),
        min: Some(min),
        max: Some(max),
        avg: Some(sum / samples.len() as f64),
    })
}

/// Most recent alerts for `symbol`, newest first, capped at `limit`.
pub async fn list_recent_alerts(
    store: &Store,
    symbol: &str,
    limit: i64,
) -> Result<Vec<AlertEvent>, QueryError> {
    let asset = require_asset(store, symbol).await?;
    Ok(store.recent_alerts(asset.id, limit).await?)
}

/// Register a new asset. A duplicate symbol is the distinct
/// [`QueryError::Conflict`].
pub async fn create_asset(
    store: &Store,
    symbol: &str,
    name: Option<&str>,
) -> Result<Asset, QueryError> {
    Ok(store.create_asset(symbol, name).await?)
}

async fn require_asset(store: &Store, symbol: &str) -> Result<Asset, QueryError> {
    store
        .find_asset(symbol)
        .await?
        .ok_or_else(|| QueryError::AssetNotFound(symbol.trim().to_uppercase()))
}
