//! Upstream quote client.
//!
//! Resolves symbols to upstream identifiers through a static mapping and
//! issues GET requests with a fixed timeout. Transient failures (network
//! errors, HTTP 429, HTTP 5xx) are retried with a fixed backoff delay
//! sequence; any other error status is returned immediately. Backoff
//! sleeps happen inside the calling job's task and never stall the
//! scheduler's other entries.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FeedError;

const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Map a normalized symbol to its upstream identifier.
fn upstream_id(symbol: &str) -> Option<&'static str> {
    match symbol {
        "BTC" => Some("bitcoin"),
        "ETH" => Some("ethereum"),
        _ => None,
    }
}

// ── Retry policy ──────────────────────────────────────────────

/// Fixed delays slept between attempts after a transient failure.
/// The default gives 4 attempts max: the initial request plus one retry
/// per delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub delays: Vec<StdDuration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays: vec![
                StdDuration::from_secs(1),
                StdDuration::from_secs(2),
                StdDuration::from_secs(4),
            ],
        }
    }
}

impl RetryPolicy {
    /// Same retry count as `retries` but without delays (test aid).
    pub fn immediate(retries: usize) -> Self {
        Self {
            delays: vec![StdDuration::ZERO; retries],
        }
    }

    /// Fail on the first transient error.
    pub fn none() -> Self {
        Self { delays: Vec::new() }
    }
}

// ── Chart points ──────────────────────────────────────────────

/// One (timestamp, price) pair from the historical-range endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub ts: DateTime<Utc>,
    pub price: f64,
}

// ── Client ────────────────────────────────────────────────────

/// HTTP client for the upstream quote provider.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct PriceFeed {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl PriceFeed {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FeedError> {
        Self::with_retry(base_url, RetryPolicy::default())
    }

    pub fn with_retry(
        base_url: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, FeedError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            retry,
        })
    }

    /// Current USD price for `symbol`.
    ///
    /// An unmapped symbol fails immediately with
    /// [`FeedError::UnsupportedSymbol`] before any network traffic.
    pub async fn spot_price(&self, symbol: &str) -> Result<f64, FeedError> {
        let sym = symbol.trim().to_uppercase();
        let id = upstream_id(&sym).ok_or_else(|| FeedError::UnsupportedSymbol(sym.clone()))?;

        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, id
        );
        let body = self.get_with_retry(&url).await?;

        body[id]["usd"]
            .as_f64()
            .ok_or_else(|| FeedError::Payload(format!("missing usd price for {id}")))
    }

    /// Trailing (timestamp, price) pairs for `symbol` covering `lookback`.
    ///
    /// The upstream market-chart endpoint is day-granular, so the raw
    /// series is filtered down to points at or after `now - lookback`.
    pub async fn market_chart(
        &self,
        symbol: &str,
        lookback: Duration,
    ) -> Result<Vec<ChartPoint>, FeedError> {
        let sym = symbol.trim().to_uppercase();
        let id = upstream_id(&sym).ok_or_else(|| FeedError::UnsupportedSymbol(sym.clone()))?;

        let days = ((lookback.num_hours() + 23) / 24).max(1);
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}",
            self.base_url, id, days
        );
        let body = self.get_with_retry(&url).await?;

        let rows = body["prices"]
            .as_array()
            .ok_or_else(|| FeedError::Payload("missing prices array".to_string()))?;

        let cutoff = Utc::now() - lookback;
        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let pair = row
                .as_array()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| FeedError::Payload("malformed prices entry".to_string()))?;
            let millis = pair[0]
                .as_f64()
                .ok_or_else(|| FeedError::Payload("non-numeric timestamp".to_string()))?
                as i64;
            let price = pair[1]
                .as_f64()
                .ok_or_else(|| FeedError::Payload("non-numeric price".to_string()))?;
            let ts = Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| FeedError::Payload(format!("timestamp out of range: {millis}")))?;
            if ts >= cutoff {
                points.push(ChartPoint { ts, price });
            }
        }

        debug!(
            symbol = %sym,
            fetched = rows.len(),
            kept = points.len(),
            "market chart filtered to lookback"
        );
        Ok(points)
    }

    /// GET `url`, retrying transient failures per the policy and
    /// returning the last error once retries are exhausted.
    async fn get_with_retry(&self, url: &str) -> Result<Value, FeedError> {
        let mut attempt = 0;
        loop {
            match self.try_get(url).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retriable() && attempt < self.retry.delays.len() => {
                    let delay = self.retry.delays[attempt];
                    attempt += 1;
                    warn!(
                        url,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        error = %err,
                        "transient upstream failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_get(&self, url: &str) -> Result<Value, FeedError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::UpstreamStatus(status));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| FeedError::Payload(e.to_string()))
    }
}

// ── Tests ─────────────────────────────────────────────────────
