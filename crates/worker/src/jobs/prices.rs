//! Price ingestion jobs: the periodic spot fetch and the ad hoc
//! historical backfill.

use std::time::Instant;

use chrono::{Duration, Utc};
use tracing::info;

use tickwatch_core::metrics::names;

use crate::jobs::JobError;
use crate::runner::JobContext;

/// Fetch the current price for `symbol` and append it to the store.
///
/// The asset row is auto-created on first successful fetch so samples
/// are never dropped for an unregistered symbol. Fetch duration is
/// recorded for every attempt; the success counter only moves once the
/// sample is persisted.
pub async fn fetch_price(ctx: &JobContext, symbol: &str) -> Result<f64, JobError> {
    let sym = symbol.trim().to_uppercase();

    let started = Instant::now();
    let fetched = ctx.feed.spot_price(&sym).await;
    ctx.metrics.observe(names::FETCH_DURATION, &sym, started.elapsed());

    let price = match fetched {
        Ok(price) => price,
        Err(err) => {
            ctx.metrics.incr(names::FETCH_FAILURE, &sym);
            return Err(err.into());
        }
    };

    let asset = ctx.store.upsert_asset(&sym).await?;
    ctx.store.insert_sample(asset.id, Utc::now(), price).await?;

    ctx.metrics.incr(names::FETCH_SUCCESS, &sym);
    info!(symbol = %sym, price, "stored price sample");
    Ok(price)
}

/// Backfill up to `hours` of trailing history from the upstream market
/// chart. Points that collide with existing samples are skipped; the
/// count of rows actually inserted is returned.
pub async fn backfill_prices(
    ctx: &JobContext,
    symbol: &str,
    hours: Option<i64>,
) -> Result<u64, JobError> {
    let sym = symbol.trim().to_uppercase();
    let hours = hours.unwrap_or(ctx.config.seed.hours);

    let points = ctx.feed.market_chart(&sym, Duration::hours(hours)).await?;
    let asset = ctx.store.upsert_asset(&sym).await?;

    let mut inserted = 0u64;
    for point in &points {
        if ctx.store.insert_sample(asset.id, point.ts, point.price).await? {
            inserted += 1;
        }
    }

    info!(
        symbol = %sym,
        fetched = points.len(),
        inserted,
        hours,
        "backfilled price history"
    );
    Ok(inserted)
}
