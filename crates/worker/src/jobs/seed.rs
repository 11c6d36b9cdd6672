//! Synthetic history seeding for demos and cold starts.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::jobs::JobError;
use crate::runner::JobContext;

/// Generated prices never drop below this floor.
const PRICE_FLOOR: f64 = 0.01;

fn baseline_for(symbol: &str) -> f64 {
    match symbol {
        "BTC" => 50_000.0,
        "ETH" => 2_000.0,
        _ => 100.0,
    }
}

/// Walk seed derived from the symbol alone, so the same symbol yields
/// the same series on every run.
fn walk_seed(symbol: &str) -> u64 {
    symbol.bytes().map(u64::from).sum()
}

/// Deterministic random walk from `start` to `end` (inclusive) at
/// `step` spacing. Each step multiplies the running price by
/// `1 + drift + noise`, with a tiny per-run drift and ±1% bounded
/// noise, clamped to a strictly positive floor.
///
/// ChaCha8 keeps the stream stable across platforms and releases, which
/// the reproducibility contract depends on.
fn generate_walk(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    base: f64,
    seed: u64,
) -> Vec<(DateTime<Utc>, f64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let drift = (rng.gen::<f64>() - 0.5) * 0.001;

    let mut points = Vec::new();
    let mut price = base;
    let mut t = start;
    while t <= end {
        let noise = (rng.gen::<f64>() - 0.5) * 0.02;
        price = (price * (1.0 + drift + noise)).max(PRICE_FLOOR);
        points.push((t, price));
        t = t + step;
    }
    points
}

/// Guarantee at least `hours` of lookback history for `symbol`.
///
/// If the earliest stored sample already reaches back to `now - hours`,
/// coverage is sufficient and nothing is written (calling twice with
/// unchanged inputs never double-inserts). Otherwise the deterministic
/// walk is generated and inserted point by point; a uniqueness collision
/// skips that point, while any other storage failure aborts the run.
/// Returns the count actually inserted.
pub async fn seed_mock_prices(
    ctx: &JobContext,
    symbol: &str,
    hours: Option<i64>,
    interval_seconds: Option<u64>,
) -> Result<u64, JobError> {
    let sym = symbol.trim().to_uppercase();
    let hours = hours.unwrap_or(ctx.config.seed.hours);
    let step_secs = interval_seconds.unwrap_or(ctx.config.seed.interval_seconds).max(1);

    let now = Utc::now();
    let start = now - Duration::hours(hours);

    let asset = ctx.store.upsert_asset(&sym).await?;
    if let Some(earliest) = ctx.store.earliest_sample_ts(asset.id).await? {
        if earliest <= start {
            debug!(symbol = %sym, hours, "coverage sufficient, seeding skipped");
            return Ok(0);
        }
    }

    let walk = generate_walk(
        start,
        now,
        Duration::seconds(step_secs as i64),
        baseline_for(&sym),
        walk_seed(&sym),
    );

    let mut inserted = 0u64;
    for (ts, price) in walk {
        if ctx.store.insert_sample(asset.id, ts, price).await? {
            inserted += 1;
        }
    }

    info!(symbol = %sym, inserted, hours, "seeded synthetic history");
    Ok(inserted)
}

// ── Tests ─────────────────────────────────────────────────────
