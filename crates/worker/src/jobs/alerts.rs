//! Sliding-window alert evaluation.

use std::time::Instant;

use chrono::{Duration, Utc};
use tracing::info;

use tickwatch_core::metrics::names;
use tickwatch_core::resolve_override;

use crate::jobs::JobError;
use crate::runner::JobContext;

/// Evaluate the trailing window for `symbol` and emit at most one alert.
///
/// Effective window/threshold resolve as: explicit argument, then the
/// asset's stored override, then the global default. The change is
/// measured between the first and last samples inside the window -- an
/// intra-window spike that retraces before the latest sample does not
/// trigger. Returns the number of alerts created (0 or 1).
///
/// Defined no-alert cases, none of which are errors: unknown symbol,
/// fewer than two in-window samples, zero baseline price.
pub async fn compute_alerts(
    ctx: &JobContext,
    symbol: &str,
    window_minutes: Option<i64>,
    threshold_pct: Option<f64>,
) -> Result<u32, JobError> {
    let sym = symbol.trim().to_uppercase();

    let started = Instant::now();
    let result = evaluate(ctx, &sym, window_minutes, threshold_pct).await;
    ctx.metrics.observe(names::ALERT_COMPUTE, &sym, started.elapsed());
    result
}

async fn evaluate(
    ctx: &JobContext,
    sym: &str,
    window_minutes: Option<i64>,
    threshold_pct: Option<f64>,
) -> Result<u32, JobError> {
    let Some(asset) = ctx.store.find_asset(sym).await? else {
        return Ok(0);
    };

    let window = resolve_override(
        window_minutes,
        asset.alert_window_minutes,
        ctx.config.alert.window_minutes,
    );
    let threshold = resolve_override(
        threshold_pct,
        asset.alert_threshold_pct,
        ctx.config.alert.threshold_pct,
    );

    let now = Utc::now();
    let samples = ctx
        .store
        .samples_since(asset.id, Some(now - Duration::minutes(window)))
        .await?;

    // A single point carries no rate of change.
    if samples.len() < 2 {
        return Ok(0);
    }

    let baseline = &samples[0];
    let current = &samples[samples.len() - 1];
    if baseline.price == 0.0 {
        return Ok(0);
    }

    let change_pct = (current.price - baseline.price) / baseline.price * 100.0;
    if change_pct.abs() >= threshold {
        ctx.store
            .insert_alert(asset.id, now, window, change_pct)
            .await?;
        ctx.metrics.incr(names::ALERTS_TOTAL, sym);
        info!(
            symbol = %sym,
            change_pct,
            window_minutes = window,
            threshold_pct = threshold,
            "alert emitted"
        );
        return Ok(1);
    }

    Ok(0)
}
