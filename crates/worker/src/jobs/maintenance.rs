//! Retention sweep.

use chrono::{Duration, Utc};
use tracing::{debug, info};

use crate::jobs::JobError;
use crate::runner::JobContext;

/// Delete samples older than the retention horizon across all assets.
///
/// Effective horizon = explicit argument or the configured default. A
/// horizon of zero or less is an explicit opt-out: the sweep returns 0
/// without touching storage. Returns the number of rows removed.
pub async fn prune_old_prices(
    ctx: &JobContext,
    retention_days: Option<i64>,
) -> Result<u64, JobError> {
    let days = retention_days.unwrap_or(ctx.config.retention.days);
    if days <= 0 {
        debug!(retention_days = days, "retention disabled, nothing pruned");
        return Ok(0);
    }

    let cutoff = Utc::now() - Duration::days(days);
    let removed = ctx.store.delete_samples_before(cutoff).await?;
    if removed > 0 {
        info!(removed, retention_days = days, "pruned expired samples");
    }
    Ok(removed)
}
