//! Job implementations.

pub mod alerts;
pub mod maintenance;
pub mod prices;
pub mod seed;

use std::str::FromStr;

use thiserror::Error;

use tickwatch_feed::FeedError;
use tickwatch_store::StoreError;

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid job arguments: {0}")]
    Args(String),
}

/// Positional argument that must be present.
pub(crate) fn required_arg(args: &[String], idx: usize, name: &str) -> Result<String, JobError> {
    args.get(idx)
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .ok_or_else(|| JobError::Args(format!("missing argument {idx} ({name})")))
}

/// Positional argument that may be absent; parse failures are errors.
pub(crate) fn optional_arg<T: FromStr>(
    args: &[String],
    idx: usize,
    name: &str,
) -> Result<Option<T>, JobError> {
    match args.get(idx) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| JobError::Args(format!("unparseable argument {idx} ({name}): {raw}"))),
    }
}
