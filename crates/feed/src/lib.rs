mod client;
pub mod error;

pub use client::{ChartPoint, PriceFeed, RetryPolicy};
pub use error::FeedError;
