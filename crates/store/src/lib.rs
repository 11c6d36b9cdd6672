pub mod error;
pub mod models;
pub mod queries;
mod store;

pub use error::StoreError;
pub use models::{AlertEvent, Asset, Sample};
pub use queries::{PriceSummary, QueryError};
pub use store::Store;
