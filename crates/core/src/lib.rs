pub mod config;
pub mod metrics;
pub mod resolve;
pub mod window;

pub use config::{load_dotenv, WatchConfig};
pub use metrics::{MetricsSnapshot, WorkerMetrics};
pub use resolve::resolve_override;
pub use window::{parse_window, WindowError};
