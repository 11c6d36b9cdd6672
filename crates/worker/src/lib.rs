pub mod jobs;
pub mod metrics_http;
pub mod runner;
pub mod schedule;

pub use jobs::JobError;
pub use runner::{JobContext, JobRegistry, Runner, RunnerError, RunnerHandle};
pub use schedule::{build_schedule, tasks, LazySchedule, ScheduleEntry};
