//! Background scheduling for the staleness sweep.

pub mod error;
pub mod sweep_job;
pub mod sweep_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sweep_job::StaleSweepJob;
pub use sweep_scheduler::{SweepJob, SweepScheduler, SweepSchedulerConfig};
