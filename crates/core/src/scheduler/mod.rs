//! Job scheduler.
//!
//! Jobs move through `pending -> running -> done | error | cancelled`:
//! - **Scheduling**: one pending job per type at a time, created when the
//!   type's cadence has elapsed since its last job
//! - **Execution**: pending jobs run one after another, each with its own
//!   cancellation token
//! - **Pruning**: old history is deleted, keeping the latest jobs per type

mod config;
mod executors;
mod runner;
mod running;
mod types;

pub use config::{CleanupConfig, SchedulerConfig};
pub use executors::ReconcileExecutor;
pub use runner::JobScheduler;
pub use types::{executor_fn, JobExecutor, SchedulerError};
