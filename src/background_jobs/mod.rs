//! Background job scheduling and execution.
//!
//! The reconciler never decides when to run; this module is the external
//! scheduler that triggers sweeps on an interval and on host events.

mod context;
mod handle;
mod job;
pub mod jobs;
mod scheduler;

pub use context::JobContext;
pub use handle::{JobRun, JobRunStatus, JobStatus, JobTrigger, SchedulerHandle};
pub use job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::{create_scheduler, JobScheduler};
