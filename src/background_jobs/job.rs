use super::context::JobContext;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// When a job runs.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    /// Every `Duration`, first run one interval after registration.
    Interval(Duration),
    /// Only when the host fires the event.
    Hook(HookEvent),
    /// Both; `interval: None` means hooks only.
    Combined {
        interval: Option<Duration>,
        hooks: Vec<HookEvent>,
    },
}

impl JobSchedule {
    pub fn interval(&self) -> Option<Duration> {
        match self {
            JobSchedule::Interval(interval) => Some(*interval),
            JobSchedule::Combined { interval, .. } => *interval,
            JobSchedule::Hook(_) => None,
        }
    }

    pub fn listens_to(&self, event: HookEvent) -> bool {
        match self {
            JobSchedule::Hook(hook) => *hook == event,
            JobSchedule::Combined { hooks, .. } => hooks.contains(&event),
            JobSchedule::Interval(_) => false,
        }
    }
}

/// Host lifecycle events that can start a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Fired once when the scheduler starts.
    OnStartup,
    /// The app came back to the foreground.
    OnForeground,
    /// The user asked for a sync.
    ManualSync,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::OnStartup => "on_startup",
            HookEvent::OnForeground => "on_foreground",
            HookEvent::ManualSync => "manual_sync",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What shutdown does with a job that is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownBehavior {
    /// Cancel its token, then wait for it to return.
    #[default]
    Cancellable,
    /// Leave its token alone and wait for it to finish.
    WaitForCompletion,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("job was cancelled")]
    Cancelled,

    #[error("job failed: {0}")]
    Failed(String),
}

/// A unit of work the scheduler can start.
///
/// Each run gets its own task and its own child cancellation token; work
/// that takes long should poll [`JobContext::is_cancelled`].
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
