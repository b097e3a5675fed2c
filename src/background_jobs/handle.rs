use super::job::{BackgroundJob, HookEvent, JobError};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobTrigger {
    Schedule,
    Hook(HookEvent),
}

impl fmt::Display for JobTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTrigger::Schedule => f.write_str("schedule"),
            JobTrigger::Hook(event) => write!(f, "hook:{}", event),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// The most recent finished run of a job.
#[derive(Debug, Clone)]
pub struct JobRun {
    pub trigger: JobTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: JobRunStatus,
    pub error: Option<String>,
}

/// Snapshot of one registered job.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub id: &'static str,
    pub name: &'static str,
    pub running: bool,
    pub last_run: Option<JobRun>,
    pub next_run_at: Option<DateTime<Utc>>,
}

pub(crate) struct JobEntry {
    pub job: Arc<dyn BackgroundJob>,
    pub running: bool,
    pub last_run: Option<JobRun>,
    /// Only set for jobs with an interval.
    pub next_run: Option<DateTime<Utc>>,
}

impl JobEntry {
    fn status(&self) -> JobStatus {
        JobStatus {
            id: self.job.id(),
            name: self.job.name(),
            running: self.running,
            last_run: self.last_run.clone(),
            next_run_at: self.next_run,
        }
    }
}

/// Job table shared by the scheduler loop and its handles, keyed by job id.
pub(crate) type SchedulerState = Arc<RwLock<HashMap<&'static str, JobEntry>>>;

/// Cheap, cloneable access to a running [`super::JobScheduler`].
#[derive(Clone)]
pub struct SchedulerHandle {
    hook_tx: mpsc::Sender<HookEvent>,
    state: SchedulerState,
}

impl SchedulerHandle {
    pub(crate) fn new(hook_tx: mpsc::Sender<HookEvent>, state: SchedulerState) -> Self {
        Self { hook_tx, state }
    }

    /// Fire a hook; listening jobs start unless already running.
    pub async fn send_hook(&self, event: HookEvent) -> Result<(), JobError> {
        self.hook_tx
            .send(event)
            .await
            .map_err(|_| JobError::Failed("scheduler is not running".to_string()))
    }

    /// Every registered job, sorted by id.
    pub async fn jobs(&self) -> Vec<JobStatus> {
        let state = self.state.read().await;
        let mut jobs: Vec<JobStatus> = state.values().map(JobEntry::status).collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    pub async fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.state.read().await.get(job_id).map(JobEntry::status)
    }
}
