use super::context::JobContext;
use super::handle::{JobEntry, JobRun, JobRunStatus, JobTrigger, SchedulerHandle, SchedulerState};
use super::job::{BackgroundJob, HookEvent, JobError, ShutdownBehavior};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest the scheduler sleeps before re-checking schedules.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// How long shutdown waits for each running job.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

const HOOK_CHANNEL_CAPACITY: usize = 32;

fn next_run_after(interval: Duration) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::from_std(interval).unwrap_or_default()
}

struct RunningJob {
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Starts jobs on their interval and on hook events, one run per job at a
/// time.
pub struct JobScheduler {
    state: SchedulerState,
    running: HashMap<&'static str, RunningJob>,
    hook_rx: mpsc::Receiver<HookEvent>,
    shutdown_token: CancellationToken,
    job_context: JobContext,
    /// Signalled by each run as it ends, so an overdue job is started
    /// without waiting out the idle check.
    run_finished: Arc<Notify>,
}

impl JobScheduler {
    /// Registers a job. Interval jobs first run one interval from now; use a
    /// startup hook to run right away.
    pub async fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        info!("Registering job: {} - {}", job.id(), job.description());
        let next_run = job.schedule().interval().map(next_run_after);
        self.state.write().await.insert(
            job.id(),
            JobEntry {
                job,
                running: false,
                last_run: None,
                next_run,
            },
        );
    }

    pub async fn job_count(&self) -> usize {
        self.state.read().await.len()
    }

    /// Main loop. Returns once the shutdown token is cancelled and running
    /// jobs have been dealt with.
    pub async fn run(&mut self) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.job_count().await
        );
        self.on_hook(HookEvent::OnStartup).await;

        loop {
            self.reap_finished();
            let sleep_for = self.until_next_due().await;
            debug!("Scheduler sleeping for {:?}", sleep_for);

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => self.start_due().await,
                _ = self.run_finished.notified() => self.start_due().await,
                Some(event) = self.hook_rx.recv() => {
                    debug!("Received hook event: {}", event);
                    self.on_hook(event).await;
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    async fn until_next_due(&self) -> Duration {
        let now = Utc::now();
        let state = self.state.read().await;
        state
            .values()
            // A running job wakes the loop through `run_finished`
            .filter(|entry| !entry.running)
            .filter_map(|entry| entry.next_run)
            .map(|next_run| (next_run - now).to_std().unwrap_or(Duration::ZERO))
            .fold(IDLE_CHECK_INTERVAL, Duration::min)
    }

    async fn start_due(&mut self) {
        let now = Utc::now();
        let due: Vec<&'static str> = {
            let state = self.state.read().await;
            state
                .iter()
                .filter(|(_, entry)| !entry.running)
                .filter(|(_, entry)| entry.next_run.is_some_and(|at| at <= now))
                .map(|(id, _)| *id)
                .collect()
        };
        for job_id in due {
            self.start(job_id, JobTrigger::Schedule).await;
        }
    }

    async fn on_hook(&mut self, event: HookEvent) {
        let listeners: Vec<&'static str> = {
            let state = self.state.read().await;
            state
                .iter()
                .filter(|(_, entry)| entry.job.schedule().listens_to(event))
                .filter(|(id, entry)| {
                    if entry.running {
                        debug!("Job {} already running, ignoring {}", id, event);
                    }
                    !entry.running
                })
                .map(|(id, _)| *id)
                .collect()
        };
        for job_id in listeners {
            self.start(job_id, JobTrigger::Hook(event)).await;
        }
    }

    async fn start(&mut self, job_id: &'static str, trigger: JobTrigger) {
        let job = {
            let mut state = self.state.write().await;
            let Some(entry) = state.get_mut(job_id) else {
                error!("Attempted to start unknown job: {}", job_id);
                return;
            };
            entry.running = true;
            // Scheduled from the start of this run, so a slow run is not
            // immediately due again
            entry.next_run = entry.job.schedule().interval().map(next_run_after);
            entry.job.clone()
        };

        info!("Starting job: {} ({})", job_id, trigger);
        let ctx = self.job_context.child();
        let cancel = ctx.cancellation_token.clone();
        let state = Arc::clone(&self.state);
        let run_finished = Arc::clone(&self.run_finished);

        let task = tokio::spawn(async move {
            let started_at = Utc::now();
            let clock = Instant::now();
            // Separate task so a panicking job is recorded, not lost
            let result = tokio::spawn(async move { job.execute(&ctx).await }).await;
            let elapsed = clock.elapsed();

            let (status, error) = match result {
                Ok(Ok(())) => {
                    info!("Job {} completed in {:?}", job_id, elapsed);
                    (JobRunStatus::Completed, None)
                }
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id, elapsed);
                    (JobRunStatus::Cancelled, None)
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {}", job_id, elapsed, e);
                    (JobRunStatus::Failed, Some(e.to_string()))
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", job_id, elapsed, e);
                    (JobRunStatus::Failed, Some(format!("panicked: {}", e)))
                }
            };

            if let Some(entry) = state.write().await.get_mut(job_id) {
                entry.running = false;
                entry.last_run = Some(JobRun {
                    trigger,
                    started_at,
                    finished_at: Utc::now(),
                    status,
                    error,
                });
            }
            run_finished.notify_one();
        });

        self.running.insert(job_id, RunningJob { task, cancel });
    }

    fn reap_finished(&mut self) {
        self.running.retain(|_, job| !job.task.is_finished());
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        {
            let state = self.state.read().await;
            for (job_id, running) in &self.running {
                let behavior = state
                    .get(job_id)
                    .map(|entry| entry.job.shutdown_behavior())
                    .unwrap_or_default();
                if behavior == ShutdownBehavior::Cancellable {
                    debug!("Cancelling job: {}", job_id);
                    running.cancel.cancel();
                }
            }
        }

        for (job_id, running) in self.running.drain() {
            if tokio::time::timeout(SHUTDOWN_GRACE, running.task)
                .await
                .is_err()
            {
                warn!("Job {} did not finish within {:?}", job_id, SHUTDOWN_GRACE);
            }
        }

        info!("Scheduler shutdown complete");
    }
}

/// Create a scheduler and a handle to talk to it.
///
/// Every job run gets a child of `job_context`'s token; cancelling
/// `shutdown_token` stops the loop.
pub fn create_scheduler(
    shutdown_token: CancellationToken,
    job_context: JobContext,
) -> (JobScheduler, SchedulerHandle) {
    let (hook_tx, hook_rx) = mpsc::channel(HOOK_CHANNEL_CAPACITY);
    let state: SchedulerState = Arc::new(RwLock::new(HashMap::new()));

    let scheduler = JobScheduler {
        state: Arc::clone(&state),
        running: HashMap::new(),
        hook_rx,
        shutdown_token,
        job_context,
        run_finished: Arc::new(Notify::new()),
    };
    (scheduler, SchedulerHandle::new(hook_tx, state))
}
