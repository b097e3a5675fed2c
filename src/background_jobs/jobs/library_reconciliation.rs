//! Library reconciliation background job.
//!
//! Sweeps the catalog on an interval and whenever the host signals startup,
//! foreground or a manual sync.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule, ShutdownBehavior},
};
use crate::reconciler::{CatalogReconciler, SweepMode, SweepOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct LibraryReconciliationJob {
    reconciler: Arc<CatalogReconciler>,
    interval: Option<Duration>,
    run_on_startup: bool,
}

impl LibraryReconciliationJob {
    /// `interval` of `None` disables periodic sweeps; hooks still apply.
    pub fn new(
        reconciler: Arc<CatalogReconciler>,
        interval: Option<Duration>,
        run_on_startup: bool,
    ) -> Self {
        Self {
            reconciler,
            interval,
            run_on_startup,
        }
    }
}

#[async_trait]
impl BackgroundJob for LibraryReconciliationJob {
    fn id(&self) -> &'static str {
        "library_reconciliation"
    }

    fn name(&self) -> &'static str {
        "Library Reconciliation"
    }

    fn description(&self) -> &'static str {
        "Verify every cataloged track is still reachable and remove the ones that are gone"
    }

    fn schedule(&self) -> JobSchedule {
        let mut hooks = vec![HookEvent::OnForeground, HookEvent::ManualSync];
        if self.run_on_startup {
            hooks.insert(0, HookEvent::OnStartup);
        }
        JobSchedule::Combined {
            interval: self.interval,
            hooks,
        }
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        // Cancellation is honored between tracks, never mid-cascade
        ShutdownBehavior::Cancellable
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let report = self
            .reconciler
            .sweep_with(SweepMode::Actual, &ctx.cancellation_token)
            .await;

        match report.outcome {
            SweepOutcome::Completed => {
                if report.is_clean() {
                    info!("Library reconciliation passed - every track is reachable");
                } else {
                    info!(
                        "Library reconciliation removed {} of {} gone tracks ({} failed)",
                        report.removed,
                        report.gone.len(),
                        report.failed.len()
                    );
                }
                Ok(())
            }
            SweepOutcome::AlreadyRunning => {
                info!("Library reconciliation skipped, a sweep is already running");
                Ok(())
            }
            SweepOutcome::Cancelled => Err(JobError::Cancelled),
            SweepOutcome::Failed => Err(JobError::Failed(
                report.error.unwrap_or_else(|| "sweep failed".to_string()),
            )),
        }
    }
}
