//! Reconciliation sweeps.
//!
//! A sweep reads every track, verifies them with bounded concurrency, and
//! only once every verdict is in removes the gone tracks one cascade at a
//! time under the catalog write gate. Observers get one notification per
//! sweep that changed anything.

use super::error::ReconcileError;
use super::events::CatalogEvents;
use super::existence::ExistenceVerifier;
use super::models::{Existence, FailedRemoval, GoneTrack, SweepMode, SweepOutcome, SweepReport};
use super::provenance::Provenance;
use crate::identity::StableId;
use crate::library_store::{LibraryStore, Track};
use anyhow::{anyhow, Result};
use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 4;

#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Upper bound on existence checks in flight during scanning.
    pub max_concurrent_checks: usize,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
        }
    }
}

/// Serializes catalog mutations. Anything else writing tracks (the importer)
/// must hold the same gate.
pub type CatalogWriteGate = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SweepPhase {
    Idle,
    Scanning,
    Collecting,
    CascadeDeleting,
}

/// Puts the reconciler back to [`SweepPhase::Idle`] when a sweep ends,
/// however it ends.
struct BackToIdle<'a>(&'a CatalogReconciler);

impl Drop for BackToIdle<'_> {
    fn drop(&mut self) {
        self.0.set_phase(SweepPhase::Idle);
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("Catalog task did not complete: {}", e))?
}

pub struct CatalogReconciler {
    store: Arc<dyn LibraryStore>,
    verifier: Arc<ExistenceVerifier>,
    events: CatalogEvents,
    settings: ReconcilerSettings,
    write_gate: CatalogWriteGate,
    /// Held for a whole sweep or user removal; sweeps never queue on it.
    run_slot: tokio::sync::Mutex<()>,
    phase: Mutex<SweepPhase>,
}

impl CatalogReconciler {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        verifier: Arc<ExistenceVerifier>,
        events: CatalogEvents,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            store,
            verifier,
            events,
            settings,
            write_gate: Arc::new(tokio::sync::Mutex::new(())),
            run_slot: tokio::sync::Mutex::new(()),
            phase: Mutex::new(SweepPhase::Idle),
        }
    }

    /// Share an existing write gate instead of a private one.
    pub fn with_write_gate(mut self, write_gate: CatalogWriteGate) -> Self {
        self.write_gate = write_gate;
        self
    }

    pub fn write_gate(&self) -> CatalogWriteGate {
        self.write_gate.clone()
    }

    pub fn events(&self) -> &CatalogEvents {
        &self.events
    }

    pub fn is_sweeping(&self) -> bool {
        self.phase
            .lock()
            .map(|phase| *phase != SweepPhase::Idle)
            .unwrap_or(false)
    }

    fn set_phase(&self, phase: SweepPhase) {
        if let Ok(mut current) = self.phase.lock() {
            debug!("Sweep phase {:?} -> {:?}", *current, phase);
            *current = phase;
        }
    }

    /// Run one full sweep. A call made while another sweep is in progress
    /// returns immediately with [`SweepOutcome::AlreadyRunning`].
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_with(SweepMode::Actual, &CancellationToken::new()).await
    }

    /// Run a sweep in the given mode. Cancellation is honored between tracks,
    /// never inside a single track's cascade.
    pub async fn sweep_with(&self, mode: SweepMode, cancel: &CancellationToken) -> SweepReport {
        let Ok(_slot) = self.run_slot.try_lock() else {
            info!("Reconciliation sweep already in progress, skipping");
            return SweepReport::new(mode).with_outcome(SweepOutcome::AlreadyRunning);
        };
        let _idle = BackToIdle(self);
        let start = Instant::now();
        info!("Starting reconciliation sweep in {:?} mode", mode);

        let mut report = SweepReport::new(mode);
        if let Err(e) = self.run_sweep(mode, cancel, &mut report).await {
            error!("Reconciliation sweep failed: {:#}", e);
            report.outcome = SweepOutcome::Failed;
            report.error = Some(format!("{:#}", e));
        }
        report.duration_ms = start.elapsed().as_millis() as i64;

        info!(
            "Reconciliation sweep {:?}: scanned {} tracks, {} gone, {} removed, {} failed, {} albums and {} artists removed in {}ms",
            report.outcome,
            report.tracks_scanned,
            report.gone.len(),
            report.removed,
            report.failed.len(),
            report.albums_removed,
            report.artists_removed,
            report.duration_ms
        );
        report
    }

    /// User-initiated removal. Runs the same cascade, gate and notification
    /// as a sweep. If a sweep is running, waits for it to finish first.
    pub async fn remove_tracks(&self, stable_ids: &[StableId]) -> SweepReport {
        if self.is_sweeping() {
            info!(
                "Reconciliation sweep in progress, removing {} tracks after it",
                stable_ids.len()
            );
        }
        let _slot = self.run_slot.lock().await;
        let start = Instant::now();
        let mut report = SweepReport::new(SweepMode::Actual);

        let mut targets = Vec::with_capacity(stable_ids.len());
        for stable_id in stable_ids {
            let store = self.store.clone();
            let id = stable_id.clone();
            let path = match run_blocking(move || store.get_track(&id)).await {
                Ok(track) => track.map(|t| t.path).unwrap_or_default(),
                Err(e) => {
                    warn!("Could not look up track {}: {:#}", stable_id, e);
                    String::new()
                }
            };
            targets.push((stable_id.clone(), path));
        }

        self.apply_removals(targets, &CancellationToken::new(), &mut report)
            .await;
        report.duration_ms = start.elapsed().as_millis() as i64;
        report
    }

    async fn run_sweep(
        &self,
        mode: SweepMode,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) -> Result<()> {
        self.set_phase(SweepPhase::Scanning);
        let store = self.store.clone();
        let tracks = run_blocking(move || store.list_tracks()).await?;
        let total = tracks.len();

        for (track, provenance, existence) in self.scan(tracks, cancel).await {
            report.tracks_scanned += 1;
            match provenance {
                Provenance::Internal => report.internal_tracks += 1,
                Provenance::External => report.external_tracks += 1,
            }
            if let Existence::Gone(reason) = existence {
                report.gone.push(GoneTrack {
                    stable_id: track.stable_id,
                    path: track.path,
                    provenance,
                    reason,
                });
            }
        }
        report.gone.sort_by(|a, b| a.stable_id.cmp(&b.stable_id));

        if cancel.is_cancelled() {
            info!(
                "Sweep cancelled while scanning, {} of {} tracks verified, nothing removed",
                report.tracks_scanned, total
            );
            report.outcome = SweepOutcome::Cancelled;
            return Ok(());
        }

        info!(
            "Sweep found {} of {} tracks gone ({} internal, {} external checked)",
            report.gone.len(),
            total,
            report.internal_tracks,
            report.external_tracks
        );

        if mode == SweepMode::DryRun {
            if !report.gone.is_empty() {
                info!("Dry-run mode: would remove {} tracks", report.gone.len());
            }
            return Ok(());
        }

        self.set_phase(SweepPhase::Collecting);
        let targets = report
            .gone
            .iter()
            .map(|gone| (gone.stable_id.clone(), gone.path.clone()))
            .collect();
        self.set_phase(SweepPhase::CascadeDeleting);
        self.apply_removals(targets, cancel, report).await;
        Ok(())
    }

    async fn scan(
        &self,
        tracks: Vec<Track>,
        cancel: &CancellationToken,
    ) -> Vec<(Track, Provenance, Existence)> {
        debug!(
            "Verifying {} tracks, at most {} at a time",
            tracks.len(),
            self.settings.max_concurrent_checks
        );
        stream::iter(tracks)
            .map(|track| {
                let verifier = self.verifier.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    let stable_id = track.stable_id.clone();
                    let verdict = tokio::task::spawn_blocking(move || {
                        let (provenance, existence) = verifier.judge(&track);
                        (track, provenance, existence)
                    })
                    .await;
                    match verdict {
                        Ok(verdict) => {
                            debug!("Track {} is {:?} ({:?})", stable_id, verdict.2, verdict.1);
                            Some(verdict)
                        }
                        Err(e) => {
                            warn!("Existence check for {} did not complete: {}", stable_id, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.settings.max_concurrent_checks.max(1))
            .filter_map(futures::future::ready)
            .collect()
            .await
    }

    /// Cascade-delete `targets` one at a time under the write gate, prune
    /// leftovers, and notify once if anything changed.
    async fn apply_removals(
        &self,
        targets: Vec<(StableId, String)>,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) {
        let _gate = self.write_gate.lock().await;

        let total = targets.len();
        let mut changed = false;
        for (index, (stable_id, path)) in targets.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(
                    "Sweep cancelled with {} of {} removals left",
                    total - index,
                    total
                );
                report.outcome = SweepOutcome::Cancelled;
                break;
            }

            let store = self.store.clone();
            let id = stable_id.clone();
            match run_blocking(move || store.delete_track_cascade(&id)).await {
                Ok(outcome) => {
                    debug!(
                        "Removed track {} ({}): {} favorites, {} playlist items, album removed: {:?}, artists removed: {:?}",
                        stable_id,
                        path,
                        outcome.favorites_removed,
                        outcome.playlist_items_removed,
                        outcome.album_removed,
                        outcome.artists_removed
                    );
                    if outcome.track_deleted {
                        report.removed += 1;
                    }
                    report.favorites_removed += outcome.favorites_removed;
                    report.playlist_items_removed += outcome.playlist_items_removed;
                    if outcome.album_removed.is_some() {
                        report.albums_removed += 1;
                    }
                    report.artists_removed += outcome.artists_removed.len();
                    changed |= outcome.changed_anything();
                }
                Err(e) => {
                    let failure = ReconcileError::CascadeWriteFailed {
                        stable_id: stable_id.clone(),
                        message: format!("{:#}", e),
                    };
                    warn!("{}, keeping it until the next sweep", failure);
                    report.failed.push(FailedRemoval {
                        stable_id,
                        path,
                        error: failure.to_string(),
                    });
                }
            }
        }

        if report.outcome != SweepOutcome::Cancelled {
            let store = self.store.clone();
            match run_blocking(move || store.prune_orphans()).await {
                Ok(pruned) if !pruned.is_clean() => {
                    info!("Pruned {} orphaned or dangling catalog rows", pruned.total());
                    report.orphans_pruned = pruned.total();
                    changed = true;
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to prune orphaned catalog rows: {:#}", e),
            }
        }

        if changed {
            let receivers = self.events.notify_catalog_changed();
            debug!("Catalog change sent to {} observers", receivers);
            report.notified = true;
        }
    }
}
