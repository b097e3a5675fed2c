//! Sweep verdicts and reports.

use super::error::ReconcileError;
use super::provenance::Provenance;
use crate::identity::StableId;
use serde::Serialize;

/// Why a track was judged gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoneReason {
    /// Internal file no longer on disk.
    NotFound,
    AccessDenied,
    BookmarkStale,
    BookmarkMoved,
    ProbeFailed,
    Unresolved,
}

impl From<&ReconcileError> for GoneReason {
    fn from(error: &ReconcileError) -> Self {
        match error {
            ReconcileError::AccessDenied(_) => GoneReason::AccessDenied,
            ReconcileError::BookmarkStale(_) => GoneReason::BookmarkStale,
            ReconcileError::BookmarkMoved { .. } => GoneReason::BookmarkMoved,
            ReconcileError::ProbeFailed { .. } => GoneReason::ProbeFailed,
            ReconcileError::Unresolved(_) => GoneReason::Unresolved,
            ReconcileError::CascadeWriteFailed { .. } => {
                unreachable!("cascade failures are reported as failed removals, not verdicts")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Exists,
    Gone(GoneReason),
}

impl Existence {
    pub fn is_gone(&self) -> bool {
        matches!(self, Existence::Gone(_))
    }
}

/// Execution mode for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepMode {
    /// Verify only; nothing is deleted and no event is sent.
    DryRun,
    /// Verify, then delete what is gone.
    Actual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    Completed,
    /// Stopped between tracks; removals already committed stay committed.
    Cancelled,
    /// Another sweep held the flag; nothing was done.
    AlreadyRunning,
    /// The catalog could not be read.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoneTrack {
    pub stable_id: StableId,
    pub path: String,
    pub provenance: Provenance,
    pub reason: GoneReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRemoval {
    pub stable_id: StableId,
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub outcome: SweepOutcome,
    pub mode: SweepMode,
    pub tracks_scanned: usize,
    pub internal_tracks: usize,
    pub external_tracks: usize,
    /// Tracks judged gone, ordered by stable id.
    pub gone: Vec<GoneTrack>,
    /// Track rows deleted.
    pub removed: usize,
    pub failed: Vec<FailedRemoval>,
    pub albums_removed: usize,
    pub artists_removed: usize,
    pub favorites_removed: usize,
    pub playlist_items_removed: usize,
    /// Pre-existing orphans and dangling rows cleaned after the removals.
    pub orphans_pruned: usize,
    pub notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: i64,
}

impl SweepReport {
    pub fn new(mode: SweepMode) -> Self {
        Self {
            outcome: SweepOutcome::Completed,
            mode,
            tracks_scanned: 0,
            internal_tracks: 0,
            external_tracks: 0,
            gone: Vec::new(),
            removed: 0,
            failed: Vec::new(),
            albums_removed: 0,
            artists_removed: 0,
            favorites_removed: 0,
            playlist_items_removed: 0,
            orphans_pruned: 0,
            notified: false,
            error: None,
            duration_ms: 0,
        }
    }

    pub(crate) fn with_outcome(mut self, outcome: SweepOutcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Nothing gone and nothing left behind.
    pub fn is_clean(&self) -> bool {
        self.gone.is_empty() && self.failed.is_empty()
    }
}
