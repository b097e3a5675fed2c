use crate::identity::StableId;
use thiserror::Error;

/// Per-track failures. None of these abort a sweep: the first five mark the
/// track as gone, a failed cascade keeps the track for the next sweep.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Access to {0} was not granted")]
    AccessDenied(String),

    #[error("Bookmark for {0} is stale")]
    BookmarkStale(String),

    #[error("Bookmark for {original} now points to {resolved}")]
    BookmarkMoved { original: String, resolved: String },

    #[error("Probe of {path} failed: {reason}")]
    ProbeFailed { path: String, reason: String },

    #[error("No bookmark resolves {0}")]
    Unresolved(String),

    #[error("Removing track {stable_id} failed: {message}")]
    CascadeWriteFailed { stable_id: StableId, message: String },
}
