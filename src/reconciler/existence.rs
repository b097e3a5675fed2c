//! Per-track existence checks, routed by provenance.

use super::error::ReconcileError;
use super::models::{Existence, GoneReason};
use super::provenance::{Provenance, ProvenanceClassifier};
use super::scoped_access::{probe, ScopedAccessProvider, DEFAULT_PROBE_BYTES};
use crate::bookmarks::BookmarkResolver;
use crate::library_store::Track;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub struct ExistenceVerifier {
    classifier: ProvenanceClassifier,
    resolver: BookmarkResolver,
    access: Arc<dyn ScopedAccessProvider>,
    probe_bytes: usize,
}

impl ExistenceVerifier {
    pub fn new(
        classifier: ProvenanceClassifier,
        resolver: BookmarkResolver,
        access: Arc<dyn ScopedAccessProvider>,
    ) -> Self {
        Self {
            classifier,
            resolver,
            access,
            probe_bytes: DEFAULT_PROBE_BYTES,
        }
    }

    pub fn with_probe_bytes(mut self, probe_bytes: usize) -> Self {
        self.probe_bytes = probe_bytes;
        self
    }

    pub fn classifier(&self) -> &ProvenanceClassifier {
        &self.classifier
    }

    pub fn verify(&self, track: &Track) -> Existence {
        self.judge(track).1
    }

    /// Classify and verify in one go. Blocks on filesystem I/O.
    pub fn judge(&self, track: &Track) -> (Provenance, Existence) {
        let path = Path::new(&track.path);
        let provenance = self.classifier.classify(path);
        let existence = match provenance {
            Provenance::Internal => {
                if path.exists() {
                    Existence::Exists
                } else {
                    Existence::Gone(GoneReason::NotFound)
                }
            }
            Provenance::External => match self.verify_external(&track.path) {
                Ok(()) => Existence::Exists,
                Err(e) => {
                    debug!("External track {} is gone: {}", track.stable_id, e);
                    Existence::Gone(GoneReason::from(&e))
                }
            },
        };
        (provenance, existence)
    }

    fn verify_external(&self, recorded_path: &str) -> Result<(), ReconcileError> {
        // The implicit grant is often still valid; skip bookmarks if so
        if std::fs::metadata(recorded_path).is_ok() {
            return Ok(());
        }

        let resolved = self
            .resolver
            .resolve(recorded_path)
            .ok_or_else(|| ReconcileError::Unresolved(recorded_path.to_string()))?;
        if !resolved.is_trusted() {
            return Err(if resolved.is_stale {
                ReconcileError::BookmarkStale(recorded_path.to_string())
            } else {
                ReconcileError::BookmarkMoved {
                    original: recorded_path.to_string(),
                    resolved: resolved.url.display().to_string(),
                }
            });
        }
        probe(self.access.as_ref(), &resolved.url, self.probe_bytes)
    }
}
