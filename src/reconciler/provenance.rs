//! Internal vs external storage classification. Pure path logic, no I/O.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Under the app's iCloud container or private Documents tree.
    Internal,
    /// Reached through a document picker or share extension grant.
    External,
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceClassifier {
    internal_roots: Vec<PathBuf>,
}

impl ProvenanceClassifier {
    pub fn new<I, P>(internal_roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            internal_roots: internal_roots
                .into_iter()
                .map(|root| normalize_path(root.as_ref()))
                .collect(),
        }
    }

    pub fn internal_roots(&self) -> &[PathBuf] {
        &self.internal_roots
    }

    pub fn classify(&self, path: &Path) -> Provenance {
        let path = normalize_path(path);
        // Component-wise prefix, so /Documents2 is not under /Documents
        if self.internal_roots.iter().any(|root| path.starts_with(root)) {
            Provenance::Internal
        } else {
            Provenance::External
        }
    }
}
