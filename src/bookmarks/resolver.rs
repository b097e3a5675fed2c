//! Resolves a track's recorded path through the persisted bookmark stores.

use super::codec::BookmarkCodec;
use super::store::{BookmarkSource, BookmarkStore};
use crate::reconciler::normalize_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBookmark {
    pub url: PathBuf,
    pub is_stale: bool,
    /// The bookmark now points somewhere other than the recorded path.
    pub moved_from_original: bool,
    pub source: BookmarkSource,
}

impl ResolvedBookmark {
    /// Only a fresh bookmark that still points at the recorded path is
    /// trusted. Moved files are never followed.
    pub fn is_trusted(&self) -> bool {
        !self.is_stale && !self.moved_from_original
    }
}

pub struct BookmarkResolver {
    stores: Vec<Arc<dyn BookmarkStore>>,
    codec: Arc<dyn BookmarkCodec>,
}

impl BookmarkResolver {
    /// Stores are consulted in [`BookmarkSource`] order regardless of the
    /// order given here.
    pub fn new(mut stores: Vec<Arc<dyn BookmarkStore>>, codec: Arc<dyn BookmarkCodec>) -> Self {
        stores.sort_by_key(|store| store.source());
        Self { stores, codec }
    }

    /// A resolver with no stores; every lookup is unresolved.
    pub fn empty(codec: Arc<dyn BookmarkCodec>) -> Self {
        Self::new(Vec::new(), codec)
    }

    pub fn sources(&self) -> Vec<BookmarkSource> {
        self.stores.iter().map(|s| s.source()).collect()
    }

    /// First store holding a bookmark for `original_path` that also resolves
    /// wins. A bookmark that fails to resolve falls through to the next store.
    pub fn resolve(&self, original_path: &str) -> Option<ResolvedBookmark> {
        let original = normalize_path(Path::new(original_path));

        for store in &self.stores {
            let Some(blob) = store.find_bookmark(original_path) else {
                continue;
            };
            match self.codec.resolve(&blob) {
                Ok(resolved) => {
                    let moved_from_original = normalize_path(&resolved.path) != original;
                    debug!(
                        "Resolved {} bookmark for {}: {:?} (stale: {}, moved: {})",
                        store.source(),
                        original_path,
                        resolved.path,
                        resolved.is_stale,
                        moved_from_original
                    );
                    return Some(ResolvedBookmark {
                        url: resolved.path,
                        is_stale: resolved.is_stale,
                        moved_from_original,
                        source: store.source(),
                    });
                }
                Err(e) => {
                    debug!(
                        "{} bookmark for {} did not resolve: {}",
                        store.source(),
                        original_path,
                        e
                    );
                }
            }
        }
        None
    }
}
