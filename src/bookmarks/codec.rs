//! Bookmark blob resolution.

use super::BookmarkError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Location a bookmark blob resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub path: PathBuf,
    /// The platform could still locate the target but the bookmark data is
    /// outdated and should not be trusted.
    pub is_stale: bool,
}

/// Turns an opaque bookmark blob back into a location.
pub trait BookmarkCodec: Send + Sync {
    fn resolve(&self, blob: &[u8]) -> Result<ResolvedUrl, BookmarkError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PortableBookmark {
    path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<u64>,
}

/// Bookmark format used where the platform offers no native bookmarks.
///
/// The blob is JSON holding the target path and, on Unix, the inode it had
/// when the bookmark was created. A different inode at the same path means
/// the file was replaced, which is reported as stale.
#[derive(Debug, Default, Clone, Copy)]
pub struct PortableBookmarkCodec;

#[cfg(unix)]
fn file_id(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

impl PortableBookmarkCodec {
    /// Create a bookmark for an existing file.
    pub fn create(path: &Path) -> Result<Vec<u8>, BookmarkError> {
        let metadata = std::fs::metadata(path).map_err(|e| BookmarkError::TargetMissing {
            path: path.display().to_string(),
            source: e,
        })?;
        let bookmark = PortableBookmark {
            path: path.to_path_buf(),
            file_id: file_id(&metadata),
        };
        serde_json::to_vec(&bookmark).map_err(BookmarkError::Malformed)
    }
}

impl BookmarkCodec for PortableBookmarkCodec {
    fn resolve(&self, blob: &[u8]) -> Result<ResolvedUrl, BookmarkError> {
        let bookmark: PortableBookmark =
            serde_json::from_slice(blob).map_err(BookmarkError::Malformed)?;
        let metadata =
            std::fs::metadata(&bookmark.path).map_err(|e| BookmarkError::TargetMissing {
                path: bookmark.path.display().to_string(),
                source: e,
            })?;

        let is_stale = match (bookmark.file_id, file_id(&metadata)) {
            (Some(recorded), Some(current)) => recorded != current,
            _ => false,
        };
        Ok(ResolvedUrl {
            path: bookmark.path,
            is_stale,
        })
    }
}
