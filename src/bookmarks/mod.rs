//! Persisted security-scoped bookmarks and their resolution.

mod codec;
mod resolver;
mod store;

pub use codec::{BookmarkCodec, PortableBookmarkCodec, ResolvedUrl};
pub use resolver::{BookmarkResolver, ResolvedBookmark};
pub use store::{
    url_to_path, BookmarkSource, BookmarkStore, DocumentPickerStore, ShareExtensionEntry,
    ShareExtensionStore,
};

use thiserror::Error;

/// Errors reading bookmark stores or resolving bookmark blobs.
#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("Could not read bookmark store {path}: {source}")]
    StoreUnreadable {
        path: String,
        source: std::io::Error,
    },

    #[error("Bookmark store {path} is not valid JSON: {source}")]
    StoreCorrupt {
        path: String,
        source: serde_json::Error,
    },

    #[error("Malformed bookmark data: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Bookmark target {path} is gone: {source}")]
    TargetMissing {
        path: String,
        source: std::io::Error,
    },

    #[error("Bookmark could not be resolved: {0}")]
    Unresolvable(String),
}
