//! Persisted bookmark stores.
//!
//! Both stores are written by the importer and the share extension; this
//! crate only reads them. They are caches: a missing, unreadable or corrupt
//! file degrades to an empty store and never fails a sweep.

use super::BookmarkError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Where a bookmark was captured. Variants are declared in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkSource {
    DocumentPicker,
    ShareExtension,
}

impl BookmarkSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookmarkSource::DocumentPicker => "document_picker",
            BookmarkSource::ShareExtension => "share_extension",
        }
    }
}

impl std::fmt::Display for BookmarkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read access to one bookmark store.
pub trait BookmarkStore: Send + Sync {
    fn source(&self) -> BookmarkSource;

    /// Opaque bookmark blob recorded for `original_path`, if any.
    fn find_bookmark(&self, original_path: &str) -> Option<Vec<u8>>;
}

/// Reads a store file, treating a missing file as "no bookmarks".
fn read_store_file(path: &Path) -> Result<Option<String>, BookmarkError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BookmarkError::StoreUnreadable {
            path: path.display().to_string(),
            source: e,
        }),
    }
}

// =============================================================================
// Document picker
// =============================================================================

/// Bookmarks captured by the document picker, keyed by absolute path.
///
/// On disk: a JSON object mapping each path to a base64 blob.
#[derive(Debug, Default, Clone)]
pub struct DocumentPickerStore {
    entries: HashMap<String, Vec<u8>>,
}

impl DocumentPickerStore {
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<u8>)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Load the store, logging and returning an empty store on failure.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("Ignoring document picker bookmarks: {}", e);
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, BookmarkError> {
        let Some(content) = read_store_file(path)? else {
            debug!("No document picker bookmarks at {:?}", path);
            return Ok(Self::default());
        };
        let raw: HashMap<String, String> =
            serde_json::from_str(&content).map_err(|e| BookmarkError::StoreCorrupt {
                path: path.display().to_string(),
                source: e,
            })?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (original_path, encoded) in raw {
            match STANDARD.decode(encoded.as_bytes()) {
                Ok(blob) => {
                    entries.insert(original_path, blob);
                }
                Err(e) => warn!(
                    "Skipping document picker bookmark for {}: invalid base64 ({})",
                    original_path, e
                ),
            }
        }
        debug!("Loaded {} document picker bookmarks", entries.len());
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BookmarkStore for DocumentPickerStore {
    fn source(&self) -> BookmarkSource {
        BookmarkSource::DocumentPicker
    }

    fn find_bookmark(&self, original_path: &str) -> Option<Vec<u8>> {
        self.entries.get(original_path).cloned()
    }
}

// =============================================================================
// Share extension
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ShareExtensionRecord {
    original_url: String,
    bookmark: String,
    #[serde(default)]
    file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareExtensionEntry {
    /// Decoded filesystem path of the shared file.
    pub original_path: String,
    pub bookmark: Vec<u8>,
    pub file_name: String,
}

/// Bookmarks handed over by the share extension, in the order they were
/// shared. The first entry matching a path wins.
#[derive(Debug, Default, Clone)]
pub struct ShareExtensionStore {
    entries: Vec<ShareExtensionEntry>,
}

/// Turns a `file://` URL (percent-encoded) or a bare path into a path string.
pub fn url_to_path(url: &str) -> Option<String> {
    let Some(rest) = url.strip_prefix("file://") else {
        return Some(url.to_string());
    };
    // file://localhost/path and file:///path are both accepted
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    if !rest.starts_with('/') {
        return None;
    }
    urlencoding::decode(rest).ok().map(|p| p.into_owned())
}

impl ShareExtensionStore {
    pub fn from_entries(entries: Vec<ShareExtensionEntry>) -> Self {
        Self { entries }
    }

    /// Load the store, logging and returning an empty store on failure.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("Ignoring share extension bookmarks: {}", e);
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, BookmarkError> {
        let Some(content) = read_store_file(path)? else {
            debug!("No share extension bookmarks at {:?}", path);
            return Ok(Self::default());
        };
        let records: Vec<ShareExtensionRecord> =
            serde_json::from_str(&content).map_err(|e| BookmarkError::StoreCorrupt {
                path: path.display().to_string(),
                source: e,
            })?;

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let Some(original_path) = url_to_path(&record.original_url) else {
                warn!(
                    "Skipping share extension bookmark with unusable URL {}",
                    record.original_url
                );
                continue;
            };
            match STANDARD.decode(record.bookmark.as_bytes()) {
                Ok(bookmark) => entries.push(ShareExtensionEntry {
                    original_path,
                    bookmark,
                    file_name: record.file_name,
                }),
                Err(e) => warn!(
                    "Skipping share extension bookmark for {}: invalid base64 ({})",
                    record.original_url, e
                ),
            }
        }
        debug!("Loaded {} share extension bookmarks", entries.len());
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ShareExtensionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BookmarkStore for ShareExtensionStore {
    fn source(&self) -> BookmarkSource {
        BookmarkSource::ShareExtension
    }

    fn find_bookmark(&self, original_path: &str) -> Option<Vec<u8>> {
        self.entries
            .iter()
            .find(|entry| entry.original_path == original_path)
            .map(|entry| entry.bookmark.clone())
    }
}
