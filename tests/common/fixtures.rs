//! Scratch library fixture: a real SQLite catalog plus the files it points at.

#![allow(dead_code)]

use catalog_reconciler::bookmarks::{
    BookmarkResolver, BookmarkStore, DocumentPickerStore, PortableBookmarkCodec,
};
use catalog_reconciler::library_store::{Album, Artist, LibraryStore, SqliteLibraryStore, Track};
use catalog_reconciler::reconciler::{
    CatalogEvents, CatalogReconciler, ExistenceVerifier, ProvenanceClassifier,
    ReconcilerSettings, ScopedAccessProvider, UnsandboxedAccess,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Audio-ish payload; the probe only needs a non-empty read.
const AUDIO_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00fake mp3 frames";

pub struct TestLibrary {
    pub temp_dir: TempDir,
    pub store: Arc<SqliteLibraryStore>,
}

impl TestLibrary {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        for dir in ["iCloud/Documents", "Documents/Music", "External"] {
            std::fs::create_dir_all(temp_dir.path().join(dir)).expect("Failed to create dir");
        }
        let store = Arc::new(
            SqliteLibraryStore::new(temp_dir.path().join("catalog.db"), 2)
                .expect("Failed to open catalog"),
        );
        Self { temp_dir, store }
    }

    pub fn icloud(&self) -> PathBuf {
        self.temp_dir.path().join("iCloud/Documents")
    }

    pub fn documents(&self) -> PathBuf {
        self.temp_dir.path().join("Documents")
    }

    pub fn external(&self) -> PathBuf {
        self.temp_dir.path().join("External")
    }

    pub fn internal_roots(&self) -> Vec<PathBuf> {
        vec![self.icloud(), self.documents()]
    }

    pub fn write_audio(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(path, AUDIO_BYTES).expect("Failed to write audio file");
    }

    /// Replace the file at `path` with a new one (new inode, same path).
    pub fn replace_audio(&self, path: &Path) {
        let replacement = path.with_extension("replacement");
        std::fs::write(&replacement, AUDIO_BYTES).expect("Failed to write replacement");
        std::fs::rename(&replacement, path).expect("Failed to replace audio file");
    }

    pub fn add_artist(&self, id: &str, name: &str) {
        self.store
            .upsert_artist(&Artist {
                id: id.to_string(),
                name: name.to_string(),
            })
            .expect("Failed to add artist");
    }

    pub fn add_album(&self, id: &str, title: &str, artist_id: Option<&str>) {
        self.store
            .upsert_album(&Album {
                id: id.to_string(),
                title: title.to_string(),
                artist_id: artist_id.map(str::to_string),
            })
            .expect("Failed to add album");
    }

    /// Catalog a track at `path`; the file itself is left untouched.
    pub fn add_track(&self, path: &Path, album_id: Option<&str>, artist_id: Option<&str>) -> Track {
        let mut track = Track::from_path(path);
        track.album_id = album_id.map(str::to_string);
        track.artist_id = artist_id.map(str::to_string);
        self.store.insert_track(&track).expect("Failed to add track");
        track
    }

    /// Write the file and catalog it.
    pub fn add_audio_track(&self, path: &Path) -> Track {
        self.write_audio(path);
        self.add_track(path, None, None)
    }

    pub fn reconciler(&self) -> ReconcilerBuilder {
        ReconcilerBuilder {
            store: self.store.clone(),
            internal_roots: self.internal_roots(),
            bookmark_stores: Vec::new(),
            access: Arc::new(UnsandboxedAccess),
            events: CatalogEvents::default(),
            settings: ReconcilerSettings::default(),
        }
    }
}

pub struct ReconcilerBuilder {
    store: Arc<dyn LibraryStore>,
    internal_roots: Vec<PathBuf>,
    bookmark_stores: Vec<Arc<dyn BookmarkStore>>,
    access: Arc<dyn ScopedAccessProvider>,
    events: CatalogEvents,
    settings: ReconcilerSettings,
}

impl ReconcilerBuilder {
    pub fn store(mut self, store: Arc<dyn LibraryStore>) -> Self {
        self.store = store;
        self
    }

    pub fn bookmark_store(mut self, store: Arc<dyn BookmarkStore>) -> Self {
        self.bookmark_stores.push(store);
        self
    }

    /// Document picker store holding portable bookmarks to `target`, keyed by
    /// each recorded path.
    pub fn picker_bookmarks(self, entries: &[(&Path, &Path)]) -> Self {
        let store = DocumentPickerStore::from_entries(entries.iter().map(|(recorded, target)| {
            (
                recorded.to_string_lossy().into_owned(),
                PortableBookmarkCodec::create(target).expect("Failed to create bookmark"),
            )
        }));
        self.bookmark_store(Arc::new(store))
    }

    pub fn access(mut self, access: Arc<dyn ScopedAccessProvider>) -> Self {
        self.access = access;
        self
    }

    pub fn events(mut self, events: CatalogEvents) -> Self {
        self.events = events;
        self
    }

    pub fn max_concurrent_checks(mut self, max_concurrent_checks: usize) -> Self {
        self.settings.max_concurrent_checks = max_concurrent_checks;
        self
    }

    pub fn build(self) -> Arc<CatalogReconciler> {
        let verifier = ExistenceVerifier::new(
            ProvenanceClassifier::new(self.internal_roots),
            BookmarkResolver::new(self.bookmark_stores, Arc::new(PortableBookmarkCodec)),
            self.access,
        );
        Arc::new(CatalogReconciler::new(
            self.store,
            Arc::new(verifier),
            self.events,
            self.settings,
        ))
    }
}
