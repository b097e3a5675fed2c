//! Hand-written fakes for the seams the reconciler is built on.

#![allow(dead_code)]

use anyhow::{bail, Result};
use catalog_reconciler::bookmarks::{BookmarkSource, BookmarkStore};
use catalog_reconciler::library_store::{
    Album, Artist, CascadeOutcome, CatalogCounts, IntegrityReport, LibraryStore, Playlist,
    PlaylistItem, SqliteLibraryStore, Track,
};
use catalog_reconciler::reconciler::ScopedAccessProvider;
use catalog_reconciler::StableId;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wraps a bookmark store and counts lookups.
pub struct CountingBookmarkStore {
    inner: Arc<dyn BookmarkStore>,
    reads: AtomicUsize,
}

impl CountingBookmarkStore {
    pub fn new(inner: Arc<dyn BookmarkStore>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl BookmarkStore for CountingBookmarkStore {
    fn source(&self) -> BookmarkSource {
        self.inner.source()
    }

    fn find_bookmark(&self, original_path: &str) -> Option<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.find_bookmark(original_path)
    }
}

/// Takes `delay` to answer every lookup (always with no bookmark) and
/// records the most lookups ever in flight at once.
pub struct SlowBookmarkStore {
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    reads: AtomicUsize,
}

impl SlowBookmarkStore {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl BookmarkStore for SlowBookmarkStore {
    fn source(&self) -> BookmarkSource {
        BookmarkSource::DocumentPicker
    }

    fn find_bookmark(&self, _original_path: &str) -> Option<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        None
    }
}

/// Refuses every grant and records how often it was asked.
#[derive(Default)]
pub struct DenyingAccess {
    attempts: AtomicUsize,
    releases: AtomicUsize,
}

impl DenyingAccess {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl ScopedAccessProvider for DenyingAccess {
    fn start_accessing(&self, _path: &Path) -> bool {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        false
    }

    fn stop_accessing(&self, _path: &Path) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Delegates to a real store, with scripted trouble on the n-th cascading
/// delete (1-based).
pub struct ScriptedStore {
    inner: Arc<SqliteLibraryStore>,
    fail_on_cascade: Option<usize>,
    cancel_on_cascade: Option<(usize, CancellationToken)>,
    cascades: AtomicUsize,
}

impl ScriptedStore {
    pub fn new(inner: Arc<SqliteLibraryStore>) -> Self {
        Self {
            inner,
            fail_on_cascade: None,
            cancel_on_cascade: None,
            cascades: AtomicUsize::new(0),
        }
    }

    /// The n-th cascade fails without touching the catalog.
    pub fn fail_on_cascade(mut self, n: usize) -> Self {
        self.fail_on_cascade = Some(n);
        self
    }

    /// `token` is cancelled while the n-th cascade is underway; that cascade
    /// still completes.
    pub fn cancel_on_cascade(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on_cascade = Some((n, token));
        self
    }

    pub fn cascades(&self) -> usize {
        self.cascades.load(Ordering::SeqCst)
    }
}

impl LibraryStore for ScriptedStore {
    fn list_tracks(&self) -> Result<Vec<Track>> {
        self.inner.list_tracks()
    }

    fn get_track(&self, stable_id: &StableId) -> Result<Option<Track>> {
        self.inner.get_track(stable_id)
    }

    fn list_albums(&self) -> Result<Vec<Album>> {
        self.inner.list_albums()
    }

    fn list_artists(&self) -> Result<Vec<Artist>> {
        self.inner.list_artists()
    }

    fn list_favorites(&self) -> Result<Vec<StableId>> {
        self.inner.list_favorites()
    }

    fn list_playlists(&self) -> Result<Vec<Playlist>> {
        self.inner.list_playlists()
    }

    fn list_playlist_items(&self) -> Result<Vec<PlaylistItem>> {
        self.inner.list_playlist_items()
    }

    fn counts(&self) -> Result<CatalogCounts> {
        self.inner.counts()
    }

    fn upsert_artist(&self, artist: &Artist) -> Result<()> {
        self.inner.upsert_artist(artist)
    }

    fn upsert_album(&self, album: &Album) -> Result<()> {
        self.inner.upsert_album(album)
    }

    fn insert_track(&self, track: &Track) -> Result<()> {
        self.inner.insert_track(track)
    }

    fn add_favorite(&self, stable_id: &StableId) -> Result<()> {
        self.inner.add_favorite(stable_id)
    }

    fn create_playlist(&self, name: &str) -> Result<i64> {
        self.inner.create_playlist(name)
    }

    fn add_playlist_item(
        &self,
        playlist_id: i64,
        stable_id: &StableId,
        position: u32,
    ) -> Result<()> {
        self.inner.add_playlist_item(playlist_id, stable_id, position)
    }

    fn delete_track_cascade(&self, stable_id: &StableId) -> Result<CascadeOutcome> {
        let call = self.cascades.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_cascade == Some(call) {
            bail!("disk I/O error while deleting {}", stable_id);
        }
        if let Some((n, token)) = &self.cancel_on_cascade {
            if *n == call {
                token.cancel();
            }
        }
        self.inner.delete_track_cascade(stable_id)
    }

    fn integrity_report(&self) -> Result<IntegrityReport> {
        self.inner.integrity_report()
    }

    fn prune_orphans(&self) -> Result<IntegrityReport> {
        self.inner.prune_orphans()
    }
}
