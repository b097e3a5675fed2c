//! LibraryStore trait definition.
//!
//! The reconciler only ever talks to the catalog through this trait, so
//! tests can swap in wrappers that fail on demand.

use super::models::*;
use crate::identity::StableId;
use anyhow::Result;

/// Trait for library catalog backends.
pub trait LibraryStore: Send + Sync {
    // =========================================================================
    // Reads
    // =========================================================================

    /// All tracks, ordered by stable id.
    fn list_tracks(&self) -> Result<Vec<Track>>;

    fn get_track(&self, stable_id: &StableId) -> Result<Option<Track>>;

    fn list_albums(&self) -> Result<Vec<Album>>;

    fn list_artists(&self) -> Result<Vec<Artist>>;

    fn list_favorites(&self) -> Result<Vec<StableId>>;

    fn list_playlists(&self) -> Result<Vec<Playlist>>;

    /// Items of every playlist, ordered by playlist then position.
    fn list_playlist_items(&self) -> Result<Vec<PlaylistItem>>;

    fn counts(&self) -> Result<CatalogCounts>;

    // =========================================================================
    // Importer / user writes
    // =========================================================================

    fn upsert_artist(&self, artist: &Artist) -> Result<()>;

    fn upsert_album(&self, album: &Album) -> Result<()>;

    /// Insert a track. Fails if the stable id or the path already exists.
    fn insert_track(&self, track: &Track) -> Result<()>;

    fn add_favorite(&self, stable_id: &StableId) -> Result<()>;

    /// Create a playlist, returning its id.
    fn create_playlist(&self, name: &str) -> Result<i64>;

    fn add_playlist_item(&self, playlist_id: i64, stable_id: &StableId, position: u32)
        -> Result<()>;

    // =========================================================================
    // Cascading removal
    // =========================================================================

    /// Remove a track and everything that depends on it, in one transaction:
    /// its favorites, its playlist items, the track row, then its album if no
    /// track references it anymore, then any artist left with neither tracks
    /// nor albums. Nothing is changed if any step fails.
    fn delete_track_cascade(&self, stable_id: &StableId) -> Result<CascadeOutcome>;

    /// List rows that violate the catalog invariants.
    fn integrity_report(&self) -> Result<IntegrityReport>;

    /// Delete every row listed by [`LibraryStore::integrity_report`], in one
    /// transaction, returning what was removed.
    fn prune_orphans(&self) -> Result<IntegrityReport>;
}
