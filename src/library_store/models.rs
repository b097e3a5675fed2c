//! Catalog entities and the results of catalog mutations.

use crate::identity::{stable_id_for_path, StableId};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub stable_id: StableId,
    /// Absolute path recorded at import time.
    pub path: String,
    pub album_id: Option<String>,
    pub artist_id: Option<String>,
    pub title: String,
    pub duration_ms: i64,
    pub track_number: u32,
    pub disc_number: u32,
}

impl Track {
    /// Builds a track row the way the importer does: the id comes from the
    /// file name, the title defaults to the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Track {
            stable_id: stable_id_for_path(path),
            path: path.to_string_lossy().into_owned(),
            album_id: None,
            artist_id: None,
            title,
            duration_ms: 0,
            track_number: 0,
            disc_number: 1,
        }
    }

    pub fn with_album(mut self, album_id: impl Into<String>) -> Self {
        self.album_id = Some(album_id.into());
        self
    }

    pub fn with_artist(mut self, artist_id: impl Into<String>) -> Self {
        self.artist_id = Some(artist_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub playlist_id: i64,
    pub track_stable_id: StableId,
    pub position: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogCounts {
    pub tracks: usize,
    pub albums: usize,
    pub artists: usize,
    pub favorites: usize,
    pub playlist_items: usize,
}

/// What a single track's cascading delete touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeOutcome {
    /// False when the track row was already gone.
    pub track_deleted: bool,
    pub favorites_removed: usize,
    pub playlist_items_removed: usize,
    pub album_removed: Option<String>,
    pub artists_removed: Vec<String>,
}

impl CascadeOutcome {
    pub fn changed_anything(&self) -> bool {
        self.track_deleted
            || self.favorites_removed > 0
            || self.playlist_items_removed > 0
            || self.album_removed.is_some()
            || !self.artists_removed.is_empty()
    }
}

/// Rows that break the catalog invariants: parents without children and
/// user content pointing at missing tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub orphaned_albums: Vec<String>,
    pub orphaned_artists: Vec<String>,
    pub dangling_favorites: Vec<StableId>,
    pub dangling_playlist_items: Vec<PlaylistItem>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    pub fn total(&self) -> usize {
        self.orphaned_albums.len()
            + self.orphaned_artists.len()
            + self.dangling_favorites.len()
            + self.dangling_playlist_items.len()
    }
}
