//! SQLite-backed library catalog.
//!
//! One write connection behind a mutex gives the single-writer discipline
//! every catalog mutation relies on. Reads go through a small pool of
//! read-only connections when the catalog lives in a file.

use super::models::*;
use super::schema::LIBRARY_VERSIONED_SCHEMAS;
use super::trait_def::LibraryStore;
use crate::identity::StableId;
use crate::sqlite_persistence::migrate_if_needed;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Clone)]
pub struct SqliteLibraryStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn lock(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("Catalog connection mutex poisoned"))
}

/// Runs `body` inside `BEGIN IMMEDIATE` / `COMMIT`, rolling back on error.
fn in_transaction<T>(conn: &Connection, body: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    conn.execute("BEGIN IMMEDIATE", [])?;
    let result = body(conn).and_then(|value| {
        conn.execute("COMMIT", [])?;
        Ok(value)
    });
    if result.is_err() {
        let _ = conn.execute("ROLLBACK", []);
    }
    result
}

impl SqliteLibraryStore {
    /// Open (creating if needed) the catalog at `db_path`.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of read-only connections for concurrent reads
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open catalog database {:?}", db_path))?;

        migrate_if_needed(&mut write_conn, LIBRARY_VERSIONED_SCHEMAS)?;
        write_conn.pragma_update(None, "journal_mode", "WAL")?;

        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        let store = SqliteLibraryStore {
            read_pool,
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_index: Arc::new(AtomicUsize::new(0)),
        };

        let counts = store.counts()?;
        info!(
            "Opened library catalog: {} artists, {} albums, {} tracks",
            counts.artists, counts.albums, counts.tracks
        );
        Ok(store)
    }

    /// A private in-memory catalog; reads share the write connection.
    pub fn in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrate_if_needed(&mut conn, LIBRARY_VERSIONED_SCHEMAS)?;
        Ok(SqliteLibraryStore {
            read_pool: Vec::new(),
            write_conn: Arc::new(Mutex::new(conn)),
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        if self.read_pool.is_empty() {
            return self.write_conn.clone();
        }
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    fn parse_track_row(row: &rusqlite::Row) -> rusqlite::Result<Track> {
        Ok(Track {
            stable_id: StableId::from(row.get::<_, String>(0)?),
            path: row.get(1)?,
            album_id: row.get(2)?,
            artist_id: row.get(3)?,
            title: row.get(4)?,
            duration_ms: row.get(5)?,
            track_number: row.get(6)?,
            disc_number: row.get(7)?,
        })
    }

    fn parse_playlist_item_row(row: &rusqlite::Row) -> rusqlite::Result<PlaylistItem> {
        Ok(PlaylistItem {
            playlist_id: row.get(0)?,
            track_stable_id: StableId::from(row.get::<_, String>(1)?),
            position: row.get(2)?,
        })
    }

    fn count(conn: &Connection, sql: &str, id: &str) -> Result<i64> {
        Ok(conn.query_row(sql, params![id], |r| r.get(0))?)
    }

    fn cascade_in_tx(conn: &Connection, stable_id: &StableId) -> Result<CascadeOutcome> {
        let id = stable_id.as_str();
        let mut outcome = CascadeOutcome::default();

        let parents: Option<(Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT album_id, artist_id FROM tracks WHERE stable_id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        outcome.favorites_removed =
            conn.execute("DELETE FROM favorites WHERE track_stable_id = ?1", params![id])?;
        outcome.playlist_items_removed = conn.execute(
            "DELETE FROM playlist_items WHERE track_stable_id = ?1",
            params![id],
        )?;

        let Some((album_id, artist_id)) = parents else {
            return Ok(outcome);
        };

        outcome.track_deleted =
            conn.execute("DELETE FROM tracks WHERE stable_id = ?1", params![id])? > 0;

        let mut artist_candidates: Vec<String> = artist_id.into_iter().collect();

        if let Some(album_id) = album_id {
            let remaining =
                Self::count(conn, "SELECT COUNT(*) FROM tracks WHERE album_id = ?1", &album_id)?;
            if remaining == 0 {
                let album_artist: Option<String> = conn
                    .query_row(
                        "SELECT artist_id FROM albums WHERE id = ?1",
                        params![album_id],
                        |r| r.get::<_, Option<String>>(0),
                    )
                    .optional()?
                    .flatten();
                if conn.execute("DELETE FROM albums WHERE id = ?1", params![album_id])? > 0 {
                    debug!("Album {} has no tracks left, removed", album_id);
                    outcome.album_removed = Some(album_id);
                }
                if let Some(album_artist) = album_artist {
                    if !artist_candidates.contains(&album_artist) {
                        artist_candidates.push(album_artist);
                    }
                }
            }
        }

        for artist_id in artist_candidates {
            let tracks = Self::count(
                conn,
                "SELECT COUNT(*) FROM tracks WHERE artist_id = ?1",
                &artist_id,
            )?;
            let albums = Self::count(
                conn,
                "SELECT COUNT(*) FROM albums WHERE artist_id = ?1",
                &artist_id,
            )?;
            if tracks == 0
                && albums == 0
                && conn.execute("DELETE FROM artists WHERE id = ?1", params![artist_id])? > 0
            {
                debug!("Artist {} has no tracks or albums left, removed", artist_id);
                outcome.artists_removed.push(artist_id);
            }
        }

        Ok(outcome)
    }

    fn integrity_report_with(conn: &Connection) -> Result<IntegrityReport> {
        let ids = |sql: &str| -> Result<Vec<String>> {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        };

        let orphaned_albums = ids(
            "SELECT id FROM albums a
             WHERE NOT EXISTS (SELECT 1 FROM tracks t WHERE t.album_id = a.id)
             ORDER BY id",
        )?;
        // An album about to be pruned no longer keeps its artist alive
        let orphaned_artists = ids(
            "SELECT id FROM artists ar
             WHERE NOT EXISTS (SELECT 1 FROM tracks t WHERE t.artist_id = ar.id)
               AND NOT EXISTS (
                   SELECT 1 FROM albums a WHERE a.artist_id = ar.id
                     AND EXISTS (SELECT 1 FROM tracks t WHERE t.album_id = a.id))
             ORDER BY id",
        )?;
        let dangling_favorites = ids(
            "SELECT track_stable_id FROM favorites f
             WHERE NOT EXISTS (SELECT 1 FROM tracks t WHERE t.stable_id = f.track_stable_id)
             ORDER BY track_stable_id",
        )?
        .into_iter()
        .map(StableId::from)
        .collect();

        let mut stmt = conn.prepare(
            "SELECT playlist_id, track_stable_id, position FROM playlist_items p
             WHERE NOT EXISTS (SELECT 1 FROM tracks t WHERE t.stable_id = p.track_stable_id)
             ORDER BY playlist_id, position",
        )?;
        let dangling_playlist_items = stmt
            .query_map([], Self::parse_playlist_item_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(IntegrityReport {
            orphaned_albums,
            orphaned_artists,
            dangling_favorites,
            dangling_playlist_items,
        })
    }
}

impl LibraryStore for SqliteLibraryStore {
    fn list_tracks(&self) -> Result<Vec<Track>> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let mut stmt = conn.prepare_cached(
            "SELECT stable_id, path, album_id, artist_id, title, duration_ms, track_number, disc_number
             FROM tracks ORDER BY stable_id",
        )?;
        let tracks = stmt
            .query_map([], Self::parse_track_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    fn get_track(&self, stable_id: &StableId) -> Result<Option<Track>> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let track = conn
            .query_row(
                "SELECT stable_id, path, album_id, artist_id, title, duration_ms, track_number, disc_number
                 FROM tracks WHERE stable_id = ?1",
                params![stable_id.as_str()],
                Self::parse_track_row,
            )
            .optional()?;
        Ok(track)
    }

    fn list_albums(&self) -> Result<Vec<Album>> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let mut stmt = conn.prepare_cached("SELECT id, title, artist_id FROM albums ORDER BY id")?;
        let albums = stmt
            .query_map([], |r| {
                Ok(Album {
                    id: r.get(0)?,
                    title: r.get(1)?,
                    artist_id: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(albums)
    }

    fn list_artists(&self) -> Result<Vec<Artist>> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let mut stmt = conn.prepare_cached("SELECT id, name FROM artists ORDER BY id")?;
        let artists = stmt
            .query_map([], |r| {
                Ok(Artist {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(artists)
    }

    fn list_favorites(&self) -> Result<Vec<StableId>> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let mut stmt = conn
            .prepare_cached("SELECT track_stable_id FROM favorites ORDER BY track_stable_id")?;
        let favorites = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .map(|r| r.map(StableId::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(favorites)
    }

    fn list_playlists(&self) -> Result<Vec<Playlist>> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let mut stmt = conn.prepare_cached("SELECT id, name FROM playlists ORDER BY id")?;
        let playlists = stmt
            .query_map([], |r| {
                Ok(Playlist {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(playlists)
    }

    fn list_playlist_items(&self) -> Result<Vec<PlaylistItem>> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let mut stmt = conn.prepare_cached(
            "SELECT playlist_id, track_stable_id, position FROM playlist_items
             ORDER BY playlist_id, position",
        )?;
        let items = stmt
            .query_map([], Self::parse_playlist_item_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn counts(&self) -> Result<CatalogCounts> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
            Ok(n as usize)
        };
        Ok(CatalogCounts {
            tracks: count("tracks")?,
            albums: count("albums")?,
            artists: count("artists")?,
            favorites: count("favorites")?,
            playlist_items: count("playlist_items")?,
        })
    }

    fn upsert_artist(&self, artist: &Artist) -> Result<()> {
        let conn = lock(&self.write_conn)?;
        conn.execute(
            "INSERT INTO artists (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            params![artist.id, artist.name],
        )?;
        Ok(())
    }

    fn upsert_album(&self, album: &Album) -> Result<()> {
        let conn = lock(&self.write_conn)?;
        conn.execute(
            "INSERT INTO albums (id, title, artist_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET title = excluded.title, artist_id = excluded.artist_id",
            params![album.id, album.title, album.artist_id],
        )
        .with_context(|| format!("Could not store album {}", album.id))?;
        Ok(())
    }

    fn insert_track(&self, track: &Track) -> Result<()> {
        let conn = lock(&self.write_conn)?;
        conn.execute(
            "INSERT INTO tracks (stable_id, path, album_id, artist_id, title, duration_ms, track_number, disc_number)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                track.stable_id.as_str(),
                track.path,
                track.album_id,
                track.artist_id,
                track.title,
                track.duration_ms,
                track.track_number,
                track.disc_number,
            ],
        )
        .with_context(|| format!("Could not insert track {} ({})", track.stable_id, track.path))?;
        Ok(())
    }

    fn add_favorite(&self, stable_id: &StableId) -> Result<()> {
        let conn = lock(&self.write_conn)?;
        conn.execute(
            "INSERT OR IGNORE INTO favorites (track_stable_id) VALUES (?1)",
            params![stable_id.as_str()],
        )?;
        Ok(())
    }

    fn create_playlist(&self, name: &str) -> Result<i64> {
        let conn = lock(&self.write_conn)?;
        conn.execute("INSERT INTO playlists (name) VALUES (?1)", params![name])
            .context("Could not create playlist")?;
        Ok(conn.last_insert_rowid())
    }

    fn add_playlist_item(
        &self,
        playlist_id: i64,
        stable_id: &StableId,
        position: u32,
    ) -> Result<()> {
        let conn = lock(&self.write_conn)?;
        conn.execute(
            "INSERT INTO playlist_items (playlist_id, track_stable_id, position) VALUES (?1, ?2, ?3)",
            params![playlist_id, stable_id.as_str(), position],
        )
        .with_context(|| format!("Could not add {} to playlist {}", stable_id, playlist_id))?;
        Ok(())
    }

    fn delete_track_cascade(&self, stable_id: &StableId) -> Result<CascadeOutcome> {
        let conn = lock(&self.write_conn)?;
        in_transaction(&conn, |conn| Self::cascade_in_tx(conn, stable_id))
            .with_context(|| format!("Cascading delete of track {} failed", stable_id))
    }

    fn integrity_report(&self) -> Result<IntegrityReport> {
        let conn = self.get_read_conn();
        let conn = lock(&conn)?;
        Self::integrity_report_with(&conn)
    }

    fn prune_orphans(&self) -> Result<IntegrityReport> {
        let conn = lock(&self.write_conn)?;
        in_transaction(&conn, |conn| {
            let report = Self::integrity_report_with(conn)?;
            if report.is_clean() {
                return Ok(report);
            }
            conn.execute(
                "DELETE FROM favorites WHERE NOT EXISTS
                 (SELECT 1 FROM tracks t WHERE t.stable_id = favorites.track_stable_id)",
                [],
            )?;
            conn.execute(
                "DELETE FROM playlist_items WHERE NOT EXISTS
                 (SELECT 1 FROM tracks t WHERE t.stable_id = playlist_items.track_stable_id)",
                [],
            )?;
            for album_id in &report.orphaned_albums {
                conn.execute("DELETE FROM albums WHERE id = ?1", params![album_id])?;
            }
            for artist_id in &report.orphaned_artists {
                conn.execute("DELETE FROM artists WHERE id = ?1", params![artist_id])?;
            }
            Ok(report)
        })
    }
}
