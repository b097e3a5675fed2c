//! End-to-end sweeps over an on-disk catalog of app-managed files.

mod common;

use catalog_reconciler::bookmarks::{BookmarkStore, DocumentPickerStore};
use catalog_reconciler::library_store::LibraryStore;
use catalog_reconciler::reconciler::{
    CatalogEvent, GoneReason, Provenance, SweepMode, SweepOutcome,
};
use common::{
    CountingBookmarkStore, ScriptedStore, TestLibrary, ALBUM_1_ID, ALBUM_1_TITLE, ALBUM_2_ID,
    ALBUM_2_TITLE, ARTIST_1_ID, ARTIST_1_NAME, ARTIST_2_ID, ARTIST_2_NAME, PLAYLIST_NAME,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_removed_internal_track_takes_its_dependents_along() {
    let library = TestLibrary::new();
    library.add_artist(ARTIST_1_ID, ARTIST_1_NAME);
    library.add_artist(ARTIST_2_ID, ARTIST_2_NAME);
    library.add_album(ALBUM_1_ID, ALBUM_1_TITLE, Some(ARTIST_1_ID));
    library.add_album(ALBUM_2_ID, ALBUM_2_TITLE, Some(ARTIST_2_ID));

    let song1 = library.documents().join("Music/song1.flac");
    let song2 = library.icloud().join("song2.flac");
    library.write_audio(&song1);
    library.write_audio(&song2);
    let track1 = library.add_track(&song1, Some(ALBUM_1_ID), Some(ARTIST_1_ID));
    let track2 = library.add_track(&song2, Some(ALBUM_2_ID), Some(ARTIST_2_ID));

    library.store.add_favorite(&track1.stable_id).unwrap();
    let playlist = library.store.create_playlist(PLAYLIST_NAME).unwrap();
    library
        .store
        .add_playlist_item(playlist, &track1.stable_id, 0)
        .unwrap();
    library
        .store
        .add_playlist_item(playlist, &track2.stable_id, 1)
        .unwrap();

    let reconciler = library.reconciler().build();
    let mut events = reconciler.events().subscribe();

    // Everything is on disk: nothing to do
    let report = reconciler.sweep().await;
    assert_eq!(report.outcome, SweepOutcome::Completed);
    assert_eq!(report.tracks_scanned, 2);
    assert_eq!(report.internal_tracks, 2);
    assert!(report.is_clean());
    assert!(!report.notified);
    assert!(events.try_recv().is_err());

    std::fs::remove_file(&song1).unwrap();
    let report = reconciler.sweep().await;

    assert_eq!(report.gone.len(), 1);
    assert_eq!(report.gone[0].stable_id, track1.stable_id);
    assert_eq!(report.gone[0].provenance, Provenance::Internal);
    assert_eq!(report.gone[0].reason, GoneReason::NotFound);
    assert_eq!(report.removed, 1);
    assert_eq!(report.favorites_removed, 1);
    assert_eq!(report.playlist_items_removed, 1);
    assert_eq!(report.albums_removed, 1);
    assert_eq!(report.artists_removed, 1);
    assert!(report.notified);
    assert_eq!(events.try_recv().unwrap(), CatalogEvent::CatalogChanged);

    let store = &library.store;
    assert_eq!(store.list_tracks().unwrap(), vec![track2.clone()]);
    assert!(store.list_favorites().unwrap().is_empty());
    let items = store.list_playlist_items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].track_stable_id, track2.stable_id);
    let albums: Vec<String> = store.list_albums().unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(albums, vec![ALBUM_2_ID.to_string()]);
    let artists: Vec<String> = store.list_artists().unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(artists, vec![ARTIST_2_ID.to_string()]);
    assert!(store.integrity_report().unwrap().is_clean());
}

#[tokio::test]
async fn test_album_survives_while_another_track_references_it() {
    let library = TestLibrary::new();
    library.add_artist(ARTIST_1_ID, ARTIST_1_NAME);
    library.add_album(ALBUM_1_ID, ALBUM_1_TITLE, Some(ARTIST_1_ID));

    let first = library.documents().join("Music/01.flac");
    let second = library.documents().join("Music/02.flac");
    library.write_audio(&second);
    library.add_track(&first, Some(ALBUM_1_ID), Some(ARTIST_1_ID));
    let kept = library.add_track(&second, Some(ALBUM_1_ID), Some(ARTIST_1_ID));

    let report = library.reconciler().build().sweep().await;

    assert_eq!(report.removed, 1);
    assert_eq!(report.albums_removed, 0);
    assert_eq!(report.artists_removed, 0);
    assert_eq!(library.store.list_tracks().unwrap(), vec![kept]);
    assert_eq!(library.store.counts().unwrap().albums, 1);
    assert_eq!(library.store.counts().unwrap().artists, 1);
}

#[tokio::test]
async fn test_failed_cascade_keeps_only_that_track() {
    let library = TestLibrary::new();
    for i in 0..10 {
        library.add_track(&library.documents().join(format!("Music/{:02}.mp3", i)), None, None);
    }
    let failing = Arc::new(ScriptedStore::new(library.store.clone()).fail_on_cascade(4));
    let reconciler = library.reconciler().store(failing.clone()).build();
    let mut events = reconciler.events().subscribe();

    let report = reconciler.sweep().await;

    assert_eq!(report.outcome, SweepOutcome::Completed);
    assert_eq!(report.gone.len(), 10);
    assert_eq!(failing.cascades(), 10);
    assert_eq!(report.removed, 9);
    assert_eq!(report.failed.len(), 1);
    // Cascades run in stable id order, so the fourth is the fourth gone track
    let failed_id = report.gone[3].stable_id.clone();
    assert_eq!(report.failed[0].stable_id, failed_id);
    assert!(report.failed[0].error.contains("disk I/O error"));

    let remaining = library.store.list_tracks().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].stable_id, failed_id);

    assert!(report.notified);
    assert_eq!(events.try_recv().unwrap(), CatalogEvent::CatalogChanged);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_cancel_during_cascade_finishes_that_track_and_skips_pruning() {
    let library = TestLibrary::new();
    // Pre-existing orphan that only pruning would remove
    library.add_artist(ARTIST_2_ID, ARTIST_2_NAME);
    library.add_album(ALBUM_2_ID, ALBUM_2_TITLE, Some(ARTIST_2_ID));

    let playlist = library.store.create_playlist(PLAYLIST_NAME).unwrap();
    for i in 0..5 {
        let track = library.add_track(
            &library.documents().join(format!("Music/{:02}.mp3", i)),
            None,
            None,
        );
        library.store.add_favorite(&track.stable_id).unwrap();
        library
            .store
            .add_playlist_item(playlist, &track.stable_id, i)
            .unwrap();
    }

    let cancel = CancellationToken::new();
    let scripted = Arc::new(
        ScriptedStore::new(library.store.clone()).cancel_on_cascade(2, cancel.clone()),
    );
    let reconciler = library.reconciler().store(scripted.clone()).build();
    let mut events = reconciler.events().subscribe();

    let report = reconciler.sweep_with(SweepMode::Actual, &cancel).await;

    assert_eq!(report.outcome, SweepOutcome::Cancelled);
    assert_eq!(report.gone.len(), 5);
    assert_eq!(scripted.cascades(), 2);
    assert_eq!(report.removed, 2);
    assert_eq!(report.favorites_removed, 2);
    assert_eq!(report.playlist_items_removed, 2);
    assert_eq!(report.orphans_pruned, 0);
    assert!(report.notified);
    assert_eq!(events.try_recv().unwrap(), CatalogEvent::CatalogChanged);
    assert!(events.try_recv().is_err());

    // The interrupted track went with all of its dependents
    let remaining: Vec<_> = library
        .store
        .list_tracks()
        .unwrap()
        .into_iter()
        .map(|t| t.stable_id)
        .collect();
    assert_eq!(remaining.len(), 3);
    let mut favorites = library.store.list_favorites().unwrap();
    favorites.sort();
    let mut expected = remaining.clone();
    expected.sort();
    assert_eq!(favorites, expected);
    assert_eq!(library.store.list_playlist_items().unwrap().len(), 3);

    // Pruning did not run
    let integrity = library.store.integrity_report().unwrap();
    assert_eq!(integrity.orphaned_albums, vec![ALBUM_2_ID.to_string()]);
    assert!(integrity.dangling_favorites.is_empty());
    assert!(integrity.dangling_playlist_items.is_empty());
}

#[tokio::test]
async fn test_second_sweep_finds_nothing() {
    let library = TestLibrary::new();
    library.add_audio_track(&library.documents().join("Music/kept.mp3"));
    library.add_track(&library.icloud().join("gone.mp3"), None, None);
    let reconciler = library.reconciler().build();
    let mut events = reconciler.events().subscribe();

    let first = reconciler.sweep().await;
    assert_eq!(first.removed, 1);
    assert!(first.notified);

    let second = reconciler.sweep().await;
    assert_eq!(second.outcome, SweepOutcome::Completed);
    assert_eq!(second.tracks_scanned, 1);
    assert!(second.gone.is_empty());
    assert_eq!(second.removed, 0);
    assert!(!second.notified);

    assert_eq!(events.try_recv().unwrap(), CatalogEvent::CatalogChanged);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_sweep_leaves_no_orphans_or_dangling_rows() {
    let library = TestLibrary::new();
    library.add_artist(ARTIST_1_ID, ARTIST_1_NAME);
    library.add_artist(ARTIST_2_ID, ARTIST_2_NAME);
    library.add_album(ALBUM_1_ID, ALBUM_1_TITLE, Some(ARTIST_1_ID));
    // Left behind by an earlier crash: an album with no tracks and its artist
    library.add_album(ALBUM_2_ID, ALBUM_2_TITLE, Some(ARTIST_2_ID));

    let present = library.documents().join("Music/present.mp3");
    library.write_audio(&present);
    library.add_track(&present, Some(ALBUM_1_ID), Some(ARTIST_1_ID));
    let gone = library.add_track(
        &library.documents().join("Music/gone.mp3"),
        Some(ALBUM_1_ID),
        Some(ARTIST_1_ID),
    );
    library.store.add_favorite(&gone.stable_id).unwrap();
    library
        .store
        .add_favorite(&catalog_reconciler::compute_stable_id("never-imported.mp3"))
        .unwrap();

    let before = library.store.integrity_report().unwrap();
    assert!(!before.is_clean());

    let report = library.reconciler().build().sweep().await;
    assert_eq!(report.removed, 1);
    assert!(report.orphans_pruned >= 3);
    assert!(report.notified);

    let after = library.store.integrity_report().unwrap();
    assert!(after.is_clean(), "integrity violations left: {:?}", after);
    assert_eq!(library.store.counts().unwrap().albums, 1);
    assert_eq!(library.store.counts().unwrap().artists, 1);
}

#[tokio::test]
async fn test_internal_tracks_never_consult_bookmarks() {
    let library = TestLibrary::new();
    let present = library.documents().join("Music/song1.flac");
    let missing = library.icloud().join("song2.flac");
    library.add_audio_track(&present);
    library.add_track(&missing, None, None);

    // A bookmark exists for both paths; neither may be read
    let picker: Arc<dyn BookmarkStore> = Arc::new(DocumentPickerStore::from_entries([
        (present.to_string_lossy().into_owned(), b"blob".to_vec()),
        (missing.to_string_lossy().into_owned(), b"blob".to_vec()),
    ]));
    let counting = Arc::new(CountingBookmarkStore::new(picker));
    let reconciler = library.reconciler().bookmark_store(counting.clone()).build();

    let report = reconciler.sweep().await;

    assert_eq!(report.internal_tracks, 2);
    assert_eq!(report.external_tracks, 0);
    assert_eq!(report.gone.len(), 1);
    assert_eq!(report.gone[0].reason, GoneReason::NotFound);
    assert_eq!(counting.reads(), 0);
}

#[tokio::test]
async fn test_user_removal_shares_the_cascade() {
    let library = TestLibrary::new();
    library.add_artist(ARTIST_1_ID, ARTIST_1_NAME);
    library.add_album(ALBUM_1_ID, ALBUM_1_TITLE, Some(ARTIST_1_ID));
    let path = library.documents().join("Music/unwanted.mp3");
    library.write_audio(&path);
    let track = library.add_track(&path, Some(ALBUM_1_ID), Some(ARTIST_1_ID));
    let reconciler = library.reconciler().build();

    let report = reconciler.remove_tracks(&[track.stable_id.clone()]).await;

    assert_eq!(report.removed, 1);
    assert_eq!(report.albums_removed, 1);
    assert_eq!(report.artists_removed, 1);
    assert!(report.notified);
    // The file is left alone; only the catalog forgets it
    assert!(path.exists());
    assert!(library.store.get_track(&track.stable_id).unwrap().is_none());
}

#[test]
fn test_same_file_name_in_two_folders_collides() {
    let library = TestLibrary::new();
    let first = library.add_track(&library.documents().join("Music/intro.mp3"), None, None);
    let elsewhere = library.icloud().join("Album/intro.mp3");

    assert_eq!(
        catalog_reconciler::identity::stable_id_for_path(&elsewhere),
        first.stable_id
    );
    assert!(library
        .store
        .insert_track(&catalog_reconciler::library_store::Track::from_path(&elsewhere))
        .is_err());
}
