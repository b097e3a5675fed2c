//! Shared ids for catalog fixtures.

#![allow(dead_code)]

pub const ARTIST_1_ID: &str = "artist-1";
pub const ARTIST_1_NAME: &str = "The Test Band";
pub const ARTIST_2_ID: &str = "artist-2";
pub const ARTIST_2_NAME: &str = "Solo Artist";

pub const ALBUM_1_ID: &str = "album-1";
pub const ALBUM_1_TITLE: &str = "First Album";
pub const ALBUM_2_ID: &str = "album-2";
pub const ALBUM_2_TITLE: &str = "Second Album";

pub const PLAYLIST_NAME: &str = "Road Trip";
