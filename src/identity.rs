//! Stable track identity.
//!
//! A track's identity is the SHA-256 of its file's base name, hex encoded.
//! The importer and the reconciler both derive ids through
//! [`compute_stable_id`]; it is the only contract between them, so the
//! scheme must never change without a catalog migration.
//!
//! Only the base name is hashed. Moving a file to another folder keeps its
//! id, renaming it produces a new one, and two files with the same name in
//! different folders collide.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Catalog primary key of a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StableId {
    /// Wraps an id read back from storage. No hashing happens here.
    fn from(raw: String) -> Self {
        StableId(raw)
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the stable id for a file name.
///
/// Anything before the last path separator is ignored, so passing a full
/// path and passing its base name give the same id.
pub fn compute_stable_id(file_name: &str) -> StableId {
    let base_name = base_name(file_name);
    let digest = Sha256::digest(base_name.as_bytes());
    StableId(format!("{:x}", digest))
}

/// Same as [`compute_stable_id`] for a path value.
pub fn stable_id_for_path(path: &Path) -> StableId {
    compute_stable_id(&path.to_string_lossy())
}

fn base_name(file_name: &str) -> &str {
    let trimmed = file_name.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}
