//! Catalog Reconciler Library
//!
//! Keeps the music catalog in agreement with the files it points at. This
//! library exposes the internal modules for testing and potential reuse.

pub mod background_jobs;
pub mod bookmarks;
pub mod config;
pub mod identity;
pub mod library_store;
pub mod reconciler;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use identity::{compute_stable_id, StableId};
pub use library_store::{LibraryStore, SqliteLibraryStore};
pub use reconciler::{CatalogReconciler, SweepReport};
