//! Common test infrastructure
//!
//! Builds an on-disk catalog inside a scratch directory laid out like an app
//! container (`iCloud/Documents`, `Documents`, and an `External` folder for
//! files imported from outside the sandbox), plus fakes for the injected
//! seams.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestLibrary, ALBUM_1_ID};
//!
//! #[tokio::test]
//! async fn test_sweep() {
//!     let library = TestLibrary::new();
//!     let reconciler = library.reconciler().build();
//!     let report = reconciler.sweep().await;
//! }
//! ```

mod constants;
mod fakes;
mod fixtures;

#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fakes::{CountingBookmarkStore, DenyingAccess, ScriptedStore, SlowBookmarkStore};
pub use fixtures::{ReconcilerBuilder, TestLibrary};
