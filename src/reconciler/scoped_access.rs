//! Security-scoped resource grants.
//!
//! A grant is acquired with [`ScopedAccessGuard::acquire`] and released when
//! the guard drops, so every exit path out of [`with_scoped_access`]
//! (including unwinding) gives the grant back.

use super::error::ReconcileError;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub const DEFAULT_PROBE_BYTES: usize = 1024;

/// Platform hook for starting and stopping access to a resource outside the
/// app sandbox.
pub trait ScopedAccessProvider: Send + Sync {
    /// Returns false when the platform refuses the grant.
    fn start_accessing(&self, path: &Path) -> bool;

    fn stop_accessing(&self, path: &Path);
}

/// Provider for platforms without scoped grants: every request succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsandboxedAccess;

impl ScopedAccessProvider for UnsandboxedAccess {
    fn start_accessing(&self, _path: &Path) -> bool {
        true
    }

    fn stop_accessing(&self, _path: &Path) {}
}

pub struct ScopedAccessGuard<'a> {
    provider: &'a dyn ScopedAccessProvider,
    path: PathBuf,
}

impl<'a> ScopedAccessGuard<'a> {
    pub fn acquire(
        provider: &'a dyn ScopedAccessProvider,
        path: &Path,
    ) -> Result<Self, ReconcileError> {
        if !provider.start_accessing(path) {
            return Err(ReconcileError::AccessDenied(path.display().to_string()));
        }
        Ok(Self {
            provider,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedAccessGuard<'_> {
    fn drop(&mut self) {
        self.provider.stop_accessing(&self.path);
    }
}

/// Run `body` while holding a grant for `path`. `body` is not called when the
/// grant is refused.
pub fn with_scoped_access<T>(
    provider: &dyn ScopedAccessProvider,
    path: &Path,
    body: impl FnOnce(&Path) -> T,
) -> Result<T, ReconcileError> {
    let guard = ScopedAccessGuard::acquire(provider, path)?;
    Ok(body(guard.path()))
}

/// Check that `path` exists, has readable attributes and yields at least one
/// byte out of its first `probe_bytes`, all under a scoped grant.
///
/// The read step catches cloud placeholders that exist but cannot be fetched.
pub fn probe(
    provider: &dyn ScopedAccessProvider,
    path: &Path,
    probe_bytes: usize,
) -> Result<(), ReconcileError> {
    let failed = |reason: String| ReconcileError::ProbeFailed {
        path: path.display().to_string(),
        reason,
    };

    with_scoped_access(provider, path, |path| {
        if !path.exists() {
            return Err(failed("does not exist".to_string()));
        }
        let metadata = std::fs::metadata(path).map_err(|e| failed(format!("attributes: {}", e)))?;
        if metadata.is_dir() {
            return Err(failed("is a directory".to_string()));
        }

        let file = File::open(path).map_err(|e| failed(format!("open: {}", e)))?;
        let mut buf = vec![0u8; probe_bytes.max(1)];
        let read = file
            .take(buf.len() as u64)
            .read(&mut buf)
            .map_err(|e| failed(format!("read: {}", e)))?;
        if read == 0 {
            return Err(failed("no bytes readable".to_string()));
        }
        Ok(())
    })?
}

pub fn probe_accessibility(
    provider: &dyn ScopedAccessProvider,
    path: &Path,
    probe_bytes: usize,
) -> bool {
    probe(provider, path, probe_bytes).is_ok()
}
