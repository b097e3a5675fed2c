//! Library reconciliation: proves each cataloged track is still reachable and
//! removes the ones that are not.

mod error;
mod events;
mod existence;
mod models;
mod provenance;
mod scoped_access;
mod sweep;

pub use error::ReconcileError;
pub use events::{CatalogEvent, CatalogEvents};
pub use existence::ExistenceVerifier;
pub use models::{
    Existence, FailedRemoval, GoneReason, GoneTrack, SweepMode, SweepOutcome, SweepReport,
};
pub use provenance::{normalize_path, Provenance, ProvenanceClassifier};
pub use scoped_access::{
    probe, probe_accessibility, with_scoped_access, ScopedAccessGuard, ScopedAccessProvider,
    UnsandboxedAccess, DEFAULT_PROBE_BYTES,
};
pub use sweep::{
    CatalogReconciler, CatalogWriteGate, ReconcilerSettings, DEFAULT_MAX_CONCURRENT_CHECKS,
};
