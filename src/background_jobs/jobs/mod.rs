//! Specific background job implementations.

pub mod library_reconciliation;

pub use library_reconciliation::LibraryReconciliationJob;
