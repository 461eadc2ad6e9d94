//! Role-scoped student record registry: authoritative store, scope
//! resolution, threshold classification, bulk reconciliation, and change
//! propagation.

pub mod classify;
pub mod domain;
pub mod events;
pub mod export;
pub mod reconcile;
pub mod router;
pub mod scope;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use classify::{classify, partition, CategoryCounts, ClassificationReport, RiskLabel, RiskThresholds};
pub use domain::{
    InterventionNote, RecordId, StudentDraft, StudentNumber, StudentPatch, StudentRecord, Term,
    ValidationError,
};
pub use events::{ChangeEvent, ChangeNotifier};
pub use export::{render_roster, ExportError, ExportSink, FileExportSink, EXPORT_HEADER};
pub use reconcile::{ImportSummary, RowDiagnostic};
pub use router::registry_router;
pub use scope::{
    resolve_scope, Actor, EnrollmentDirectory, EnrollmentError, Role, ScopePredicate,
};
pub use service::{PageInfo, RecordListing, RegistryService, ServiceError};
pub use store::{MemoryRecordStore, RecordStore, StoreError};
