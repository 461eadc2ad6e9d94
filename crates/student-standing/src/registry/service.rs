use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::OperationBudgets;

use super::classify::{partition, ClassificationReport, RiskThresholds};
use super::domain::{
    InterventionNote, StudentDraft, StudentPatch, StudentRecord, ValidationError,
};
use super::events::{ChangeEvent, ChangeNotifier};
use super::export::{render_roster, ExportSink};
use super::reconcile::{parse_rows, reconcile_rows, ImportSummary};
use super::scope::{resolve_scope, Actor, EnrollmentDirectory, ScopePredicate};
use super::store::{RecordStore, StoreError};

/// Service composing the store, scope resolver, change notifier, and derived
/// export. Every operation resolves the caller's scope exactly once and every
/// mutation publishes exactly one change event.
pub struct RegistryService<S, X> {
    store: Arc<S>,
    notifier: ChangeNotifier,
    export: Arc<X>,
    enrollment: Arc<dyn EnrollmentDirectory>,
    budgets: OperationBudgets,
}

impl<S, X> RegistryService<S, X>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: ChangeNotifier,
        export: Arc<X>,
        enrollment: Arc<dyn EnrollmentDirectory>,
        budgets: OperationBudgets,
    ) -> Self {
        Self {
            store,
            notifier,
            export,
            enrollment,
            budgets,
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn budgets(&self) -> &OperationBudgets {
        &self.budgets
    }

    fn scope_for(&self, actor: &Actor) -> ScopePredicate {
        resolve_scope(actor, self.enrollment.as_ref())
    }

    fn scoped_records(&self, scope: &ScopePredicate) -> Result<Vec<StudentRecord>, ServiceError> {
        let records = self.store.list()?;
        Ok(records
            .into_iter()
            .filter(|record| scope.matches(record))
            .collect())
    }

    /// Records visible to the caller, optionally paginated. Absence of both
    /// parameters yields the bare unpaginated list for backward
    /// compatibility.
    pub fn list(
        &self,
        actor: &Actor,
        page: Option<usize>,
        limit: Option<usize>,
    ) -> Result<RecordListing, ServiceError> {
        let scope = self.deny_checked(actor)?;
        let records = self.scoped_records(&scope)?;

        if page.is_none() && limit.is_none() {
            return Ok(RecordListing::Full(records));
        }

        let limit = limit.unwrap_or(50).max(1);
        let page = page.unwrap_or(1).max(1);
        let total = records.len();
        let total_pages = total.div_ceil(limit).max(1);
        let start = (page - 1).saturating_mul(limit).min(total);
        let end = start.saturating_add(limit).min(total);

        Ok(RecordListing::Page {
            records: records[start..end].to_vec(),
            pagination: PageInfo {
                page,
                limit,
                total,
                total_pages,
            },
        })
    }

    /// Fetch one record. A record the predicate excludes is reported as
    /// absent so existence never leaks.
    pub fn get(&self, actor: &Actor, student_number: &str) -> Result<StudentRecord, ServiceError> {
        let scope = self.deny_checked(actor)?;
        self.visible_record(&scope, student_number)
    }

    pub fn create(
        &self,
        actor: &Actor,
        draft: StudentDraft,
    ) -> Result<StudentRecord, ServiceError> {
        let scope = self.deny_checked(actor)?;
        if !scope.admits(&draft) {
            return Err(ServiceError::Forbidden(actor.role.label()));
        }
        draft.validate()?;
        let record = self.store.insert(&draft)?;
        info!(student_number = %record.student_number.0, "record created");
        self.after_mutation(ChangeEvent::RecordCreated {
            record: record.clone(),
        });
        Ok(record)
    }

    pub fn update(
        &self,
        actor: &Actor,
        student_number: &str,
        patch: StudentPatch,
    ) -> Result<StudentRecord, ServiceError> {
        let scope = self.deny_checked(actor)?;
        self.visible_record(&scope, student_number)?;
        patch.validate()?;
        let record = self.store.update(student_number, &patch)?;
        info!(student_number, "record updated");
        self.after_mutation(ChangeEvent::RecordUpdated {
            record: record.clone(),
        });
        Ok(record)
    }

    /// Log an advising intervention. Counts as an update for change
    /// propagation.
    pub fn log_intervention(
        &self,
        actor: &Actor,
        student_number: &str,
        note: InterventionNote,
    ) -> Result<StudentRecord, ServiceError> {
        let scope = self.deny_checked(actor)?;
        self.visible_record(&scope, student_number)?;
        let record = self.store.append_intervention(student_number, note)?;
        info!(student_number, "intervention logged");
        self.after_mutation(ChangeEvent::RecordUpdated {
            record: record.clone(),
        });
        Ok(record)
    }

    /// Hard delete, unrestricted-scope callers only. Triggers re-export like
    /// any other mutation.
    pub fn delete(&self, actor: &Actor, student_number: &str) -> Result<(), ServiceError> {
        let scope = self.deny_checked(actor)?;
        if !scope.is_unrestricted() {
            return Err(ServiceError::Forbidden(actor.role.label()));
        }
        let record = self.store.delete(student_number)?;
        info!(student_number, "record deleted");
        self.after_mutation(ChangeEvent::RecordDeleted {
            student_number: record.student_number.0,
        });
        Ok(())
    }

    /// Classify the caller's scoped record set under the given thresholds.
    pub fn classify(
        &self,
        actor: &Actor,
        thresholds: &RiskThresholds,
    ) -> Result<ClassificationReport, ServiceError> {
        let scope = self.deny_checked(actor)?;
        let records = self.scoped_records(&scope)?;
        Ok(partition(&records, thresholds))
    }

    /// Ingest a tabular batch. Rows reconcile sequentially in input order;
    /// the batch ends with exactly one change event and one export
    /// regeneration, never one per row.
    pub fn import<R: Read>(&self, actor: &Actor, input: R) -> Result<ImportSummary, ServiceError> {
        let scope = self.deny_checked(actor)?;
        let rows = parse_rows(input).map_err(ServiceError::MalformedImport)?;
        let (summary, affected) = reconcile_rows(self.store.as_ref(), &scope, &rows);
        info!(
            rows = summary.rows_total,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            "batch reconciled"
        );
        self.after_mutation(ChangeEvent::BatchImported { records: affected });
        Ok(summary)
    }

    /// The derived roster for download; same content the export sink
    /// receives. Full-set export is a registry duty.
    pub fn roster_csv(&self, actor: &Actor) -> Result<String, ServiceError> {
        let scope = self.deny_checked(actor)?;
        if !scope.is_unrestricted() {
            return Err(ServiceError::Forbidden(actor.role.label()));
        }
        let records = self.store.list()?;
        render_roster(&records).map_err(ServiceError::MalformedImport)
    }

    fn deny_checked(&self, actor: &Actor) -> Result<ScopePredicate, ServiceError> {
        let scope = self.scope_for(actor);
        if scope.is_denied() {
            return Err(ServiceError::Forbidden(actor.role.label()));
        }
        Ok(scope)
    }

    fn visible_record(
        &self,
        scope: &ScopePredicate,
        student_number: &str,
    ) -> Result<StudentRecord, ServiceError> {
        let record = self.store.fetch(student_number)?;
        match record {
            Some(record) if scope.matches(&record) => Ok(record),
            // Hidden and absent are indistinguishable by design.
            _ => Err(ServiceError::Store(StoreError::NotFound)),
        }
    }

    /// Regenerate the derived export, then fan out the change event. The
    /// mutation has already committed; a sink failure degrades to a warning
    /// and the next mutation rewrites the roster.
    fn after_mutation(&self, event: ChangeEvent) {
        match self.store.list().map_err(ServiceError::Store).and_then(|records| {
            render_roster(&records).map_err(ServiceError::MalformedImport)
        }) {
            Ok(roster) => {
                if let Err(err) = self.export.publish(&roster) {
                    warn!(error = %err, "roster export regeneration failed");
                }
            }
            Err(err) => warn!(error = %err, "roster export rendering failed"),
        }
        self.notifier.publish(event);
    }
}

/// Error raised by the registry service; maps onto the API error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("role '{0}' has no access to individual records")]
    Forbidden(&'static str),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("import payload invalid: {0}")]
    MalformedImport(#[source] csv::Error),
}

/// Listing shape: a bare list when no pagination was requested, an envelope
/// otherwise. Callers must tolerate either.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RecordListing {
    Full(Vec<StudentRecord>),
    Page {
        records: Vec<StudentRecord>,
        pagination: PageInfo,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}
