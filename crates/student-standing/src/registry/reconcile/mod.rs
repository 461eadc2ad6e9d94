//! Idempotent bulk reconciliation of tabular imports against the record
//! store. Rows are processed sequentially in input order so later rows see
//! earlier rows' writes; one failing row never aborts the batch.

mod headers;
mod parser;

use serde::{Deserialize, Serialize};

use super::domain::{StudentDraft, StudentPatch, Term};
use super::scope::ScopePredicate;
use super::store::{RecordStore, StoreError};
use super::StudentRecord;

pub(crate) use parser::parse_rows;

use parser::RawRow;

/// Human-readable diagnostic for one row that was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDiagnostic {
    /// 1-based data-row number; the header row is not counted.
    pub row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_number: Option<String>,
    pub message: String,
}

/// Structured outcome of one batch. Returned in full even on partial
/// failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub rows_total: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: Vec<RowDiagnostic>,
}

/// Reconcile parsed rows against the store under the caller's scope.
/// Returns the summary plus the records the batch actually touched, in row
/// order, for the single batch change event.
pub(crate) fn reconcile_rows<S: RecordStore + ?Sized>(
    store: &S,
    scope: &ScopePredicate,
    rows: &[RawRow],
) -> (ImportSummary, Vec<StudentRecord>) {
    let mut summary = ImportSummary {
        rows_total: rows.len(),
        ..ImportSummary::default()
    };
    let mut affected = Vec::new();

    for row in rows {
        match reconcile_row(store, scope, row) {
            Ok(RowOutcome::Created(record)) => {
                summary.created += 1;
                affected.push(record);
            }
            Ok(RowOutcome::Updated(record)) => {
                summary.updated += 1;
                affected.push(record);
            }
            Err(diagnostic) => {
                summary.skipped += 1;
                summary.errors.push(diagnostic);
            }
        }
    }

    (summary, affected)
}

enum RowOutcome {
    Created(StudentRecord),
    Updated(StudentRecord),
}

fn reconcile_row<S: RecordStore + ?Sized>(
    store: &S,
    scope: &ScopePredicate,
    row: &RawRow,
) -> Result<RowOutcome, RowDiagnostic> {
    let Some(student_number) = row.get(headers::STUDENT_NUMBER).map(str::to_string) else {
        return Err(RowDiagnostic {
            row: row.row,
            student_number: None,
            message: "missing student number".to_string(),
        });
    };

    let existing = store
        .fetch(&student_number)
        .map_err(|err| store_diagnostic(row, &student_number, &err))?;

    match existing {
        Some(record) => {
            if !scope.matches(&record) {
                return Err(scope_diagnostic(row, &student_number));
            }
            apply_update(store, row, &student_number)
        }
        None => attempt_create(store, scope, row, &student_number),
    }
}

/// Partial update: only fields present and parseable in the row overwrite
/// stored values. No further validation; the record already exists.
fn apply_update<S: RecordStore + ?Sized>(
    store: &S,
    row: &RawRow,
    student_number: &str,
) -> Result<RowOutcome, RowDiagnostic> {
    let patch = patch_from_row(row);
    store
        .update(student_number, &patch)
        .map(RowOutcome::Updated)
        .map_err(|err| store_diagnostic(row, student_number, &err))
}

fn attempt_create<S: RecordStore + ?Sized>(
    store: &S,
    scope: &ScopePredicate,
    row: &RawRow,
    student_number: &str,
) -> Result<RowOutcome, RowDiagnostic> {
    let draft = draft_from_row(row, student_number)?;

    if !scope.admits(&draft) {
        return Err(scope_diagnostic(row, student_number));
    }

    draft.validate().map_err(|err| RowDiagnostic {
        row: row.row,
        student_number: Some(student_number.to_string()),
        message: err.to_string(),
    })?;

    match store.insert(&draft) {
        Ok(record) => Ok(RowOutcome::Created(record)),
        // Lost a race against a concurrent create for the same key; the
        // record exists now, so retry as an update.
        Err(StoreError::Conflict) => apply_update(store, row, student_number),
        Err(err) => Err(store_diagnostic(row, student_number, &err)),
    }
}

fn patch_from_row(row: &RawRow) -> StudentPatch {
    StudentPatch {
        unit_id: row.get(headers::UNIT_ID).map(str::to_string),
        program: row.get(headers::PROGRAM).map(str::to_string),
        year_of_study: row.get(headers::YEAR_OF_STUDY).and_then(|raw| raw.parse().ok()),
        term: row.get(headers::TERM).and_then(Term::parse),
        gpa: row.get(headers::GPA).and_then(|raw| raw.parse().ok()),
        attendance_rate: row
            .get(headers::ATTENDANCE_RATE)
            .and_then(|raw| raw.parse().ok()),
        balance: row.get(headers::BALANCE).and_then(|raw| raw.parse().ok()),
    }
}

/// Build a creation draft. Absent optional fields take neutral defaults;
/// present-but-unparseable fields reject the row with a diagnostic naming
/// the field.
fn draft_from_row(row: &RawRow, student_number: &str) -> Result<StudentDraft, RowDiagnostic> {
    let field_diagnostic = |field: &str, raw: &str| RowDiagnostic {
        row: row.row,
        student_number: Some(student_number.to_string()),
        message: format!("unparseable {field}: '{raw}'"),
    };

    let year_of_study = match row.get(headers::YEAR_OF_STUDY) {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| field_diagnostic("year_of_study", raw))?,
        None => 1,
    };
    let term = match row.get(headers::TERM) {
        Some(raw) => Term::parse(raw).ok_or_else(|| field_diagnostic("term", raw))?,
        None => Term::First,
    };
    let gpa = match row.get(headers::GPA) {
        Some(raw) => raw.parse::<f64>().map_err(|_| field_diagnostic("gpa", raw))?,
        None => 0.0,
    };
    let attendance_rate = match row.get(headers::ATTENDANCE_RATE) {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| field_diagnostic("attendance_rate", raw))?,
        None => 0.0,
    };
    let balance = match row.get(headers::BALANCE) {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| field_diagnostic("balance", raw))?,
        None => 0.0,
    };

    Ok(StudentDraft {
        student_number: student_number.to_string(),
        registration_number: row.get(headers::REGISTRATION_NUMBER).map(str::to_string),
        unit_id: row.get(headers::UNIT_ID).unwrap_or_default().to_string(),
        program: row.get(headers::PROGRAM).unwrap_or_default().to_string(),
        year_of_study,
        term,
        gpa,
        attendance_rate,
        balance,
    })
}

fn scope_diagnostic(row: &RawRow, student_number: &str) -> RowDiagnostic {
    RowDiagnostic {
        row: row.row,
        student_number: Some(student_number.to_string()),
        message: "outside caller scope".to_string(),
    }
}

fn store_diagnostic(row: &RawRow, student_number: &str, err: &StoreError) -> RowDiagnostic {
    RowDiagnostic {
        row: row.row,
        student_number: Some(student_number.to_string()),
        message: err.to_string(),
    }
}
