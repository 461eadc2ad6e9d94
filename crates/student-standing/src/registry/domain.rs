use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier, stable for the record's lifetime.
///
/// Used for UI addressing only; matching and deduplication always go through
/// the student number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

/// The externally meaningful business key. Unique across all records and
/// immutable once set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentNumber(pub String);

impl StudentNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Fixed two-value term enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    First,
    Second,
}

impl Term {
    pub const fn label(self) -> &'static str {
        match self {
            Term::First => "first",
            Term::Second => "second",
        }
    }

    /// Accepts the spellings seen in legacy exports ("1", "First Semester",
    /// "sem 2", ...).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "1" | "first" | "first semester" | "sem 1" | "sem1" | "s1" => Some(Term::First),
            "2" | "second" | "second semester" | "sem 2" | "sem2" | "s2" => Some(Term::Second),
            _ => None,
        }
    }
}

/// An advising or support action logged against a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionNote {
    pub logged_on: NaiveDate,
    pub author: String,
    pub note: String,
}

/// The central entity: one student's academic and financial standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub id: RecordId,
    pub student_number: StudentNumber,
    /// Legacy secondary key kept unique alongside the student number.
    pub registration_number: String,
    /// Organizational unit (faculty or department); may be empty.
    pub unit_id: String,
    pub program: String,
    pub year_of_study: u32,
    pub term: Term,
    pub gpa: f64,
    pub attendance_rate: f64,
    pub balance: f64,
    #[serde(default)]
    pub interventions: Vec<InterventionNote>,
}

/// Field-scoped validation failure, named so diagnostics can point at the
/// offending column.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Payload for creating a record. All structural constraints are enforced
/// before the draft reaches the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDraft {
    pub student_number: String,
    /// Defaults to the student number when absent; legacy uniqueness shim.
    #[serde(default)]
    pub registration_number: Option<String>,
    #[serde(default)]
    pub unit_id: String,
    pub program: String,
    pub year_of_study: u32,
    pub term: Term,
    pub gpa: f64,
    pub attendance_rate: f64,
    pub balance: f64,
}

impl StudentDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.student_number.trim().is_empty() {
            return Err(ValidationError::new("student_number", "must not be empty"));
        }
        if self.program.trim().is_empty() {
            return Err(ValidationError::new("program", "must not be empty"));
        }
        if self.year_of_study < 1 {
            return Err(ValidationError::new("year_of_study", "must be at least 1"));
        }
        validate_gpa(self.gpa)?;
        validate_attendance(self.attendance_rate)?;
        validate_balance(self.balance)?;
        Ok(())
    }

    /// Materialize the record the store will hold, applying the
    /// registration-number compatibility shim.
    pub fn to_record(&self, id: RecordId) -> StudentRecord {
        let registration_number = self
            .registration_number
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.student_number.clone());

        StudentRecord {
            id,
            student_number: StudentNumber(self.student_number.clone()),
            registration_number,
            unit_id: self.unit_id.clone(),
            program: self.program.clone(),
            year_of_study: self.year_of_study,
            term: self.term,
            gpa: self.gpa,
            attendance_rate: self.attendance_rate,
            balance: self.balance,
            interventions: Vec::new(),
        }
    }
}

/// Partial update payload. Absent fields leave the stored value untouched;
/// the student number itself is immutable and has no slot here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_of_study: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<Term>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.unit_id.is_none()
            && self.program.is_none()
            && self.year_of_study.is_none()
            && self.term.is_none()
            && self.gpa.is_none()
            && self.attendance_rate.is_none()
            && self.balance.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(program) = &self.program {
            if program.trim().is_empty() {
                return Err(ValidationError::new("program", "must not be empty"));
            }
        }
        if let Some(year) = self.year_of_study {
            if year < 1 {
                return Err(ValidationError::new("year_of_study", "must be at least 1"));
            }
        }
        if let Some(gpa) = self.gpa {
            validate_gpa(gpa)?;
        }
        if let Some(rate) = self.attendance_rate {
            validate_attendance(rate)?;
        }
        if let Some(balance) = self.balance {
            validate_balance(balance)?;
        }
        Ok(())
    }

    pub fn apply(&self, record: &mut StudentRecord) {
        if let Some(unit_id) = &self.unit_id {
            record.unit_id = unit_id.clone();
        }
        if let Some(program) = &self.program {
            record.program = program.clone();
        }
        if let Some(year) = self.year_of_study {
            record.year_of_study = year;
        }
        if let Some(term) = self.term {
            record.term = term;
        }
        if let Some(gpa) = self.gpa {
            record.gpa = gpa;
        }
        if let Some(rate) = self.attendance_rate {
            record.attendance_rate = rate;
        }
        if let Some(balance) = self.balance {
            record.balance = balance;
        }
    }
}

fn validate_gpa(gpa: f64) -> Result<(), ValidationError> {
    if !(0.0..=5.0).contains(&gpa) {
        return Err(ValidationError::new(
            "gpa",
            format!("must be within 0..=5 (got {gpa})"),
        ));
    }
    Ok(())
}

fn validate_attendance(rate: f64) -> Result<(), ValidationError> {
    if !(0.0..=100.0).contains(&rate) {
        return Err(ValidationError::new(
            "attendance_rate",
            format!("must be within 0..=100 (got {rate})"),
        ));
    }
    Ok(())
}

fn validate_balance(balance: f64) -> Result<(), ValidationError> {
    if balance < 0.0 {
        return Err(ValidationError::new(
            "balance",
            format!("must not be negative (got {balance})"),
        ));
    }
    Ok(())
}
