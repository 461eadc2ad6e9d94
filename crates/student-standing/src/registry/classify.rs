use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::StudentRecord;

/// Per-request classification cutoffs. Never persisted with records;
/// changing them only reclassifies on the fly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub gpa_floor: f64,
    pub attendance_floor: f64,
    pub balance_ceiling: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            gpa_floor: 2.0,
            attendance_floor: 75.0,
            balance_ceiling: 0.0,
        }
    }
}

/// Independent, non-exclusive risk labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLabel {
    FinancialRisk,
    AttendanceRisk,
    AcademicRisk,
    IncompleteRecord,
}

/// The full label set for one record. A record qualifying for several
/// categories carries all of them; boundary comparisons are strict
/// (`>` for balance, `<` for attendance and gpa).
pub fn classify(record: &StudentRecord, thresholds: &RiskThresholds) -> BTreeSet<RiskLabel> {
    let mut labels = BTreeSet::new();
    if record.balance > thresholds.balance_ceiling {
        labels.insert(RiskLabel::FinancialRisk);
    }
    if record.attendance_rate < thresholds.attendance_floor {
        labels.insert(RiskLabel::AttendanceRisk);
    }
    if record.gpa < thresholds.gpa_floor {
        labels.insert(RiskLabel::AcademicRisk);
    }
    if record.student_number.as_str().trim().is_empty() || record.program.trim().is_empty() {
        labels.insert(RiskLabel::IncompleteRecord);
    }
    labels
}

/// Per-category totals for the scoped set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    pub financial_risk: usize,
    pub attendance_risk: usize,
    pub academic_risk: usize,
    pub incomplete_record: usize,
    pub no_issues: usize,
    pub total: usize,
}

/// Full partition of a record set. `no_issues` is the exact complement of
/// the four risk categories, computed once over the whole set.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub thresholds: RiskThresholds,
    pub financial_risk: Vec<StudentRecord>,
    pub attendance_risk: Vec<StudentRecord>,
    pub academic_risk: Vec<StudentRecord>,
    pub incomplete_record: Vec<StudentRecord>,
    pub no_issues: Vec<StudentRecord>,
    pub counts: CategoryCounts,
}

pub fn partition(records: &[StudentRecord], thresholds: &RiskThresholds) -> ClassificationReport {
    let mut report = ClassificationReport {
        thresholds: *thresholds,
        financial_risk: Vec::new(),
        attendance_risk: Vec::new(),
        academic_risk: Vec::new(),
        incomplete_record: Vec::new(),
        no_issues: Vec::new(),
        counts: CategoryCounts {
            financial_risk: 0,
            attendance_risk: 0,
            academic_risk: 0,
            incomplete_record: 0,
            no_issues: 0,
            total: records.len(),
        },
    };

    for record in records {
        let labels = classify(record, thresholds);
        if labels.is_empty() {
            report.no_issues.push(record.clone());
            continue;
        }
        for label in labels {
            match label {
                RiskLabel::FinancialRisk => report.financial_risk.push(record.clone()),
                RiskLabel::AttendanceRisk => report.attendance_risk.push(record.clone()),
                RiskLabel::AcademicRisk => report.academic_risk.push(record.clone()),
                RiskLabel::IncompleteRecord => report.incomplete_record.push(record.clone()),
            }
        }
    }

    report.counts.financial_risk = report.financial_risk.len();
    report.counts.attendance_risk = report.attendance_risk.len();
    report.counts.academic_risk = report.academic_risk.len();
    report.counts.incomplete_record = report.incomplete_record.len();
    report.counts.no_issues = report.no_issues.len();
    report
}
