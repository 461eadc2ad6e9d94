use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::config::OperationBudgets;
use crate::registry::domain::{StudentDraft, StudentPatch, Term};
use crate::registry::events::ChangeNotifier;
use crate::registry::export::{ExportError, ExportSink};
use crate::registry::scope::{Actor, EnrollmentDirectory, EnrollmentError, Role};
use crate::registry::service::RegistryService;
use crate::registry::store::{MemoryRecordStore, RecordStore, StoreError};

pub(super) fn draft(student_number: &str) -> StudentDraft {
    StudentDraft {
        student_number: student_number.to_string(),
        registration_number: None,
        unit_id: "CSC".to_string(),
        program: "Computer Science".to_string(),
        year_of_study: 2,
        term: Term::First,
        gpa: 3.4,
        attendance_rate: 88.0,
        balance: 0.0,
    }
}

pub(super) fn draft_in_unit(student_number: &str, unit_id: &str) -> StudentDraft {
    StudentDraft {
        unit_id: unit_id.to_string(),
        ..draft(student_number)
    }
}

pub(super) fn patch_gpa(gpa: f64) -> StudentPatch {
    StudentPatch {
        gpa: Some(gpa),
        ..StudentPatch::default()
    }
}

pub(super) fn registrar() -> Actor {
    Actor::for_role(Role::Registrar)
}

pub(super) fn system_operator() -> Actor {
    Actor::for_role(Role::SystemOperator)
}

pub(super) fn vice_chancellor() -> Actor {
    Actor::for_role(Role::ViceChancellor)
}

pub(super) fn dean_of(unit_id: &str) -> Actor {
    Actor {
        unit_id: Some(unit_id.to_string()),
        ..Actor::for_role(Role::Dean)
    }
}

pub(super) fn advisor_of(advisees: &[&str]) -> Actor {
    Actor {
        advisees: advisees.iter().map(|key| key.to_string()).collect(),
        ..Actor::for_role(Role::Advisor)
    }
}

pub(super) fn instructor_of(course_ids: &[&str]) -> Actor {
    Actor {
        course_ids: course_ids.iter().map(|id| id.to_string()).collect(),
        ..Actor::for_role(Role::CourseInstructor)
    }
}

/// Enrollment directory backed by a static map, as tests configure it.
#[derive(Default)]
pub(super) struct StaticEnrollment {
    courses: HashMap<String, Vec<String>>,
}

impl StaticEnrollment {
    pub(super) fn with_course(mut self, course_id: &str, students: &[&str]) -> Self {
        self.courses.insert(
            course_id.to_string(),
            students.iter().map(|key| key.to_string()).collect(),
        );
        self
    }
}

impl EnrollmentDirectory for StaticEnrollment {
    fn students_in_course(&self, course_id: &str) -> Result<Vec<String>, EnrollmentError> {
        Ok(self.courses.get(course_id).cloned().unwrap_or_default())
    }
}

/// Directory whose lookups always fail, to exercise fail-closed scoping.
pub(super) struct UnavailableEnrollment;

impl EnrollmentDirectory for UnavailableEnrollment {
    fn students_in_course(&self, _course_id: &str) -> Result<Vec<String>, EnrollmentError> {
        Err(EnrollmentError("directory offline".to_string()))
    }
}

/// Export sink that collects every regenerated roster for assertions.
#[derive(Default)]
pub(super) struct CollectingExportSink {
    rosters: Mutex<Vec<String>>,
}

impl CollectingExportSink {
    pub(super) fn rosters(&self) -> Vec<String> {
        self.rosters.lock().expect("sink mutex poisoned").clone()
    }
}

impl ExportSink for CollectingExportSink {
    fn publish(&self, roster_csv: &str) -> Result<(), ExportError> {
        self.rosters
            .lock()
            .expect("sink mutex poisoned")
            .push(roster_csv.to_string());
        Ok(())
    }
}

/// Store stub whose every operation reports the backend as offline.
pub(super) struct UnavailableStore;

impl RecordStore for UnavailableStore {
    fn insert(
        &self,
        _draft: &StudentDraft,
    ) -> Result<crate::registry::StudentRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _student_number: &str,
        _patch: &StudentPatch,
    ) -> Result<crate::registry::StudentRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn append_intervention(
        &self,
        _student_number: &str,
        _note: crate::registry::InterventionNote,
    ) -> Result<crate::registry::StudentRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _student_number: &str) -> Result<crate::registry::StudentRecord, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn fetch(
        &self,
        _student_number: &str,
    ) -> Result<Option<crate::registry::StudentRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<crate::registry::StudentRecord>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) type TestService = RegistryService<MemoryRecordStore, CollectingExportSink>;

pub(super) fn build_service() -> (
    Arc<TestService>,
    Arc<MemoryRecordStore>,
    Arc<CollectingExportSink>,
) {
    build_service_with_enrollment(StaticEnrollment::default())
}

pub(super) fn build_service_with_enrollment(
    enrollment: StaticEnrollment,
) -> (
    Arc<TestService>,
    Arc<MemoryRecordStore>,
    Arc<CollectingExportSink>,
) {
    let store = Arc::new(MemoryRecordStore::new());
    let sink = Arc::new(CollectingExportSink::default());
    let service = Arc::new(RegistryService::new(
        store.clone(),
        ChangeNotifier::default(),
        sink.clone(),
        Arc::new(enrollment),
        OperationBudgets::default(),
    ));
    (service, store, sink)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
