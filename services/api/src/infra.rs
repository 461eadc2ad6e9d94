use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use student_standing::registry::{EnrollmentDirectory, EnrollmentError, ExportError, ExportSink};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Enrollment directory backed by the `APP_COURSE_ROSTERS` setting. The
/// format is `COURSE:key|key;COURSE:key`; an upstream student-information
/// system replaces this in larger deployments.
#[derive(Default, Clone)]
pub(crate) struct StaticEnrollmentDirectory {
    courses: HashMap<String, Vec<String>>,
}

impl StaticEnrollmentDirectory {
    pub(crate) fn from_setting(raw: &str) -> Self {
        let mut courses = HashMap::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((course_id, keys)) = entry.split_once(':') else {
                continue;
            };
            let students: Vec<String> = keys
                .split('|')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect();
            courses.insert(course_id.trim().to_string(), students);
        }
        Self { courses }
    }
}

impl EnrollmentDirectory for StaticEnrollmentDirectory {
    fn students_in_course(&self, course_id: &str) -> Result<Vec<String>, EnrollmentError> {
        Ok(self.courses.get(course_id).cloned().unwrap_or_default())
    }
}

/// Sink for runs that do not publish a roster anywhere (offline reports).
pub(crate) struct DiscardExportSink;

impl ExportSink for DiscardExportSink {
    fn publish(&self, _roster_csv: &str) -> Result<(), ExportError> {
        Ok(())
    }
}
