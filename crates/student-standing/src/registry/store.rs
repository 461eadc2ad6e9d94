use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::domain::{InterventionNote, RecordId, StudentDraft, StudentPatch, StudentRecord};

/// Storage abstraction so the service and reconciler can be exercised against
/// stub stores in tests.
pub trait RecordStore: Send + Sync {
    fn insert(&self, draft: &StudentDraft) -> Result<StudentRecord, StoreError>;
    fn update(&self, student_number: &str, patch: &StudentPatch)
        -> Result<StudentRecord, StoreError>;
    fn append_intervention(
        &self,
        student_number: &str,
        note: InterventionNote,
    ) -> Result<StudentRecord, StoreError>;
    fn delete(&self, student_number: &str) -> Result<StudentRecord, StoreError>;
    fn fetch(&self, student_number: &str) -> Result<Option<StudentRecord>, StoreError>;
    fn list(&self) -> Result<Vec<StudentRecord>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// The authoritative in-process store. Writes are serialized behind one
/// mutex, so concurrent creates for the same key race safely: exactly one
/// succeeds, the other observes `Conflict`.
#[derive(Default, Clone)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<BTreeMap<String, StudentRecord>>>,
    sequence: Arc<AtomicU64>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, StudentRecord>>, StoreError>
    {
        self.records
            .lock()
            .map_err(|_| StoreError::Unavailable("record store mutex poisoned".to_string()))
    }
}

impl RecordStore for MemoryRecordStore {
    fn insert(&self, draft: &StudentDraft) -> Result<StudentRecord, StoreError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&draft.student_number) {
            return Err(StoreError::Conflict);
        }
        let id = RecordId(self.sequence.fetch_add(1, Ordering::Relaxed) + 1);
        let record = draft.to_record(id);
        // The legacy registration number carries its own uniqueness
        // constraint.
        if guard
            .values()
            .any(|existing| existing.registration_number == record.registration_number)
        {
            return Err(StoreError::Conflict);
        }
        guard.insert(record.student_number.0.clone(), record.clone());
        Ok(record)
    }

    fn update(
        &self,
        student_number: &str,
        patch: &StudentPatch,
    ) -> Result<StudentRecord, StoreError> {
        let mut guard = self.lock()?;
        let record = guard.get_mut(student_number).ok_or(StoreError::NotFound)?;
        patch.apply(record);
        Ok(record.clone())
    }

    fn append_intervention(
        &self,
        student_number: &str,
        note: InterventionNote,
    ) -> Result<StudentRecord, StoreError> {
        let mut guard = self.lock()?;
        let record = guard.get_mut(student_number).ok_or(StoreError::NotFound)?;
        record.interventions.push(note);
        Ok(record.clone())
    }

    fn delete(&self, student_number: &str) -> Result<StudentRecord, StoreError> {
        let mut guard = self.lock()?;
        guard.remove(student_number).ok_or(StoreError::NotFound)
    }

    fn fetch(&self, student_number: &str) -> Result<Option<StudentRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.get(student_number).cloned())
    }

    fn list(&self) -> Result<Vec<StudentRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.values().cloned().collect())
    }
}
