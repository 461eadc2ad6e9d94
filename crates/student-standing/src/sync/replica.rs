use tracing::warn;

use crate::registry::{ChangeEvent, RecordId, StudentRecord};

use super::backoff::RetryPolicy;
use super::{ClientMutation, GatewayError, MutationAck, RecordGateway, ReplicaCache};

/// Confirmation state of one local entry. Pending mutations are explicit
/// values, not implicit UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Matches the server's canonical version.
    Confirmed,
    /// Applied locally, awaiting the authoritative result.
    Optimistic,
    /// The authoritative request failed; the entry is local-only and the
    /// user must see that it is unconfirmed.
    FailedLocalOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaEntry {
    pub record: StudentRecord,
    pub state: EntryState,
}

/// How the replica came up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Live data from the authoritative gateway.
    Live,
    /// Gateway unreachable; serving the last-known-good cache.
    CachedFallback,
    /// Gateway unreachable and no usable cache; empty but valid.
    Empty,
}

/// Per-client optimistic replica of the visible record subset.
pub struct ClientReplica<G, C> {
    gateway: G,
    cache: C,
    retry: RetryPolicy,
    entries: Vec<ReplicaEntry>,
    /// Records removed by a delete the server has not confirmed. The UI
    /// surfaces these as unconfirmed removals until a reconnect refetch or
    /// a delete event resolves them.
    failed_deletes: Vec<StudentRecord>,
    online: bool,
}

impl<G, C> ClientReplica<G, C>
where
    G: RecordGateway,
    C: ReplicaCache,
{
    pub fn new(gateway: G, cache: C, retry: RetryPolicy) -> Self {
        Self {
            gateway,
            cache,
            retry,
            entries: Vec::new(),
            failed_deletes: Vec::new(),
            online: false,
        }
    }

    pub fn entries(&self) -> &[ReplicaEntry] {
        &self.entries
    }

    pub fn records(&self) -> Vec<&StudentRecord> {
        self.entries.iter().map(|entry| &entry.record).collect()
    }

    pub fn entry(&self, student_number: &str) -> Option<&ReplicaEntry> {
        self.entries
            .iter()
            .find(|entry| entry.record.student_number.as_str() == student_number)
    }

    /// Records whose removal the server rejected or never acknowledged.
    pub fn failed_deletes(&self) -> &[StudentRecord] {
        &self.failed_deletes
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Fetch the authoritative set; on connectivity failure fall back to a
    /// non-empty persisted cache, else an empty-but-valid state. Never an
    /// error state that blocks the UI.
    pub fn initial_load(&mut self) -> LoadOutcome {
        match self.call_with_retries(|gateway| gateway.fetch_all()) {
            Ok(records) => {
                self.entries = confirmed_entries(records);
                self.online = true;
                self.persist();
                LoadOutcome::Live
            }
            Err(err) => {
                warn!(error = %err, "initial load failed; falling back to cache");
                self.online = false;
                match self.cache.load().filter(|cached| !cached.is_empty()) {
                    Some(cached) => {
                        self.entries = confirmed_entries(cached);
                        LoadOutcome::CachedFallback
                    }
                    None => {
                        self.entries.clear();
                        LoadOutcome::Empty
                    }
                }
            }
        }
    }

    /// Apply a mutation optimistically, then issue the authoritative
    /// request. On success the optimistic entry is replaced with the
    /// server's canonical version; on failure it stays, marked local-only.
    /// A failed delete keeps the removed record in `failed_deletes` so the
    /// pending removal stays visible as unconfirmed.
    pub fn submit(&mut self, mutation: ClientMutation) -> Result<(), GatewayError> {
        let removed = self.apply_optimistic(&mutation);

        match self.call_with_retries(|gateway| gateway.apply(&mutation)) {
            Ok(MutationAck::Record(canonical)) => {
                self.upsert(canonical, EntryState::Confirmed);
                self.persist();
                Ok(())
            }
            Ok(MutationAck::Deleted { student_number }) => {
                self.remove(&student_number);
                self.persist();
                Ok(())
            }
            Err(err) => {
                match removed {
                    Some(record) => self.failed_deletes.push(record),
                    None => {
                        if let Some(entry) = self.entries.iter_mut().find(|entry| {
                            entry.record.student_number.as_str() == mutation.student_number()
                        }) {
                            entry.state = EntryState::FailedLocalOnly;
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Apply a replayed change event by business-key matching, independent
    /// of local optimistic state. Application is deduplicating: replaying
    /// the same created-record event twice yields one entry, and a delete
    /// for an unheld key is a no-op.
    pub fn apply_event(&mut self, event: &ChangeEvent) {
        match event {
            ChangeEvent::RecordCreated { record } | ChangeEvent::RecordUpdated { record } => {
                self.upsert(record.clone(), EntryState::Confirmed);
            }
            ChangeEvent::RecordDeleted { student_number } => {
                self.remove(student_number);
                // Another writer removed the record; a locally failed
                // delete for the same key is resolved.
                self.failed_deletes
                    .retain(|record| record.student_number.as_str() != student_number);
            }
            // Batches merge by upsert; records absent from the batch are
            // never discarded. Full refreshes only happen via reconnect.
            ChangeEvent::BatchImported { records } => {
                for record in records {
                    self.upsert(record.clone(), EntryState::Confirmed);
                }
            }
        }
        self.persist();
    }

    /// After a disconnect, refetch the authoritative set rather than
    /// trusting missed events. Unconfirmed local-only entries survive the
    /// refresh until the server knows about them.
    pub fn reconnect(&mut self) -> Result<(), GatewayError> {
        let records = self.call_with_retries(|gateway| gateway.fetch_all())?;
        let local_only: Vec<ReplicaEntry> = self
            .entries
            .drain(..)
            .filter(|entry| {
                entry.state != EntryState::Confirmed
                    && !records
                        .iter()
                        .any(|record| record.student_number == entry.record.student_number)
            })
            .collect();
        self.entries = confirmed_entries(records);
        self.entries.extend(local_only);
        // The refetch is authoritative; pending deletes are resolved one
        // way or the other by the server's record set.
        self.failed_deletes.clear();
        self.online = true;
        self.persist();
        Ok(())
    }

    /// Returns the record a delete removed, for failure tracking.
    fn apply_optimistic(&mut self, mutation: &ClientMutation) -> Option<StudentRecord> {
        match mutation {
            ClientMutation::Create(draft) => {
                // Temporary id until the server assigns the real one.
                let record = draft.to_record(RecordId(0));
                self.upsert(record, EntryState::Optimistic);
                None
            }
            ClientMutation::Update {
                student_number,
                patch,
            } => {
                if let Some(entry) = self
                    .entries
                    .iter_mut()
                    .find(|entry| entry.record.student_number.as_str() == student_number)
                {
                    patch.apply(&mut entry.record);
                    entry.state = EntryState::Optimistic;
                }
                None
            }
            ClientMutation::Delete { student_number } => self.take(student_number),
        }
    }

    fn take(&mut self, student_number: &str) -> Option<StudentRecord> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.record.student_number.as_str() == student_number)?;
        Some(self.entries.remove(index).record)
    }

    fn upsert(&mut self, record: StudentRecord, state: EntryState) {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.record.student_number == record.student_number)
        {
            Some(entry) => {
                entry.record = record;
                entry.state = state;
            }
            None => self.entries.push(ReplicaEntry { record, state }),
        }
    }

    fn remove(&mut self, student_number: &str) {
        self.entries
            .retain(|entry| entry.record.student_number.as_str() != student_number);
    }

    fn persist(&self) {
        let confirmed: Vec<StudentRecord> = self
            .entries
            .iter()
            .filter(|entry| entry.state == EntryState::Confirmed)
            .map(|entry| entry.record.clone())
            .collect();
        self.cache.store(&confirmed);
    }

    fn call_with_retries<T>(
        &self,
        mut call: impl FnMut(&G) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let mut attempt = 0;
        loop {
            match call(&self.gateway) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(hint) = err.retry_hint() else {
                        return Err(err);
                    };
                    match self.retry.delay_for(attempt, hint) {
                        Some(delay) => {
                            if !delay.is_zero() {
                                std::thread::sleep(delay);
                            }
                            attempt += 1;
                        }
                        None => return Err(err),
                    }
                }
            }
        }
    }
}

fn confirmed_entries(records: Vec<StudentRecord>) -> Vec<ReplicaEntry> {
    records
        .into_iter()
        .map(|record| ReplicaEntry {
            record,
            state: EntryState::Confirmed,
        })
        .collect()
}
