//! End-to-end replica coverage: a client replica driven by the registry
//! service through the gateway seam, with change events replayed off the
//! service's broadcast channel.

use std::io::Cursor;
use std::sync::Arc;

use student_standing::config::OperationBudgets;
use student_standing::registry::{
    Actor, ChangeEvent, ChangeNotifier, EnrollmentDirectory, EnrollmentError, ExportError,
    ExportSink, MemoryRecordStore, RecordListing, RegistryService, Role, ServiceError,
    StoreError, StudentDraft, StudentPatch, StudentRecord, Term,
};
use student_standing::sync::{
    ClientMutation, ClientReplica, EntryState, GatewayError, LoadOutcome, MutationAck,
    RecordGateway, ReplicaCache, RetryPolicy,
};
use tokio::sync::broadcast;

struct NullSink;

impl ExportSink for NullSink {
    fn publish(&self, _roster_csv: &str) -> Result<(), ExportError> {
        Ok(())
    }
}

struct NoEnrollment;

impl EnrollmentDirectory for NoEnrollment {
    fn students_in_course(&self, _course_id: &str) -> Result<Vec<String>, EnrollmentError> {
        Ok(Vec::new())
    }
}

struct NoCache;

impl ReplicaCache for NoCache {
    fn load(&self) -> Option<Vec<StudentRecord>> {
        None
    }

    fn store(&self, _records: &[StudentRecord]) {}
}

type Service = RegistryService<MemoryRecordStore, NullSink>;

/// Gateway speaking directly to the in-process service, as a deployed
/// client would over HTTP.
struct ServiceGateway {
    service: Arc<Service>,
    actor: Actor,
}

fn gateway_error(err: ServiceError) -> GatewayError {
    match err {
        ServiceError::Store(StoreError::Unavailable(reason)) => GatewayError::Transient(reason),
        other => GatewayError::Rejected(other.to_string()),
    }
}

impl RecordGateway for ServiceGateway {
    fn fetch_all(&self) -> Result<Vec<StudentRecord>, GatewayError> {
        match self.service.list(&self.actor, None, None) {
            Ok(RecordListing::Full(records)) => Ok(records),
            Ok(RecordListing::Page { records, .. }) => Ok(records),
            Err(err) => Err(gateway_error(err)),
        }
    }

    fn apply(&self, mutation: &ClientMutation) -> Result<MutationAck, GatewayError> {
        match mutation {
            ClientMutation::Create(draft) => self
                .service
                .create(&self.actor, draft.clone())
                .map(MutationAck::Record)
                .map_err(gateway_error),
            ClientMutation::Update {
                student_number,
                patch,
            } => self
                .service
                .update(&self.actor, student_number, patch.clone())
                .map(MutationAck::Record)
                .map_err(gateway_error),
            ClientMutation::Delete { student_number } => self
                .service
                .delete(&self.actor, student_number)
                .map(|()| MutationAck::Deleted {
                    student_number: student_number.clone(),
                })
                .map_err(gateway_error),
        }
    }
}

fn registrar() -> Actor {
    Actor::for_role(Role::Registrar)
}

fn build() -> (
    Arc<Service>,
    broadcast::Receiver<ChangeEvent>,
    ClientReplica<ServiceGateway, NoCache>,
) {
    let service = Arc::new(RegistryService::new(
        Arc::new(MemoryRecordStore::new()),
        ChangeNotifier::default(),
        Arc::new(NullSink),
        Arc::new(NoEnrollment),
        OperationBudgets::default(),
    ));
    let receiver = service.notifier().subscribe();
    let gateway = ServiceGateway {
        service: service.clone(),
        actor: registrar(),
    };
    let replica = ClientReplica::new(gateway, NoCache, RetryPolicy::immediate(2));
    (service, receiver, replica)
}

fn draft(student_number: &str) -> StudentDraft {
    StudentDraft {
        student_number: student_number.to_string(),
        registration_number: None,
        unit_id: "SCI".to_string(),
        program: "Physics".to_string(),
        year_of_study: 1,
        term: Term::First,
        gpa: 3.0,
        attendance_rate: 92.0,
        balance: 0.0,
    }
}

#[test]
fn submitted_mutations_land_on_the_server_and_confirm_locally() {
    let (service, _receiver, mut replica) = build();
    assert_eq!(replica.initial_load(), LoadOutcome::Live);

    replica
        .submit(ClientMutation::Create(draft("S001")))
        .expect("create submits");

    let entry = replica.entry("S001").expect("local entry");
    assert_eq!(entry.state, EntryState::Confirmed);
    // The canonical record carries the store-assigned id, not the
    // optimistic placeholder.
    let server = service.get(&registrar(), "S001").expect("server record");
    assert_eq!(entry.record.id, server.id);
}

#[test]
fn rejected_mutations_stay_visible_as_local_only() {
    let (service, _receiver, mut replica) = build();
    service
        .create(&registrar(), draft("S001"))
        .expect("server-side create");
    replica.initial_load();

    // Duplicate key: the server rejects, the optimistic entry survives.
    let result = replica.submit(ClientMutation::Create(draft("S001")));
    assert!(matches!(result, Err(GatewayError::Rejected(_))));
    assert_eq!(
        replica.entry("S001").expect("entry").state,
        EntryState::FailedLocalOnly
    );
}

#[test]
fn change_events_from_other_writers_converge_the_replica() {
    let (service, mut receiver, mut replica) = build();
    replica.initial_load();

    service
        .create(&registrar(), draft("S001"))
        .expect("create elsewhere");
    service
        .update(
            &registrar(),
            "S001",
            StudentPatch {
                gpa: Some(1.2),
                ..StudentPatch::default()
            },
        )
        .expect("update elsewhere");

    while let Ok(event) = receiver.try_recv() {
        replica.apply_event(&event);
    }

    let entry = replica.entry("S001").expect("propagated entry");
    assert_eq!(entry.state, EntryState::Confirmed);
    assert_eq!(entry.record.gpa, 1.2);
}

#[test]
fn a_batch_import_arrives_as_one_merging_event() {
    let (service, mut receiver, mut replica) = build();
    replica.initial_load();
    replica.apply_event(&ChangeEvent::RecordCreated {
        record: draft("S000").to_record(student_standing::registry::RecordId(1)),
    });

    let csv = "student_number,program\nS001,Physics\nS002,Chemistry\n";
    service
        .import(&registrar(), Cursor::new(csv.as_bytes().to_vec()))
        .expect("import");

    let event = receiver.try_recv().expect("batch event");
    assert!(matches!(event, ChangeEvent::BatchImported { .. }));
    replica.apply_event(&event);
    assert!(receiver.try_recv().is_err(), "exactly one event per batch");

    // Batch merges never discard records absent from the batch.
    assert_eq!(replica.records().len(), 3);
    assert!(replica.entry("S000").is_some());
}

#[test]
fn delete_events_remove_the_local_entry() {
    let (service, mut receiver, mut replica) = build();
    service
        .create(&registrar(), draft("S001"))
        .expect("server-side create");
    replica.initial_load();
    // Drain the create event the replica already saw via the load.
    while receiver.try_recv().is_ok() {}

    service.delete(&registrar(), "S001").expect("delete");
    let event = receiver.try_recv().expect("delete event");
    replica.apply_event(&event);
    assert!(replica.entry("S001").is_none());
}
