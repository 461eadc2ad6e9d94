use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Path, Query, State,
    },
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::debug;

use super::classify::RiskThresholds;
use super::domain::{InterventionNote, StudentDraft, StudentPatch};
use super::events::ChangeEvent;
use super::export::ExportSink;
use super::scope::{Actor, Role};
use super::service::{RegistryService, ServiceError};
use super::store::{RecordStore, StoreError};

/// Router exposing the registry over `/api/v1/students`. Authentication is
/// an upstream collaborator; the caller's identity arrives as `x-actor-*`
/// headers.
pub fn registry_router<S, X>(service: Arc<RegistryService<S, X>>) -> Router
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/students",
            get(list_handler::<S, X>).post(create_handler::<S, X>),
        )
        .route(
            "/api/v1/students/classification",
            get(classification_handler::<S, X>),
        )
        .route("/api/v1/students/export", get(export_handler::<S, X>))
        .route("/api/v1/students/import", post(import_handler::<S, X>))
        .route("/api/v1/students/events", get(events_handler::<S, X>))
        .route(
            "/api/v1/students/:student_number",
            get(get_handler::<S, X>)
                .patch(update_handler::<S, X>)
                .delete(delete_handler::<S, X>),
        )
        .route(
            "/api/v1/students/:student_number/interventions",
            post(intervention_handler::<S, X>),
        )
        .with_state(service)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
            ServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
            ServiceError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::MalformedImport(_) => StatusCode::BAD_REQUEST,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Header-based actor extraction. A missing or unknown role is a 401; the
/// assignment headers are optional and only meaningful for the roles that
/// declare them.
#[async_trait]
impl<St> FromRequestParts<St> for Actor
where
    St: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let role_header = parts
            .headers
            .get("x-actor-role")
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| unauthorized("missing x-actor-role header"))?;
        let role = Role::parse(role_header)
            .ok_or_else(|| unauthorized(&format!("unknown role '{role_header}'")))?;

        let unit_id = parts
            .headers
            .get("x-actor-unit")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(Actor {
            role,
            unit_id,
            advisees: list_header(parts, "x-actor-advisees"),
            course_ids: list_header(parts, "x-actor-courses"),
        })
    }
}

fn list_header(parts: &Parts, name: &str) -> Vec<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": message })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListParams {
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

pub(crate) async fn list_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    Query(params): Query<ListParams>,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let listing = service.list(&actor, params.page, params.limit)?;
    Ok(Json(listing).into_response())
}

pub(crate) async fn create_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    Json(draft): Json<StudentDraft>,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let record = service.create(&actor, draft)?;
    Ok((StatusCode::CREATED, Json(record)).into_response())
}

pub(crate) async fn get_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    Path(student_number): Path<String>,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let record = service.get(&actor, &student_number)?;
    Ok(Json(record).into_response())
}

pub(crate) async fn update_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    Path(student_number): Path<String>,
    Json(patch): Json<StudentPatch>,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let record = service.update(&actor, &student_number, patch)?;
    Ok(Json(record).into_response())
}

pub(crate) async fn delete_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    Path(student_number): Path<String>,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    service.delete(&actor, &student_number)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct InterventionRequest {
    note: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    logged_on: Option<chrono::NaiveDate>,
}

pub(crate) async fn intervention_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    Path(student_number): Path<String>,
    Json(request): Json<InterventionRequest>,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let note = InterventionNote {
        logged_on: request
            .logged_on
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        author: request
            .author
            .unwrap_or_else(|| actor.role.label().to_string()),
        note: request.note,
    };
    let record = service.log_intervention(&actor, &student_number, note)?;
    Ok(Json(record).into_response())
}

/// Threshold cutoffs as optional query parameters; defaults are the
/// `RiskThresholds::default()` values (2.0 / 75.0 / 0.0).
#[derive(Debug, Deserialize)]
pub(crate) struct ThresholdParams {
    #[serde(default)]
    gpa_floor: Option<f64>,
    #[serde(default)]
    attendance_floor: Option<f64>,
    #[serde(default)]
    balance_ceiling: Option<f64>,
}

impl ThresholdParams {
    fn into_thresholds(self) -> RiskThresholds {
        let defaults = RiskThresholds::default();
        RiskThresholds {
            gpa_floor: self.gpa_floor.unwrap_or(defaults.gpa_floor),
            attendance_floor: self.attendance_floor.unwrap_or(defaults.attendance_floor),
            balance_ceiling: self.balance_ceiling.unwrap_or(defaults.balance_ceiling),
        }
    }
}

pub(crate) async fn classification_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    Query(params): Query<ThresholdParams>,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let report = service.classify(&actor, &params.into_thresholds())?;
    Ok(Json(report).into_response())
}

pub(crate) async fn export_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let roster = service.roster_csv(&actor)?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv")],
        roster,
    )
        .into_response())
}

/// Bulk import runs on a blocking task under the extended bulk budget. If
/// the budget elapses the caller gets a 503 while the reconciliation runs to
/// completion (fire-and-continue).
pub(crate) async fn import_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    body: String,
) -> Response
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    let budget = service.budgets().bulk;
    let worker = tokio::task::spawn_blocking(move || {
        service.import(&actor, Cursor::new(body.into_bytes()))
    });

    match tokio::time::timeout(budget, worker).await {
        Ok(Ok(Ok(summary))) => (StatusCode::OK, Json(summary)).into_response(),
        Ok(Ok(Err(err))) => err.into_response(),
        Ok(Err(join_error)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("import task failed: {join_error}") })),
        )
            .into_response(),
        Err(_elapsed) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "import exceeded the bulk operation budget; still running" })),
        )
            .into_response(),
    }
}

/// Persistent bidirectional event channel. Connections start subscribed to
/// every event type; clients narrow the set with subscribe/unsubscribe
/// commands naming event kinds.
pub(crate) async fn events_handler<S, X>(
    State(service): State<Arc<RegistryService<S, X>>>,
    actor: Actor,
    ws: WebSocketUpgrade,
) -> Result<Response, ServiceError>
where
    S: RecordStore + 'static,
    X: ExportSink + 'static,
{
    // Roles denied individual-record access get no event stream either.
    service.list(&actor, None, None)?;
    let receiver = service.notifier().subscribe();
    Ok(ws.on_upgrade(move |socket| run_event_channel(socket, receiver)))
}

#[derive(Debug, Deserialize)]
struct SubscriptionCommand {
    action: String,
    #[serde(default)]
    events: Vec<String>,
}

async fn run_event_channel(
    mut socket: WebSocket,
    mut events: broadcast::Receiver<ChangeEvent>,
) {
    let mut subscribed: BTreeSet<&'static str> = ChangeEvent::KINDS.into_iter().collect();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !subscribed.contains(event.kind()) {
                        continue;
                    }
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                // A lagged subscriber missed events; it must rely on its
                // next full refresh.
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!(missed, "event channel lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    apply_subscription_command(&mut subscribed, &text);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }
}

fn apply_subscription_command(subscribed: &mut BTreeSet<&'static str>, text: &str) {
    let Ok(command) = serde_json::from_str::<SubscriptionCommand>(text) else {
        return;
    };
    let named: Vec<&'static str> = ChangeEvent::KINDS
        .into_iter()
        .filter(|kind| command.events.iter().any(|event| event == kind))
        .collect();
    match command.action.as_str() {
        "subscribe" => subscribed.extend(named),
        "unsubscribe" => {
            for kind in named {
                subscribed.remove(kind);
            }
        }
        _ => {}
    }
}
