//! HTTP surface over the escrow service.
//!
//! Handlers never touch the ledger directly: every read and transition is a
//! request sent to the service actor over the channel in [`ApiState`], so
//! the single-writer guarantee holds no matter how many connections are in
//! flight. Caller identity arrives in `x-caller-id` / `x-caller-role`
//! headers set by the upstream gateway that performed authentication.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::actions::{permitted_actions, settlement_message, status_label};
use crate::amount::Amount;
use crate::escrow::{EscrowError, PaymentRecord, Request, RequestError};
use crate::ledger::LedgerFilter;
use crate::model::{Caller, Command, DeliverableInput, PartyId, PaymentId, ProjectId, Role};
use crate::report::render_report;
use crate::summary::EscrowTotals;

pub struct ApiState {
    requests: mpsc::Sender<Request>,
}

impl ApiState {
    pub fn new(requests: mpsc::Sender<Request>) -> Self {
        ApiState { requests }
    }

    async fn execute(&self, caller: Caller, command: Command) -> Result<PaymentRecord, ApiError> {
        let (reply, outcome) = oneshot::channel();
        self.requests
            .send(Request::Execute {
                caller,
                command,
                reply,
            })
            .await
            .map_err(|_| ApiError::internal())?;
        outcome
            .await
            .map_err(|_| ApiError::internal())?
            .map_err(ApiError::from)
    }

    async fn get(&self, id: PaymentId) -> Result<PaymentRecord, ApiError> {
        let (reply, outcome) = oneshot::channel();
        self.requests
            .send(Request::Get { id, reply })
            .await
            .map_err(|_| ApiError::internal())?;
        outcome
            .await
            .map_err(|_| ApiError::internal())?
            .map_err(|err| ApiError::from(RequestError::from(err)))
    }

    async fn search(&self, filter: LedgerFilter) -> Result<Vec<PaymentRecord>, ApiError> {
        let (reply, outcome) = oneshot::channel();
        self.requests
            .send(Request::Search { filter, reply })
            .await
            .map_err(|_| ApiError::internal())?;
        outcome.await.map_err(|_| ApiError::internal())
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/escrow", post(create_escrow).get(search_escrow))
        .route("/escrow/summary", get(summary))
        .route("/escrow/report", get(report))
        .route("/escrow/:id", get(get_escrow))
        .route("/escrow/:id/actions", get(actions))
        .route("/escrow/:id/fund", post(fund))
        .route("/escrow/:id/deliver", post(deliver))
        .route("/escrow/:id/client-verify", post(client_verify))
        .route("/escrow/:id/admin-verify", post(admin_verify))
        .route("/escrow/:id/release", post(release))
        .route("/escrow/:id/refund", post(refund))
        .route("/escrow/:id/dispute", post(dispute))
        .route(
            "/escrow/:id/deliverables/:index/verify",
            post(verify_deliverable),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API failure: HTTP status plus the `{error, code}` body.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn unauthenticated() -> Self {
        ApiError {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthenticated",
            message: "missing or invalid caller identity".to_string(),
        }
    }

    fn forbidden(message: &str) -> Self {
        ApiError {
            status: StatusCode::FORBIDDEN,
            code: "forbidden",
            message: message.to_string(),
        }
    }

    fn bad_request(message: &str) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_argument",
            message: message.to_string(),
        }
    }

    fn internal() -> Self {
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: "escrow service unavailable".to_string(),
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        let status = match &err {
            RequestError::RoleNotAllowed { .. } | RequestError::NotCounterparty { .. } => {
                StatusCode::FORBIDDEN
            }
            RequestError::Escrow(inner) => match inner {
                EscrowError::NotFound(_) => StatusCode::NOT_FOUND,
                EscrowError::InvalidState { .. } | EscrowError::PreconditionUnmet { .. } => {
                    StatusCode::CONFLICT
                }
                EscrowError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            },
        };
        ApiError {
            status,
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message, "code": self.code }));
        (self.status, body).into_response()
    }
}

fn caller_from(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let id = headers
        .get("x-caller-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty());
    let role = headers
        .get("x-caller-role")
        .and_then(|value| value.to_str().ok())
        .and_then(Role::parse);
    match (id, role) {
        (Some(id), Some(role)) => Ok(Caller::new(id, role)),
        _ => Err(ApiError::unauthenticated()),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    project_id: Option<String>,
    client_id: Option<String>,
    developer_id: Option<String>,
}

fn filter_from(query: SearchQuery) -> Result<LedgerFilter, ApiError> {
    match (query.project_id, query.client_id, query.developer_id) {
        (None, None, None) => Ok(LedgerFilter::All),
        (Some(project), None, None) => Ok(LedgerFilter::Project(project.into())),
        (None, Some(client), None) => Ok(LedgerFilter::Client(client.into())),
        (None, None, Some(developer)) => Ok(LedgerFilter::Developer(developer.into())),
        _ => Err(ApiError::bad_request(
            "use at most one of projectId, clientId, developerId",
        )),
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    project_id: ProjectId,
    amount: Amount,
    client_id: PartyId,
    developer_id: PartyId,
}

async fn create_escrow(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from(&headers)?;
    let record = state
        .execute(
            caller,
            Command::Create {
                project_id: body.project_id,
                amount: body.amount,
                client_id: body.client_id,
                developer_id: body.developer_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "paymentId": record.id }))))
}

async fn transition(
    state: &ApiState,
    headers: &HeaderMap,
    command: Command,
) -> Result<Json<Value>, ApiError> {
    let caller = caller_from(headers)?;
    state.execute(caller, command).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn fund(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    transition(&state, &headers, Command::Fund { id: id.into() }).await
}

#[derive(Debug, Deserialize)]
struct DeliverBody {
    deliverables: Vec<DeliverableInput>,
}

async fn deliver(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<DeliverBody>,
) -> Result<Json<Value>, ApiError> {
    transition(
        &state,
        &headers,
        Command::MarkDelivered {
            id: id.into(),
            deliverables: body.deliverables,
        },
    )
    .await
}

async fn client_verify(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    transition(&state, &headers, Command::ClientVerify { id: id.into() }).await
}

async fn admin_verify(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    transition(&state, &headers, Command::AdminVerify { id: id.into() }).await
}

async fn verify_deliverable(
    State(state): State<Arc<ApiState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    transition(
        &state,
        &headers,
        Command::VerifyDeliverable {
            id: id.into(),
            index,
        },
    )
    .await
}

async fn release(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    transition(&state, &headers, Command::Release { id: id.into() }).await
}

async fn refund(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    transition(&state, &headers, Command::Refund { id: id.into() }).await
}

async fn dispute(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    transition(&state, &headers, Command::Dispute { id: id.into() }).await
}

async fn get_escrow(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRecord>, ApiError> {
    Ok(Json(state.get(id.into()).await?))
}

async fn search_escrow(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PaymentRecord>>, ApiError> {
    let filter = filter_from(query)?;
    Ok(Json(state.search(filter).await?))
}

/// Resolver projection for the calling role: status badge, offered
/// actions, settlement line once terminal.
async fn actions(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let caller = caller_from(&headers)?;
    let record = state.get(id.into()).await?;
    Ok(Json(json!({
        "status": record.status,
        "label": status_label(record.status),
        "actions": permitted_actions(&record, caller.role),
        "settlement": settlement_message(&record),
    })))
}

async fn summary(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<EscrowTotals>, ApiError> {
    let filter = filter_from(query)?;
    let records = state.search(filter).await?;
    Ok(Json(EscrowTotals::from_records(&records)))
}

async fn report(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = caller_from(&headers)?;
    if caller.role != Role::Admin {
        return Err(ApiError::forbidden("settlement report is admin-only"));
    }
    let records = state.search(LedgerFilter::All).await?;
    let body = render_report(&records).map_err(|err| {
        error!(error = %err, "settlement report rendering failed");
        ApiError::internal()
    })?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], body).into_response())
}
