//! Axum router and all HTTP handlers for fb-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every order route acts with the caller's own bearer
//! token: the daemon decodes it to learn the caller's role and forwards it
//! to the backend unchanged. Decoding does not verify the signature, so no
//! route returns data the backend has not just accepted that token for.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use fb_client::decode_session;
use fb_schemas::{price_to_micros, ActorKind, ActorRecord};
use fb_workflow::{
    transition_table, Action, ActionKind, OrderView, PendingResidual, ResidualRetry, Role,
    Session, TableRow, TransitionOutcome, WorkflowError,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{HealthResponse, RoleQuery, TransitionRequest},
    error::ApiError,
    state::{Actors, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/workflow/table", get(workflow_table))
        .route("/v1/orders/:id", get(order_view))
        .route("/v1/orders/:id/transition", post(order_transition))
        .route("/v1/residuals", get(residuals))
        .route("/v1/residuals/retry", post(residuals_retry))
        .route("/v1/institutions", get(institutions))
        .route("/v1/actors/:kind", get(actor_list).post(actor_create))
        .route(
            "/v1/actors/:kind/:code",
            get(actor_get).put(actor_update).delete(actor_delete),
        )
        .route("/v1/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Caller session from `Authorization: Bearer <jwt>`, optionally acting as
/// another stage the token grants.
fn session_from(headers: &HeaderMap, role: Option<&str>) -> Result<Session, ApiError> {
    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("UNAUTHORIZED: missing bearer token"))?;
    if !raw.starts_with("Bearer ") {
        return Err(ApiError::unauthorized(
            "UNAUTHORIZED: Authorization must be a Bearer token",
        ));
    }
    let session = decode_session(raw)?;
    match role {
        None => Ok(session),
        Some(r) => {
            let role = Role::parse(r)
                .ok_or_else(|| ApiError::bad_request(format!("unknown role '{r}'")))?;
            Ok(session.act_as(role)?)
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: st.build.service.to_string(),
        version: st.build.version.to_string(),
        backend: st.gateway.backend().name().to_string(),
    })
}

// ---------------------------------------------------------------------------
// GET /v1/workflow/table
// ---------------------------------------------------------------------------

pub(crate) async fn workflow_table() -> Json<Vec<TableRow>> {
    Json(transition_table())
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn order_view(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(q): Query<RoleQuery>,
    headers: HeaderMap,
) -> Result<Json<OrderView>, ApiError> {
    let session = session_from(&headers, q.role.as_deref())?;
    Ok(Json(st.gateway.view(&session, &id).await?))
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:id/transition
// ---------------------------------------------------------------------------

fn build_action(req: &TransitionRequest) -> Result<Action, ApiError> {
    let kind = ActionKind::parse(&req.action)
        .ok_or_else(|| ApiError::bad_request(format!("unknown action '{}'", req.action)))?;
    let price = req
        .price
        .map(price_to_micros)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Action::from_parts(kind, req.quantity, price, req.motif.clone())
        .ok_or_else(|| ApiError::bad_request("quantity is required for a partial validation"))
}

/// Plans against the backend's current copy of the order; the caller's
/// `expectedStatus`, when given, must still match it.
pub(crate) async fn order_transition(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TransitionOutcome>, ApiError> {
    let session = session_from(&headers, req.role.as_deref())?;
    let action = build_action(&req)?;

    let order = st.gateway.refresh(&session, &id).await?;
    if let Some(expected) = req.expected_status {
        if expected != order.order_status {
            info!(order_id = %id, expected = %expected, actual = %order.order_status, "stale view refused");
            return Err(WorkflowError::Conflict {
                message: format!("order is no longer {expected}"),
                current: Some(Box::new(order)),
            }
            .into());
        }
    }

    match st.gateway.request_transition(&session, &order, &action).await {
        Ok(out) => {
            st.publish_transition(&session.subject, &out);
            Ok(Json(out))
        }
        Err(e) => {
            if let WorkflowError::Ambiguous { .. } = &e {
                let _ = st.bus.send(BusMsg::LogLine {
                    level: "WARN".to_string(),
                    msg: format!("order {id}: {e}"),
                });
            }
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/residuals, POST /v1/residuals/retry
// ---------------------------------------------------------------------------

/// Only entries whose parent the caller's token can read on the backend.
pub(crate) async fn residuals(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<PendingResidual>>, ApiError> {
    let session = session_from(&headers, None)?;
    Ok(Json(st.gateway.visible_residuals(&session).await?))
}

/// Operator-triggered: one attempt per ledger entry, same idempotency key.
pub(crate) async fn residuals_retry(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ResidualRetry>>, ApiError> {
    let session = session_from(&headers, None)?;
    let results = st.gateway.retry_pending_residuals(&session).await;
    for r in &results {
        if let ResidualRetry::Failed {
            parent_order_id,
            error,
            ..
        } = r
        {
            warn!(parent_order_id = %parent_order_id, error = %error, "residual still pending");
        }
    }
    info!(subject = %session.subject, attempted = results.len(), "residuals/retry");
    Ok(Json(results))
}

// ---------------------------------------------------------------------------
// GET /v1/institutions
// ---------------------------------------------------------------------------

fn actors_of(st: &AppState) -> Result<&Actors, ApiError> {
    st.actors.as_ref().ok_or_else(|| {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "not_configured",
            "actor backend not configured",
        )
    })
}

pub(crate) async fn institutions(
    State(st): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<ActorRecord>>, ApiError> {
    let session = session_from(&headers, None)?;
    let actors = actors_of(&st)?;
    let list = actors
        .institutions
        .institutions(&actors.client, &session)
        .await?;
    Ok(Json(list))
}

// ---------------------------------------------------------------------------
// /v1/actors/:kind[/:code]
// ---------------------------------------------------------------------------

fn actor_kind(raw: &str) -> Result<ActorKind, ApiError> {
    ActorKind::parse(raw).ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("unknown actor kind '{raw}'"),
        )
    })
}

fn checked(record: &ActorRecord) -> Result<(), ApiError> {
    record.validate().map_err(|e| {
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_actor", e.to_string())
    })
}

/// Institution edits must not be hidden behind a cached list.
async fn written(actors: &Actors, kind: ActorKind) {
    if kind == ActorKind::FinancialInstitution {
        actors.institutions.invalidate().await;
    }
}

pub(crate) async fn actor_list(
    State(st): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ActorRecord>>, ApiError> {
    let session = session_from(&headers, None)?;
    let kind = actor_kind(&kind)?;
    let actors = actors_of(&st)?;
    Ok(Json(actors.client.list(&session, kind).await?))
}

pub(crate) async fn actor_create(
    State(st): State<Arc<AppState>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    Json(record): Json<ActorRecord>,
) -> Result<(StatusCode, Json<ActorRecord>), ApiError> {
    let session = session_from(&headers, None)?;
    let kind = actor_kind(&kind)?;
    checked(&record)?;
    let actors = actors_of(&st)?;
    let created = actors.client.create(&session, kind, &record).await?;
    written(actors, kind).await;
    info!(subject = %session.subject, kind = kind.path_segment(), code = %created.code, "actor created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub(crate) async fn actor_get(
    State(st): State<Arc<AppState>>,
    Path((kind, code)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<ActorRecord>, ApiError> {
    let session = session_from(&headers, None)?;
    let kind = actor_kind(&kind)?;
    let actors = actors_of(&st)?;
    Ok(Json(actors.client.get(&session, kind, &code).await?))
}

/// The record's `code` must name the actor in the path.
pub(crate) async fn actor_update(
    State(st): State<Arc<AppState>>,
    Path((kind, code)): Path<(String, String)>,
    headers: HeaderMap,
    Json(record): Json<ActorRecord>,
) -> Result<Json<ActorRecord>, ApiError> {
    let session = session_from(&headers, None)?;
    let kind = actor_kind(&kind)?;
    if record.code != code {
        return Err(ApiError::bad_request(format!(
            "record code '{}' does not match '{code}'",
            record.code
        )));
    }
    checked(&record)?;
    let actors = actors_of(&st)?;
    let updated = actors.client.update(&session, kind, &record).await?;
    written(actors, kind).await;
    info!(subject = %session.subject, kind = kind.path_segment(), code = %code, "actor updated");
    Ok(Json(updated))
}

/// Soft delete on the backend; answers 204.
pub(crate) async fn actor_delete(
    State(st): State<Arc<AppState>>,
    Path((kind, code)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let session = session_from(&headers, None)?;
    let kind = actor_kind(&kind)?;
    let actors = actors_of(&st)?;
    actors.client.delete(&session, kind, &code).await?;
    written(actors, kind).await;
    info!(subject = %session.subject, kind = kind.path_segment(), code = %code, "actor deactivated");
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Transition(_) => "transition",
                    BusMsg::ResidualPending { .. } => "residual_pending",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
