//! HTTP routes.
//!
//! Route table:
//! - GET  /rele             → evaluate and report desired state
//! - POST /rele             → record applied state, optional manual override
//! - GET  /rele/occurrences → deduplicated spikes for `start`..`end`
//! - GET  /health           → liveness, no credential required

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use relay_core::{Evaluation, RangeReport, RelayEngine, RelayError, RelaySnapshot, Switch};
use serde::Serialize;
use serde_json::json;

use crate::request::{RequestFields, authorize};

pub const PATH_RELE: &str = "/rele";
pub const PATH_OCCURRENCES: &str = "/rele/occurrences";
pub const PATH_HEALTH: &str = "/health";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RelayEngine>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(engine: Arc<RelayEngine>, api_key: impl Into<Arc<str>>) -> Self {
        Self { engine, api_key: api_key.into() }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(PATH_RELE, get(get_rele).post(post_rele))
        .route(PATH_OCCURRENCES, get(get_occurrences))
        .route(PATH_HEALTH, get(health))
        .with_state(state)
}

// ── error mapping ──

/// Wraps a relay error for conversion into an HTTP response.
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(e: RelayError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let (status, body) = match &self.0 {
            RelayError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, json!({ "ok": false, "error": code }))
            }
            RelayError::InvalidInput(e) => (
                StatusCode::BAD_REQUEST,
                json!({ "ok": false, "error": code, "hint": e.to_string() }),
            ),
            RelayError::UpstreamUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, json!({ "ok": false, "error": code }))
            }
        };
        (status, Json(body)).into_response()
    }
}

// ── response bodies ──

#[derive(Debug, Serialize)]
struct StateResponse {
    ok: bool,
    #[serde(flatten)]
    state: RelaySnapshot,
    spike_detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    spike_delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spike_previous: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spike_current: Option<f64>,
}

impl From<Evaluation> for StateResponse {
    fn from(ev: Evaluation) -> Self {
        let found = ev.spike.found;
        Self {
            ok: true,
            state: ev.state,
            spike_detected: found,
            spike_delta: ev.spike.delta.filter(|_| found),
            spike_previous: ev.spike.previous.filter(|_| found),
            spike_current: ev.spike.current.filter(|_| found),
        }
    }
}

#[derive(Debug, Serialize)]
struct AckResponse {
    ok: bool,
    desired: Switch,
    recorded: bool,
}

#[derive(Debug, Serialize)]
struct OccurrencesResponse {
    ok: bool,
    #[serde(flatten)]
    report: RangeReport,
}

// ── handlers ──

async fn get_rele(
    State(app): State<AppState>,
    req: Request,
) -> Result<Json<StateResponse>, ApiError> {
    let fields = RequestFields::collect(req).await;
    authorize(&fields, &app.api_key)?;

    let evaluation = app.engine.evaluate().await;
    Ok(Json(evaluation.into()))
}

async fn post_rele(
    State(app): State<AppState>,
    req: Request,
) -> Result<Json<AckResponse>, ApiError> {
    let fields = RequestFields::collect(req).await;
    authorize(&fields, &app.api_key)?;

    let applied = fields.body_field("applied").unwrap_or_default();
    let desired = fields.optional_body_field("desired");
    let desired = app.engine.acknowledge(applied, desired).await?;

    Ok(Json(AckResponse { ok: true, desired, recorded: true }))
}

async fn get_occurrences(
    State(app): State<AppState>,
    req: Request,
) -> Result<Json<OccurrencesResponse>, ApiError> {
    let fields = RequestFields::collect(req).await;
    authorize(&fields, &app.api_key)?;

    let start = fields.query_field("start").unwrap_or_default();
    let end = fields.query_field("end").unwrap_or_default();
    let report = app.engine.occurrences(start, end).await?;

    Ok(Json(OccurrencesResponse { ok: true, report }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}
