//! HTTP surface: webhook intake plus JSON/CSV views of the profile store.
//!
//! Every failure goes out as `{ success: false, error, details }` via
//! `PulseError`'s `IntoResponse`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, Method};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::dashboard::{self, DashboardSummary};
use crate::error::PulseError;
use crate::export;
use crate::state::{AppState, RefreshStatus};
use crate::store::ProfileAction;
use crate::types::{Department, Profile};
use crate::webhook::{self, WebhookAck, WebhookSnapshot};

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/sahha/webhook",
            get(webhook_get_handler)
                .post(webhook_post_handler)
                .delete(webhook_delete_handler),
        )
        .route("/api/profiles", get(profiles_handler))
        .route("/api/profiles/export.csv", get(export_handler))
        .route("/api/profiles/{id}/department", post(assign_department_handler))
        .route("/api/profiles/{id}/editable-id", post(edit_display_id_handler))
        .route("/api/dashboard", get(dashboard_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::extract::Request| {
                tracing::info_span!("http", method = %req.method(), path = %req.uri().path())
            }),
        )
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), PulseError> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Sahha Pulse listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("HTTP server stopped");
    Ok(())
}

// --- Health ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    profile_count: usize,
    webhook_store: bool,
    last_refresh: Option<RefreshStatus>,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        profile_count: state.profiles.lock().len(),
        webhook_store: state.webhook_db.lock().is_some(),
        last_refresh: state.last_refresh.lock().clone(),
    })
}

// --- Webhook ---

async fn webhook_get_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<WebhookSnapshot>, PulseError> {
    let snapshot = state.with_webhook_db(|db| webhook::snapshot(db))?;
    Ok(Json(snapshot))
}

async fn webhook_post_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<WebhookAck>, PulseError> {
    let ack = state.with_webhook_db(|db| webhook::ingest(db, &body, Utc::now()))?;
    state.refresh_wake.notify_one();
    Ok(Json(ack))
}

/// Only the literal `confirm=true` confirms; any other value is a refusal.
async fn webhook_delete_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<WebhookAck>, PulseError> {
    let Query(params) = query?;
    let confirm = params.get("confirm").is_some_and(|v| v == "true");
    let ack = state.with_webhook_db(|db| webhook::clear(db, confirm, Utc::now()))?;
    state.refresh_wake.notify_one();
    Ok(Json(ack))
}

// --- Profiles ---

/// A profile together with its current department.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileView {
    #[serde(flatten)]
    profile: Profile,
    department: Department,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfilesResponse {
    success: bool,
    count: usize,
    profiles: Vec<ProfileView>,
}

async fn profiles_handler(State(state): State<Arc<AppState>>) -> Json<ProfilesResponse> {
    let store = state.profiles_snapshot();
    let profiles: Vec<ProfileView> = store
        .profiles()
        .iter()
        .map(|p| ProfileView {
            department: store.department_of(p.profile_id()),
            profile: p.clone(),
        })
        .collect();
    Json(ProfilesResponse {
        success: true,
        count: profiles.len(),
        profiles,
    })
}

#[derive(Debug, Deserialize)]
struct DepartmentRequest {
    department: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssignmentResponse {
    success: bool,
    profile_id: String,
    department: Department,
}

async fn assign_department_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<DepartmentRequest>, JsonRejection>,
) -> Result<Json<AssignmentResponse>, PulseError> {
    let Json(req) = payload?;
    let department = Department::parse(&req.department).ok_or_else(|| {
        PulseError::InvalidPayload(format!("unknown department '{}'", req.department))
    })?;
    if state.profiles.lock().get(&id).is_none() {
        return Err(PulseError::ProfileNotFound(id));
    }
    let store = state.dispatch(ProfileAction::AssignDepartment {
        profile_id: id.clone(),
        department,
    });
    Ok(Json(AssignmentResponse {
        success: true,
        department: store.department_of(&id),
        profile_id: id,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditableIdRequest {
    editable_id: String,
}

async fn edit_display_id_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<EditableIdRequest>, JsonRejection>,
) -> Result<Json<ProfileView>, PulseError> {
    let Json(req) = payload?;
    if state.profiles.lock().get(&id).is_none() {
        return Err(PulseError::ProfileNotFound(id));
    }
    let store = state.dispatch(ProfileAction::EditDisplayId {
        profile_id: id.clone(),
        editable_id: req.editable_id,
    });
    let profile = store
        .get(&id)
        .cloned()
        .ok_or_else(|| PulseError::ProfileNotFound(id.clone()))?;
    Ok(Json(ProfileView {
        department: store.department_of(&id),
        profile,
    }))
}

// --- Dashboard / export ---

async fn dashboard_handler(State(state): State<Arc<AppState>>) -> Json<DashboardSummary> {
    Json(dashboard::summarize(&state.profiles_snapshot(), Utc::now()))
}

async fn export_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let csv = export::export_csv(&state.profiles_snapshot());
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sahha-profiles.csv\"",
            ),
        ],
        csv,
    )
}
