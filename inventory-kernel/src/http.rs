/**
 * API REST INVENTORY - Exposition HTTP de l'inventaire des hosts
 *
 * ROUTES :
 * - GET    /health                 toujours accessible
 * - GET    /system/health          état du kernel (uptime, MQTT, compteurs)
 * - GET    /systems                snapshot trié de tous les hosts
 * - GET    /systems/{host_id}      un host, 404 si inconnu
 * - DELETE /systems                vide l'inventaire
 * - PUT    /systems/property       body texte = nom de propriété à demander
 *
 * SÉCURITÉ : si une API key est configurée, header x-api-key obligatoire
 * sur toutes les routes sauf /health.
 */

use crate::health::{HealthTracker, KernelHealth};
use crate::inventory::InventoryStore;
use crate::models::HostView;
use crate::mqtt::{PropertyRequester, RequestError};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, put};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub store: InventoryStore,
    pub health_tracker: HealthTracker,
    pub property_requester: PropertyRequester,
    pub api_key: Option<Arc<str>>,
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };

    // Health check toujours accessible
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let ok = req.headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!("[http] rejected unauthenticated {} {}", req.method(), req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/systems", get(list_systems).delete(reset_systems))
        .route("/systems/property", put(request_property))
        .route("/systems/{host_id}", get(get_system))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// GET /systems
async fn list_systems(State(app): State<AppState>) -> Json<Vec<HostView>> {
    let list = app.store.list_all().iter().map(|(_, record)| HostView::from(record)).collect();
    Json(list)
}

// GET /systems/{host_id}
async fn get_system(
    State(app): State<AppState>,
    Path(host_id): Path<String>,
) -> Result<Json<HostView>, StatusCode> {
    let Some(record) = app.store.get(&host_id) else { return Err(StatusCode::NOT_FOUND); };
    Ok(Json(HostView::from(&record)))
}

// DELETE /systems
async fn reset_systems(State(app): State<AppState>) -> Json<serde_json::Value> {
    let cleared = app.store.reset();
    info!("[http] inventory reset, {cleared} hosts cleared");
    Json(serde_json::json!({ "cleared": cleared }))
}

// PUT /systems/property
async fn request_property(
    State(app): State<AppState>,
    body: String,
) -> (StatusCode, Json<serde_json::Value>) {
    match app.property_requester.request(&body) {
        Ok(()) => (StatusCode::ACCEPTED, Json(serde_json::json!({ "requested": body.trim() }))),
        Err(e) => {
            let code = match e {
                RequestError::EmptyName => StatusCode::BAD_REQUEST,
                RequestError::NotConnected | RequestError::Publish(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            (code, Json(serde_json::json!({ "error": e.to_string() })))
        }
    }
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.store))
}
