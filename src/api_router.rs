//! API router
//!
//! Combines the endpoints of every module into one router under `/api`.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::core::shared::state::AppState;
use crate::security::cors::build_cors_layer;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Configure all API routes from all modules
pub fn configure_api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .merge(crate::auth::configure_auth_routes())
        .merge(crate::contacts::configure_contact_routes())
        .merge(crate::deals::configure_deal_routes())
        .merge(crate::tasks::configure_task_routes())
        .merge(crate::appointments::configure_appointment_routes())
        .merge(crate::activity::configure_activity_routes())
        .merge(crate::teams::configure_team_routes())
        .merge(crate::admin::configure_admin_routes())
        .merge(crate::analytics::configure_performance_routes())
}

/// The full application: routes, state, CORS and request tracing.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.cors.allowed_origin);
    configure_api_routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
