use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / - Service descriptor
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "coachdesk-api",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Billing and notification backend for coaching centers",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "billing": "/api/billing[/:id], /api/billing/overdue, /api/billing/student/:studentId/toggle (protected)",
                "notifications": "/api/notifications[/:id], /api/notifications/unread-count, /api/notifications/read-all (protected)",
            }
        }
    }))
}

/// GET /health - Store connectivity
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.clock.now();
    let backend = state.health.backend_name();

    match state.health.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": backend
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "store unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "store": backend
                    }
                })),
            )
        }
    }
}
