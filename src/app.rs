use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, patch, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

/// Full HTTP surface: public routes plus the JWT-protected `/api` tree
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(billing_routes())
        .merge(notification_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut router = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected
        .nest("/api", api)
        .layer(RequestBodyLimitLayer::new(state.config.api.max_request_size_bytes));

    if let Some(cors) = cors_layer(&state.config.security) {
        router = router.layer(cors);
    }
    if state.config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn billing_routes() -> Router<AppState> {
    use protected::billing;

    Router::new()
        .route("/billing", get(billing::list).post(billing::create))
        .route("/billing/overdue", get(billing::overdue))
        .route("/billing/:id", put(billing::update).delete(billing::delete))
        .route("/billing/student/:student_id/toggle", patch(billing::toggle_student))
}

fn notification_routes() -> Router<AppState> {
    use protected::notifications;

    Router::new()
        .route(
            "/notifications",
            get(notifications::list).post(notifications::create),
        )
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", patch(notifications::mark_all_read))
        .route("/notifications/:id", axum::routing::delete(notifications::delete))
        .route("/notifications/:id/read", patch(notifications::mark_read))
}

fn cors_layer(security: &SecurityConfig) -> Option<CorsLayer> {
    if !security.enable_cors {
        return None;
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return Some(CorsLayer::permissive());
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
