/// Route definitions and middleware setup
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{blacklist, check, health_check, login, logout, refresh_token},
    metrics::metrics_handler,
    middleware::{auth_rate_limit, global_rate_limit, require_access_token},
    AppState,
};

pub fn build_router(state: AppState) -> Router {
    let token_routes = Router::new()
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route_layer(from_fn_with_state(state.clone(), auth_rate_limit));

    // Token checks count against the auth quota before the token is looked at.
    let check_route = Router::new()
        .route("/check", get(check))
        .route_layer(from_fn_with_state(state.clone(), require_access_token))
        .route_layer(from_fn_with_state(state.clone(), auth_rate_limit));

    let admin_routes = Router::new()
        .route("/blacklist", get(blacklist))
        .route_layer(from_fn_with_state(state.clone(), require_access_token));

    Router::new()
        .nest(
            "/api/v1/auth",
            token_routes.merge(check_route).merge(admin_routes),
        )
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(from_fn_with_state(state.clone(), global_rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
