//! Router configuration for Web API.

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    middleware::{self, Next},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::handlers::{
    create_file, current_user, delete_file, get_file, list_files, login, logout, register,
    search_files, storage_summary, update_file, AppState,
};
use super::middleware::{
    create_cors_layer, jwt_auth, login_rate_limit, require_auth, security_headers,
    RateLimitState,
};
use super::openapi::ApiDoc;
use crate::config::ServerConfig;
use crate::store::Backend;

/// Create the main API router.
///
/// Account routes exist only when `state` carries a [`JwtState`](super::middleware::JwtState);
/// file and storage routes then require a bearer token.
pub fn create_router<S: Backend>(
    state: AppState<S>,
    rate_limit: Option<Arc<RateLimitState>>,
    server: &ServerConfig,
) -> Router {
    let mut file_routes = Router::new()
        .route("/files", get(list_files::<S>).post(create_file::<S>))
        .route("/files/search", get(search_files::<S>))
        .route(
            "/files/:id",
            get(get_file::<S>)
                .patch(update_file::<S>)
                .delete(delete_file::<S>),
        )
        .route("/storage", get(storage_summary::<S>));

    let api_routes = match state.jwt.clone() {
        None => file_routes,
        Some(jwt_state) => {
            file_routes = file_routes.route_layer(middleware::from_fn(require_auth));

            let mut credential_routes = Router::new()
                .route("/register", post(register::<S>))
                .route("/login", post(login::<S>));
            if let Some(limiter) = rate_limit {
                credential_routes = credential_routes.route_layer(middleware::from_fn(
                    move |req: Request<Body>, next: Next| {
                        let limiter = limiter.clone();
                        login_rate_limit(limiter, req, next)
                    },
                ));
            }

            let session_routes = Router::new()
                .route("/user", get(current_user::<S>))
                .route("/logout", post(logout::<S>));

            file_routes
                .merge(credential_routes)
                .merge(session_routes)
                .layer(middleware::from_fn(move |req: Request<Body>, next: Next| {
                    let jwt_state = jwt_state.clone();
                    jwt_auth(jwt_state, req, next)
                }))
        }
    };

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&server.cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(DefaultBodyLimit::max(
                    server.max_body_size_mb.saturating_mul(1024 * 1024),
                )),
        )
        .with_state(state)
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
