//! AuthGate HTTP Server
//!
//! # Routes
//!
//! ```text
//! POST /api/auth/signin                  - password login, returns a bearer token
//! POST /api/auth/signup                  - password signup
//! GET  /api/auth/me                      - profile of the bearer
//! GET  /oauth2/authorization/{provider}  - start provider login
//! GET  /login/oauth2/code/{provider}     - provider callback, redirects to the front end
//! GET  /health, /ready
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod oauth2;
pub mod routes;
pub mod state;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::{ApiSettings, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use oauth2::{HttpProviderClient, OAuth2Flow, ProviderClient};
pub use state::AppState;

/// Create the router with all middleware
pub fn create_router(state: Arc<AppState>, config: &ApiSettings) -> Router {
    let mut router = create_test_router(state);

    if config.enable_tracing {
        router = router.layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            },
        ));
    }

    if config.enable_cors {
        let cors = if config.cors_origins.iter().any(|o| o == "*") {
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(
                    config
                        .cors_origins
                        .iter()
                        .filter_map(|o| o.parse().ok())
                        .collect::<Vec<_>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
        };
        router = router.layer(cors);
    }

    router
}

/// Routes without tracing or CORS
pub fn create_test_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/auth", routes::auth_routes(&state))
        .merge(routes::oauth2_routes())
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .with_state(state)
}
