//! API Routes

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::state::AppState;

/// Password login and the bearer-protected profile
pub fn auth_routes(state: &AppState) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/me", get(handlers::auth::me))
        .route_layer(state.auth.layer());

    Router::new()
        .route("/signin", post(handlers::auth::signin))
        .route("/signup", post(handlers::auth::signup))
        .merge(protected)
}

/// Browser-facing OAuth2 handshake
pub fn oauth2_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/oauth2/authorization/:provider",
            get(handlers::oauth2::authorize),
        )
        .route("/login/oauth2/code/:provider", get(handlers::oauth2::callback))
}
