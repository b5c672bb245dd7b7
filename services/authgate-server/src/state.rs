//! Application state shared across handlers

use std::sync::Arc;

use authgate_auth::AuthService;
use authgate_db::Database;

use crate::oauth2::OAuth2Flow;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Authentication service
    pub auth: Arc<AuthService>,
    /// OAuth2 handshake
    pub oauth2: Arc<OAuth2Flow>,
    /// Database connections (absent in dev mode, which uses the in-memory store)
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(auth: Arc<AuthService>, oauth2: Arc<OAuth2Flow>, db: Option<Arc<Database>>) -> Self {
        Self { auth, oauth2, db }
    }
}
