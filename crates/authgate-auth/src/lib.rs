//! AuthGate Authentication Core
//!
//! Bearer tokens for password logins, and reconciliation of identities
//! arriving from external providers with the local account store.
//!
//! - **Tokens**: HMAC-signed JWTs whose subject is the account id
//! - **Passwords**: Argon2id hashing (OWASP recommended)
//! - **Provider identities**: linked by email, never across providers
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Login Flow                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │   password login               provider callback             │
//! │         │                             │                      │
//! │         ▼                             ▼                      │
//! │  CredentialVerifier          ProviderAttributes              │
//! │         │                             │                      │
//! │         └───────► IdentityResolver ◄──┘                      │
//! │                         │                                    │
//! │                         ▼                                    │
//! │                   IdentityStore                              │
//! │                         │                                    │
//! │                         ▼                                    │
//! │      TokenCodec ─► AuthSessionBridge ─► Principal            │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod principal;
pub mod provider;
pub mod resolver;
pub mod types;

pub use bridge::AuthSessionBridge;
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult, AuthenticationFailed, ErrorResponse};
pub use jwt::TokenCodec;
pub use middleware::{BearerAuthLayer, BearerAuthMiddleware, OptionalUser, RequireAuth};
pub use password::CredentialVerifier;
pub use principal::{AuthenticatedSubject, Principal};
pub use provider::ProviderAttributes;
pub use resolver::IdentityResolver;
pub use types::*;

use authgate_db::IdentityStore;
use std::sync::Arc;

/// Authentication components wired over one identity store
#[derive(Clone)]
pub struct AuthService {
    bridge: Arc<AuthSessionBridge>,
    config: AuthConfig,
}

impl AuthService {
    /// Build every component; fails if the signing key or algorithm is unusable
    pub fn new(store: Arc<dyn IdentityStore>, config: AuthConfig) -> AuthResult<Self> {
        let codec = TokenCodec::new(&config.jwt)?;
        let verifier = CredentialVerifier::new(config.password.clone());
        let resolver = IdentityResolver::new(store, verifier, config.providers.clone());

        Ok(Self {
            bridge: Arc::new(AuthSessionBridge::new(resolver, codec)),
            config,
        })
    }

    pub fn bridge(&self) -> &Arc<AuthSessionBridge> {
        &self.bridge
    }

    pub fn resolver(&self) -> &IdentityResolver {
        self.bridge.resolver()
    }

    pub fn codec(&self) -> &TokenCodec {
        self.bridge.codec()
    }

    /// Get the config reference
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Create an auth layer for Axum router
    pub fn layer(&self) -> BearerAuthLayer {
        BearerAuthLayer::new(self.bridge.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authgate_db::MemoryIdentityStore;
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    #[test]
    fn test_auth_service_requires_signing_key() {
        let store: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());
        let result = AuthService::new(store.clone(), AuthConfig::default());
        assert!(matches!(result, Err(AuthError::Config(_))));

        let mut config = AuthConfig::default();
        config.jwt.secret = STANDARD.encode([3u8; 32]);
        assert!(AuthService::new(store, config).is_ok());
    }
}
