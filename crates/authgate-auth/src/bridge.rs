//! Login orchestration
//!
//! Turns a successful resolution into a [`Principal`] carrying a freshly
//! issued bearer token. Password and provider logins produce the same
//! shape so the web layer handles both alike.

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

use authgate_db::{Account, AuthProvider};

use crate::error::{AuthError, AuthResult, AuthenticationFailed};
use crate::jwt::TokenCodec;
use crate::principal::{Principal, TOKEN_ATTRIBUTE};
use crate::provider::ProviderAttributes;
use crate::resolver::IdentityResolver;

#[derive(Clone)]
pub struct AuthSessionBridge {
    resolver: IdentityResolver,
    codec: TokenCodec,
}

impl AuthSessionBridge {
    pub fn new(resolver: IdentityResolver, codec: TokenCodec) -> Self {
        Self { resolver, codec }
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Password login
    pub async fn login_local(
        &self,
        login: &str,
        plaintext: &str,
    ) -> Result<Principal, AuthenticationFailed> {
        let account = self
            .resolver
            .authenticate_local(login, plaintext)
            .await
            .map_err(|reason| failed("local", reason))?;

        let token = self.issue(&account)?;
        info!(account_id = %account.id, "Local login succeeded");

        Ok(Principal::new(account, token, Map::new()))
    }

    /// Provider callback login. The token is also published in the
    /// principal's attribute bag under [`TOKEN_ATTRIBUTE`].
    pub async fn login_provider(
        &self,
        provider: &AuthProvider,
        subject_id: &str,
        attributes: &ProviderAttributes,
    ) -> Result<Principal, AuthenticationFailed> {
        let account = self
            .resolver
            .resolve_provider(provider, subject_id, attributes)
            .await
            .map_err(|reason| failed(provider.as_str(), reason))?;

        let token = self.issue(&account)?;
        info!(account_id = %account.id, %provider, "Provider login succeeded");

        let mut bag = attributes.to_bag();
        bag.insert(TOKEN_ATTRIBUTE.to_string(), Value::String(token.clone()));

        Ok(Principal::new(account, token, bag))
    }

    /// Account behind a bearer token
    pub async fn authenticate_bearer(&self, token: &str) -> AuthResult<Account> {
        let account_id = self.codec.parse(token)?;
        self.resolver.load_account(account_id).await
    }

    fn issue(&self, account: &Account) -> Result<String, AuthenticationFailed> {
        self.codec
            .issue(account.id, Utc::now())
            .map_err(AuthenticationFailed::from)
    }
}

fn failed(source: &str, reason: AuthError) -> AuthenticationFailed {
    debug!(source, error_code = reason.error_code(), "Login failed");
    AuthenticationFailed::from(reason)
}
