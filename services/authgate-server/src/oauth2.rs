//! OAuth2 authorization-code handshake
//!
//! The server redirects the browser to the provider with a one-time
//! `state`, exchanges the returned code for an access token, reads the
//! user-info document and hands the identity to the auth core. The result
//! goes back to the front end as a redirect carrying either the bearer
//! token or an error message.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use rand::RngCore;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use authgate_auth::{AuthError, AuthResult, Principal, ProviderAttributes};
use authgate_db::AuthProvider;

use crate::config::{OAuth2ClientConfig, OAuth2Settings};
use crate::error::{ApiError, ApiResult};

// =============================================================================
// Registrations
// =============================================================================

/// Endpoints and scopes of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorization_uri: String,
    pub token_uri: String,
    pub user_info_uri: String,
    pub emails_uri: Option<String>,
    pub scopes: Vec<String>,
}

impl ProviderEndpoints {
    /// Published endpoints of the providers we know how to map
    pub fn well_known(provider: &AuthProvider) -> Option<Self> {
        let scopes = |s: &[&str]| s.iter().map(|s| s.to_string()).collect();
        match provider.as_str() {
            "google" => Some(Self {
                authorization_uri: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_uri: "https://oauth2.googleapis.com/token".to_string(),
                user_info_uri: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                emails_uri: None,
                scopes: scopes(&["openid", "email", "profile"]),
            }),
            "github" => Some(Self {
                authorization_uri: "https://github.com/login/oauth/authorize".to_string(),
                token_uri: "https://github.com/login/oauth/access_token".to_string(),
                user_info_uri: "https://api.github.com/user".to_string(),
                emails_uri: Some("https://api.github.com/user/emails".to_string()),
                scopes: scopes(&["read:user", "user:email"]),
            }),
            "facebook" => Some(Self {
                authorization_uri: "https://www.facebook.com/v18.0/dialog/oauth".to_string(),
                token_uri: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
                user_info_uri: "https://graph.facebook.com/me?fields=id,name,email,picture"
                    .to_string(),
                emails_uri: None,
                scopes: scopes(&["email", "public_profile"]),
            }),
            _ => None,
        }
    }
}

/// A configured OAuth2 client
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    pub provider: AuthProvider,
    pub client_id: String,
    pub client_secret: String,
    pub endpoints: ProviderEndpoints,
}

impl ClientRegistration {
    /// Merge configured overrides with the provider's well-known endpoints
    pub fn from_config(provider: AuthProvider, config: &OAuth2ClientConfig) -> AuthResult<Self> {
        let known = ProviderEndpoints::well_known(&provider);
        let pick = |configured: &Option<String>, fallback: Option<&String>, what: &str| {
            configured
                .clone()
                .or_else(|| fallback.cloned())
                .ok_or_else(|| AuthError::Config(format!("OAuth2 client `{}` needs {}", provider, what)))
        };

        let endpoints = ProviderEndpoints {
            authorization_uri: pick(
                &config.authorization_uri,
                known.as_ref().map(|k| &k.authorization_uri),
                "an authorization_uri",
            )?,
            token_uri: pick(&config.token_uri, known.as_ref().map(|k| &k.token_uri), "a token_uri")?,
            user_info_uri: pick(
                &config.user_info_uri,
                known.as_ref().map(|k| &k.user_info_uri),
                "a user_info_uri",
            )?,
            emails_uri: config
                .emails_uri
                .clone()
                .or_else(|| known.as_ref().and_then(|k| k.emails_uri.clone())),
            scopes: if config.scopes.is_empty() {
                known.as_ref().map(|k| k.scopes.clone()).unwrap_or_default()
            } else {
                config.scopes.clone()
            },
        };

        Ok(Self {
            provider,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            endpoints,
        })
    }
}

// =============================================================================
// Provider Calls
// =============================================================================

/// Code exchange and user-info lookup against a provider
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// User-info document for the user who granted `code`
    async fn fetch_user_info(
        &self,
        registration: &ClientRegistration,
        code: &str,
        redirect_uri: &str,
    ) -> ApiResult<Value>;
}

/// [`ProviderClient`] over HTTPS
pub struct HttpProviderClient {
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenExchange {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmailEntry {
    email: String,
    #[serde(default)]
    primary: bool,
    #[serde(default)]
    verified: bool,
}

impl HttpProviderClient {
    pub fn new() -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("authgate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    async fn exchange_code(
        &self,
        registration: &ClientRegistration,
        code: &str,
        redirect_uri: &str,
    ) -> ApiResult<String> {
        let exchange: TokenExchange = self
            .http
            .post(&registration.endpoints.token_uri)
            .header(ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", registration.client_id.as_str()),
                ("client_secret", registration.client_secret.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        exchange.access_token.ok_or_else(|| {
            ApiError::Provider(
                exchange
                    .error_description
                    .or(exchange.error)
                    .unwrap_or_else(|| "token response carried no access token".to_string()),
            )
        })
    }

    async fn primary_email(&self, emails_uri: &str, access_token: &str) -> ApiResult<Option<String>> {
        let emails: Vec<EmailEntry> = self
            .http
            .get(emails_uri)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(emails
            .into_iter()
            .find(|entry| entry.primary && entry.verified)
            .map(|entry| entry.email))
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn fetch_user_info(
        &self,
        registration: &ClientRegistration,
        code: &str,
        redirect_uri: &str,
    ) -> ApiResult<Value> {
        let access_token = self.exchange_code(registration, code, redirect_uri).await?;

        let mut info: Value = self
            .http
            .get(&registration.endpoints.user_info_uri)
            .bearer_auth(&access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // Private GitHub addresses are only listed on the emails endpoint
        let has_email = info.get("email").and_then(Value::as_str).is_some();
        if let (false, Some(emails_uri)) = (has_email, &registration.endpoints.emails_uri) {
            if let Some(email) = self.primary_email(emails_uri, &access_token).await? {
                if let Some(object) = info.as_object_mut() {
                    object.insert("email".to_string(), Value::String(email));
                }
            }
        }

        Ok(info)
    }
}

// =============================================================================
// Handshake State
// =============================================================================

#[derive(Debug, Clone)]
struct PendingAuthorization {
    provider: AuthProvider,
    issued_at: Instant,
}

/// Registrations, outstanding `state` values and front-end redirects
pub struct OAuth2Flow {
    registrations: HashMap<AuthProvider, ClientRegistration>,
    pending: DashMap<String, PendingAuthorization>,
    client: Arc<dyn ProviderClient>,
    public_url: String,
    frontend_url: String,
    state_ttl: Duration,
}

impl OAuth2Flow {
    pub fn new(
        settings: &OAuth2Settings,
        public_url: &str,
        client: Arc<dyn ProviderClient>,
    ) -> AuthResult<Self> {
        let registrations = settings
            .clients
            .iter()
            .map(|(tag, config)| {
                let provider = AuthProvider::new(tag);
                ClientRegistration::from_config(provider.clone(), config).map(|r| (provider, r))
            })
            .collect::<AuthResult<HashMap<_, _>>>()?;

        Ok(Self {
            registrations,
            pending: DashMap::new(),
            client,
            public_url: public_url.trim_end_matches('/').to_string(),
            frontend_url: settings.frontend_url.trim_end_matches('/').to_string(),
            state_ttl: settings.state_ttl(),
        })
    }

    pub fn registration(&self, provider: &AuthProvider) -> ApiResult<&ClientRegistration> {
        self.registrations
            .get(provider)
            .ok_or_else(|| AuthError::UnknownProvider(provider.to_string()).into())
    }

    /// Callback URI registered with the provider
    pub fn redirect_uri(&self, provider: &AuthProvider) -> String {
        format!("{}/login/oauth2/code/{}", self.public_url, provider)
    }

    /// Start a handshake: remember a fresh `state` and return the provider URL
    pub fn begin(&self, provider: &AuthProvider) -> ApiResult<String> {
        let registration = self.registration(provider)?;

        let ttl = self.state_ttl;
        self.pending.retain(|_, pending| pending.issued_at.elapsed() < ttl);

        let state = random_state();
        self.pending.insert(
            state.clone(),
            PendingAuthorization {
                provider: provider.clone(),
                issued_at: Instant::now(),
            },
        );

        let scope = registration.endpoints.scopes.join(" ");
        let redirect_uri = self.redirect_uri(provider);
        let separator = if registration.endpoints.authorization_uri.contains('?') {
            '&'
        } else {
            '?'
        };

        Ok(format!(
            "{}{}response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            registration.endpoints.authorization_uri,
            separator,
            urlencoding::encode(&registration.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&state),
        ))
    }

    /// Consume a `state` issued by [`begin`](Self::begin) for this provider
    pub fn take_state(&self, provider: &AuthProvider, state: &str) -> ApiResult<()> {
        let (_, pending) = self
            .pending
            .remove(state)
            .ok_or_else(|| ApiError::BadRequest("Invalid or expired login attempt".to_string()))?;

        if pending.provider != *provider || pending.issued_at.elapsed() >= self.state_ttl {
            debug!(%provider, "Rejected OAuth2 state");
            return Err(ApiError::BadRequest("Invalid or expired login attempt".to_string()));
        }

        Ok(())
    }

    /// Exchange the code and map the provider's user info
    pub async fn fetch_identity(
        &self,
        provider: &AuthProvider,
        code: &str,
    ) -> ApiResult<(String, ProviderAttributes)> {
        let registration = self.registration(provider)?;
        let info = self
            .client
            .fetch_user_info(registration, code, &self.redirect_uri(provider))
            .await?;

        Ok(ProviderAttributes::from_user_info(provider, &info)?)
    }

    /// `{frontend}/oauth2/redirect?token=..&email=..&name=..`
    pub fn success_redirect(&self, principal: &Principal) -> String {
        let (token, email, name) = principal.redirect_fields();
        format!(
            "{}/oauth2/redirect?token={}&email={}&name={}",
            self.frontend_url,
            urlencoding::encode(&token),
            urlencoding::encode(&email),
            urlencoding::encode(&name),
        )
    }

    /// `{frontend}/login?error=..`
    pub fn failure_redirect(&self, message: &str) -> String {
        format!("{}/login?error={}", self.frontend_url, urlencoding::encode(message))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
