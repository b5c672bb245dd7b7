//! Authentication configuration
//!
//! Loaded once at process start and never mutated afterwards. Components
//! receive the section they need by value.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use authgate_db::AuthProvider;

use crate::error::{AuthError, AuthResult};

/// Minimum decoded signing key length (256 bits)
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

/// Main authentication configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Bearer token configuration
    #[serde(default)]
    pub jwt: JwtConfig,
    /// Password hashing configuration
    #[serde(default)]
    pub password: PasswordConfig,
    /// Recognized identity providers
    #[serde(default)]
    pub providers: ProviderConfig,
}

/// Bearer token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Base64-encoded HMAC signing key
    pub secret: String,
    /// Token lifetime
    #[serde(with = "humantime_serde")]
    pub token_lifetime: Duration,
    /// HMAC algorithm (HS256, HS384, HS512)
    pub algorithm: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(), // Must be set in production
            token_lifetime: Duration::from_secs(24 * 60 * 60),
            algorithm: "HS512".to_string(),
        }
    }
}

impl JwtConfig {
    /// Decode the signing key
    pub fn signing_key(&self) -> AuthResult<Vec<u8>> {
        let key = STANDARD
            .decode(self.secret.trim())
            .map_err(|e| AuthError::Config(format!("JWT secret is not valid base64: {}", e)))?;

        if key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(AuthError::Config(format!(
                "JWT secret must decode to at least {} bytes",
                MIN_SIGNING_KEY_BYTES
            )));
        }

        Ok(key)
    }

    /// Parse the configured algorithm; only the HMAC family is accepted
    pub fn algorithm(&self) -> AuthResult<Algorithm> {
        match self.algorithm.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            other => Err(AuthError::Config(format!("Unsupported JWT algorithm: {}", other))),
        }
    }
}

/// Password hashing configuration (Argon2id)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB (OWASP recommends 19456 KiB = 19 MiB minimum)
    pub memory_cost: u32,
    /// Time cost (iterations) - OWASP recommends 2 minimum
    pub time_cost: u32,
    /// Parallelism factor
    pub parallelism: u32,
    /// Output hash length in bytes
    pub hash_length: u32,
    /// Pepper (additional secret, optional)
    pub pepper: Option<String>,
    /// Minimum password length accepted at signup
    pub min_password_length: usize,
    /// Maximum password length (to prevent DoS)
    pub max_password_length: usize,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
            hash_length: 32,
            pepper: None,
            min_password_length: 8,
            max_password_length: 128,
        }
    }
}

/// Identity providers whose callbacks may create or update accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub recognized: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            recognized: vec!["google".to_string(), "github".to_string()],
        }
    }
}

impl ProviderConfig {
    /// `local` is never a provider, whatever the configuration says
    pub fn is_recognized(&self, provider: &AuthProvider) -> bool {
        !provider.is_local()
            && self
                .recognized
                .iter()
                .any(|tag| AuthProvider::new(tag) == *provider)
    }
}

impl AuthConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.jwt.secret.is_empty() {
            errors.push("JWT secret must be set".to_string());
        } else if let Err(e) = self.jwt.signing_key() {
            errors.push(e.to_string());
        }
        if let Err(e) = self.jwt.algorithm() {
            errors.push(e.to_string());
        }
        if self.jwt.token_lifetime.is_zero() {
            errors.push("JWT token lifetime must be positive".to_string());
        }

        if self.password.memory_cost < 19456 {
            errors.push("Argon2 memory cost should be at least 19456 KiB (OWASP recommendation)".to_string());
        }
        if self.password.time_cost < 2 {
            errors.push("Argon2 time cost should be at least 2 (OWASP recommendation)".to_string());
        }
        if self.password.min_password_length > self.password.max_password_length {
            errors.push("Minimum password length exceeds maximum".to_string());
        }

        if self
            .providers
            .recognized
            .iter()
            .any(|tag| AuthProvider::new(tag).is_local())
        {
            errors.push("`local` cannot be configured as an identity provider".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
