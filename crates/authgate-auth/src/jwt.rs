//! Bearer token codec
//!
//! Tokens are HMAC-signed JWTs whose subject is the account id. The codec
//! is built once from [`JwtConfig`] and shared by value; it holds no
//! mutable state.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Claims carried by every bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account id
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
}

/// Issues and verifies bearer tokens
#[derive(Clone)]
pub struct TokenCodec {
    algorithm: Algorithm,
    lifetime: Duration,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec, decoding and checking the signing key
    pub fn new(config: &JwtConfig) -> AuthResult<Self> {
        let key = config.signing_key()?;
        let algorithm = config.algorithm()?;
        let lifetime = Duration::from_std(config.token_lifetime)
            .map_err(|e| AuthError::Config(format!("Invalid token lifetime: {}", e)))?;

        // Expiry is checked by hand against an explicit clock
        let mut validation = Validation::new(algorithm);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            algorithm,
            lifetime,
            encoding_key: EncodingKey::from_secret(&key),
            decoding_key: DecodingKey::from_secret(&key),
            validation,
        })
    }

    pub fn token_lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issue a token for an account, valid from `now` for the configured lifetime
    pub fn issue(&self, account_id: Uuid, now: DateTime<Utc>) -> AuthResult<String> {
        let claims = TokenClaims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to encode token: {}", e)))
    }

    /// Verify a token against the current time and return its subject
    pub fn parse(&self, token: &str) -> AuthResult<Uuid> {
        self.parse_at(token, Utc::now())
    }

    /// Verify a token against `now` and return its subject
    pub fn parse_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Uuid> {
        let claims = self.decode_claims(token)?;

        if claims.exp <= now.timestamp() {
            return Err(AuthError::TokenExpired);
        }

        Uuid::parse_str(&claims.sub).map_err(|_| AuthError::TokenInvalid)
    }

    /// True iff the token parses right now
    pub fn validate(&self, token: &str) -> bool {
        self.parse(token).is_ok()
    }

    /// Expiration instant of a correctly signed token
    pub fn expires_at(&self, token: &str) -> AuthResult<DateTime<Utc>> {
        let claims = self.decode_claims(token)?;
        Utc.timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(AuthError::TokenInvalid)
    }

    fn decode_claims(&self, token: &str) -> AuthResult<TokenClaims> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}
