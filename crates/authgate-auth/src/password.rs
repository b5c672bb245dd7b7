//! Credential verification
//!
//! Argon2id hashing (OWASP recommended) with an optional pepper. Stored
//! hashes are PHC strings; anything else never verifies.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::config::PasswordConfig;
use crate::error::{AuthError, AuthResult};

/// Hashes and checks plaintext secrets
#[derive(Clone)]
pub struct CredentialVerifier {
    config: PasswordConfig,
}

impl CredentialVerifier {
    pub fn new(config: PasswordConfig) -> Self {
        Self { config }
    }

    /// Hash a plaintext secret with a fresh salt
    pub fn hash(&self, plaintext: &str) -> AuthResult<String> {
        let peppered = self.peppered(plaintext);
        let salt = SaltString::generate(&mut OsRng);

        let params = Params::new(
            self.config.memory_cost,
            self.config.time_cost,
            self.config.parallelism,
            Some(self.config.hash_length as usize),
        )
        .map_err(|e| AuthError::Config(format!("Invalid Argon2 params: {}", e)))?;

        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

        let hash = argon2
            .hash_password(peppered.as_bytes(), &salt)
            .map_err(|_| AuthError::PasswordHashingFailed)?;

        Ok(hash.to_string())
    }

    /// True iff `plaintext` verifies against the stored hash.
    ///
    /// Malformed or non-PHC hashes yield `false`.
    pub fn matches(&self, plaintext: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        // Parameters come from the PHC string itself
        Argon2::default()
            .verify_password(self.peppered(plaintext).as_bytes(), &parsed)
            .is_ok()
    }

    /// Opaque credential for provider-created accounts. Not a PHC string,
    /// so it never verifies.
    pub fn random_credential(&self) -> String {
        let mut bytes = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut bytes[..]);
        URL_SAFE_NO_PAD.encode(&bytes[..])
    }

    /// Length bounds enforced at signup
    pub fn validate_password_policy(&self, plaintext: &str) -> AuthResult<()> {
        let length = plaintext.chars().count();

        if length < self.config.min_password_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at least {} characters",
                self.config.min_password_length
            )));
        }

        if length > self.config.max_password_length {
            return Err(AuthError::WeakPassword(format!(
                "Password must be at most {} characters",
                self.config.max_password_length
            )));
        }

        Ok(())
    }

    fn peppered(&self, plaintext: &str) -> Zeroizing<String> {
        match self.config.pepper {
            Some(ref pepper) => Zeroizing::new(format!("{}{}", plaintext, pepper)),
            None => Zeroizing::new(plaintext.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> PasswordConfig {
        PasswordConfig {
            // Use lower values for tests to be fast
            memory_cost: 4096,
            time_cost: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_hash_and_match() {
        let verifier = CredentialVerifier::new(test_config());
        let hash = verifier.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));

        assert!(verifier.matches("correct horse", &hash));
        assert!(!verifier.matches("wrong horse", &hash));
    }

    #[test]
    fn test_same_plaintext_different_hashes() {
        let verifier = CredentialVerifier::new(test_config());
        let first = verifier.hash("correct horse").unwrap();
        let second = verifier.hash("correct horse").unwrap();

        assert_ne!(first, second);
        assert!(verifier.matches("correct horse", &first));
        assert!(verifier.matches("correct horse", &second));
    }

    #[test]
    fn test_pepper_must_match() {
        let mut config = test_config();
        config.pepper = Some("secret-pepper".to_string());
        let peppered = CredentialVerifier::new(config);

        let hash = peppered.hash("correct horse").unwrap();
        assert!(peppered.matches("correct horse", &hash));
        assert!(!CredentialVerifier::new(test_config()).matches("correct horse", &hash));
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        let verifier = CredentialVerifier::new(test_config());
        assert!(!verifier.matches("anything", ""));
        assert!(!verifier.matches("anything", "not-a-phc-string"));
        assert!(!verifier.matches("anything", "$argon2id$garbage"));
    }

    #[test]
    fn test_random_credential_never_matches() {
        let verifier = CredentialVerifier::new(test_config());
        let credential = verifier.random_credential();

        assert_ne!(credential, verifier.random_credential());
        assert!(!verifier.matches(&credential, &credential));
        assert!(!verifier.matches("", &credential));
    }

    #[test]
    fn test_password_policy() {
        let verifier = CredentialVerifier::new(test_config());
        assert!(verifier.validate_password_policy("long enough").is_ok());
        assert!(matches!(
            verifier.validate_password_policy("short"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(matches!(
            verifier.validate_password_policy(&"x".repeat(129)),
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[test]
    fn test_password_policy_counts_characters() {
        let verifier = CredentialVerifier::new(test_config());
        // Four characters, twelve bytes
        assert!(matches!(
            verifier.validate_password_policy("密码密码"),
            Err(AuthError::WeakPassword(_))
        ));
        assert!(verifier.validate_password_policy("密码密码密码密码").is_ok());
        // 128 characters, 256 bytes
        assert!(verifier.validate_password_policy(&"é".repeat(128)).is_ok());
    }
}
