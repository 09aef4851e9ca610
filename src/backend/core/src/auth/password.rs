//! Argon2id password hashing.
//!
//! Hashing is CPU and memory heavy by construction, so the async entry points
//! run it on the blocking pool instead of a runtime worker.

use argon2::{
    password_hash::SaltString, Algorithm, Argon2, Params, PasswordHash,
    PasswordHasher as _, PasswordVerifier, Version,
};
use rand::rngs::OsRng;
use tracing::warn;

use crate::config::PasswordHashingConfig;
use crate::error::{Result, TaskgateError};

#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

impl PasswordHasher {
    pub fn new(config: &PasswordHashingConfig) -> Result<Self> {
        let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
            .map_err(|e| TaskgateError::configuration(format!("invalid argon2 parameters: {}", e)))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash `password` into a PHC string. Blocks the calling thread.
    pub fn hash_blocking(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| TaskgateError::internal(format!("password hashing failed: {}", e)))
    }

    /// Check `password` against a stored PHC string. A malformed stored hash
    /// counts as a mismatch. Blocks the calling thread.
    pub fn verify_blocking(&self, password: &str, stored_hash: &str) -> bool {
        let parsed = match PasswordHash::new(stored_hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };
        self.argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    pub async fn hash(&self, password: String) -> Result<String> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password))
            .await
            .map_err(|e| TaskgateError::internal(format!("hashing task failed: {}", e)))?
    }

    pub async fn verify(&self, password: String, stored_hash: String) -> Result<bool> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify_blocking(&password, &stored_hash))
            .await
            .map_err(|e| TaskgateError::internal(format!("verification task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> PasswordHasher {
        PasswordHasher::new(&PasswordHashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_hash_is_argon2id_phc() {
        let hash = fast_hasher().hash_blocking("hunter22").unwrap();
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_verify_matches_only_original() {
        let hasher = fast_hasher();
        let hash = hasher.hash_blocking("hunter22").unwrap();
        assert!(hasher.verify_blocking("hunter22", &hash));
        assert!(!hasher.verify_blocking("hunter23", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let hasher = fast_hasher();
        assert_ne!(
            hasher.hash_blocking("same").unwrap(),
            hasher.hash_blocking("same").unwrap()
        );
    }

    #[test]
    fn test_malformed_hash_is_mismatch() {
        assert!(!fast_hasher().verify_blocking("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let err = PasswordHasher::new(&PasswordHashingConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        })
        .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidConfiguration);
    }

    #[tokio::test]
    async fn test_async_round_trip() {
        let hasher = fast_hasher();
        let hash = hasher.hash("secret-pass".to_string()).await.unwrap();
        assert!(hasher.verify("secret-pass".to_string(), hash).await.unwrap());
    }
}
