//! Username/password verification.

use std::sync::Arc;
use tracing::{debug, instrument};

use super::password::PasswordHasher;
use crate::db::{Store, User};
use crate::error::{Result, TaskgateError};
use crate::telemetry::AuthMetrics;

/// Verifies a username/password pair against the stored Argon2id hash.
///
/// An unknown username still pays for one hash verification against a
/// precomputed dummy hash, so both failure paths take comparable time and
/// return the same error.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    dummy_hash: Arc<str>,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn Store>, hasher: PasswordHasher) -> Result<Self> {
        let dummy_hash = hasher.hash_blocking("taskgate-dummy-credential")?;
        Ok(Self {
            store,
            hasher,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn verify(&self, username: &str, password: &str) -> Result<User> {
        let user = self.store.find_user_by_username(username).await?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => self.dummy_hash.to_string(),
        };
        let matches = self
            .hasher
            .verify(password.to_string(), stored_hash)
            .await?;

        match user {
            Some(user) if matches => {
                AuthMetrics::record_auth_success("password");
                Ok(user)
            }
            Some(_) => {
                debug!("Password mismatch");
                AuthMetrics::record_auth_failure("invalid_credentials");
                Err(TaskgateError::invalid_credentials())
            }
            None => {
                debug!("Unknown username");
                AuthMetrics::record_auth_failure("invalid_credentials");
                Err(TaskgateError::invalid_credentials())
            }
        }
    }
}
