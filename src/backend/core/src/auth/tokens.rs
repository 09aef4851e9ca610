//! Access and refresh token lifecycle.
//!
//! Access tokens are HS256 JWTs whose claims snapshot the holder's roles and
//! permissions at issuance. Refresh tokens are random UUIDs backed by a store
//! row; redeeming one deletes that row and mints a fresh pair, so each refresh
//! token is good for exactly one rotation.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::claims::AccessClaims;
use crate::config::AuthConfig;
use crate::db::{RefreshTokenRecord, Store, User};
use crate::error::{Result, TaskgateError};
use crate::rbac::PolicyStore;
use crate::telemetry::AuthMetrics;

/// Signing secret and lifetimes, injected at construction.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl TryFrom<&AuthConfig> for TokenConfig {
    type Error = TaskgateError;

    fn try_from(config: &AuthConfig) -> Result<Self> {
        Ok(Self {
            secret: config.jwt_secret.clone(),
            access_ttl: ttl("auth.access_token_ttl_secs", config.access_token_ttl_secs)?,
            refresh_ttl: ttl("auth.refresh_token_ttl_secs", config.refresh_token_ttl_secs)?,
        })
    }
}

fn ttl(key: &str, secs: u64) -> Result<Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .filter(|d| *d > Duration::zero())
        .ok_or_else(|| TaskgateError::configuration(format!("{} is out of range: {}", key, secs)))
}

/// Tokens returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    store: Arc<dyn Store>,
    policy: PolicyStore,
}

impl TokenService {
    pub fn new(config: TokenConfig, store: Arc<dyn Store>, policy: PolicyStore) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            store,
            policy,
        }
    }

    /// Mint an access token and a persisted refresh token for `user`.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn issue_tokens(&self, user: &User) -> Result<TokenPair> {
        let grants = self.policy.resolve(user.id).await.map_err(|e| {
            TaskgateError::token_issuance_failed("role resolution failed").with_source(e)
        })?;

        let now = Utc::now();
        let claims = AccessClaims {
            user_id: user.id,
            username: user.username.clone(),
            roles: grants.roles,
            permissions: grants.permissions,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        let access_token = self.encode_claims(&claims)?;

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: user.id,
            refresh_token: Uuid::new_v4(),
            expires_at: now + self.refresh_ttl,
            created_at: now,
        };
        self.store.insert_refresh_token(&record).await.map_err(|e| {
            TaskgateError::token_issuance_failed("refresh token persistence failed").with_source(e)
        })?;

        AuthMetrics::record_tokens_issued();
        debug!(roles = ?claims.roles, "Issued token pair");

        Ok(TokenPair {
            access_token,
            refresh_token: record.refresh_token.to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Sign `claims` as-is.
    pub fn encode_claims(&self, claims: &AccessClaims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            TaskgateError::token_issuance_failed(format!("signing failed: {}", e))
        })
    }

    /// Verify signature and expiry; returns the embedded claims unchanged.
    ///
    /// Never consults the store.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims> {
        decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TaskgateError::expired_token(),
                _ => TaskgateError::invalid_token().with_internal_message(e.to_string()),
            })
    }

    /// Exchange a live refresh token for a new pair, consuming the old one.
    #[instrument(skip(self, value))]
    pub async fn refresh_tokens(&self, value: &str) -> Result<TokenPair> {
        let token = Self::parse_refresh_token(value)?;

        let record = match self.store.find_refresh_token(token).await? {
            Some(record) => record,
            None => {
                AuthMetrics::record_refresh("invalid");
                return Err(TaskgateError::invalid_refresh_token());
            }
        };

        if record.is_expired_at(Utc::now()) {
            AuthMetrics::record_refresh("expired");
            return Err(TaskgateError::refresh_token_expired());
        }

        let user = match self.store.find_user_by_id(record.user_id).await? {
            Some(user) => user,
            None => {
                warn!(user_id = %record.user_id, "Refresh token owner no longer exists");
                AuthMetrics::record_refresh("invalid");
                return Err(TaskgateError::invalid_refresh_token());
            }
        };

        let pair = self.issue_tokens(&user).await?;

        match self.store.delete_refresh_token(token).await {
            Ok(0) => {
                // A concurrent redemption consumed the token first.
                self.discard_minted(&pair).await;
                AuthMetrics::record_refresh("replayed");
                warn!(user_id = %user.id, "Refresh token already consumed");
                Err(TaskgateError::invalid_refresh_token())
            }
            Ok(_) => {
                AuthMetrics::record_refresh("rotated");
                info!(user_id = %user.id, "Refresh token rotated");
                Ok(pair)
            }
            Err(e) => {
                AuthMetrics::record_refresh("delete_failed");
                error!(
                    user_id = %user.id,
                    error = %e,
                    "Failed to delete redeemed refresh token; old token remains valid until expiry"
                );
                Ok(pair)
            }
        }
    }

    /// Delete a refresh token (logout).
    pub async fn revoke_refresh_token(&self, value: &str) -> Result<()> {
        let token = Self::parse_refresh_token(value)?;
        match self.store.delete_refresh_token(token).await? {
            0 => Err(TaskgateError::invalid_refresh_token()),
            _ => Ok(()),
        }
    }

    /// Remove every refresh token whose expiry is in the past.
    pub async fn purge_expired(&self) -> Result<u64> {
        self.store.delete_expired_refresh_tokens(Utc::now()).await
    }

    fn parse_refresh_token(value: &str) -> Result<Uuid> {
        Uuid::parse_str(value.trim()).map_err(|_| {
            AuthMetrics::record_refresh("invalid");
            TaskgateError::invalid_refresh_token()
        })
    }

    async fn discard_minted(&self, pair: &TokenPair) {
        let Ok(token) = Uuid::parse_str(&pair.refresh_token) else {
            return;
        };
        if let Err(e) = self.store.delete_refresh_token(token).await {
            error!(error = %e, "Failed to discard refresh token minted for a replayed redemption");
        }
    }
}
