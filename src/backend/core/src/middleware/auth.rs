//! Bearer token authentication middleware.
//!
//! Features:
//! - Strict `Authorization: Bearer <token>` parsing
//! - Stateless access token validation (no store access)
//! - Request context injection as a typed [`AuthContext`]
//!
//! # Example
//!
//! ```rust,ignore
//! use taskgate_core::middleware::auth::AuthLayer;
//!
//! let app = Router::new()
//!     .route("/api/v1/tasks", post(create_task))
//!     .layer(AuthLayer::new(token_service));
//! ```

use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{AccessClaims, TokenService};
use crate::error::{ErrorCode, TaskgateError};
use crate::rbac::roles::ADMIN_ROLE;
use crate::telemetry::{AuthMetrics, SensitiveFieldRedactor};

pub const MISSING_HEADER_MESSAGE: &str = "authorization header is required";
pub const MALFORMED_HEADER_MESSAGE: &str = "invalid authorization header format";
pub const UNAUTHENTICATED_MESSAGE: &str = "user not authenticated";

// ═══════════════════════════════════════════════════════════════════════════════
// Auth Context
// ═══════════════════════════════════════════════════════════════════════════════

/// The verified caller, built from access token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_any_role<I, S>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        roles.into_iter().any(|r| self.has_role(r.as_ref()))
    }

    /// `permission` is `resource:action`.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(ADMIN_ROLE)
    }
}

impl From<AccessClaims> for Principal {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            roles: claims.roles,
            permissions: claims.permissions,
        }
    }
}

/// Per-request authentication state stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthContext {
    Anonymous,
    Authenticated(Principal),
}

impl AuthContext {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Authenticated(principal) => Some(principal),
            Self::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Header Parsing
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The value must split on single spaces into exactly two parts, the first
/// being the literal `Bearer`.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, TaskgateError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| TaskgateError::unauthorized(MISSING_HEADER_MESSAGE))?;

    let value = value
        .to_str()
        .map_err(|_| TaskgateError::unauthorized(MALFORMED_HEADER_MESSAGE))?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(token),
        _ => Err(TaskgateError::unauthorized(MALFORMED_HEADER_MESSAGE)),
    }
}

fn failure_reason(error: &TaskgateError) -> &'static str {
    match error.code() {
        ErrorCode::ExpiredToken => "expired_token",
        ErrorCode::InvalidToken => "invalid_token",
        _ if error.user_message() == MISSING_HEADER_MESSAGE => "missing_header",
        _ => "malformed_header",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer and Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Authentication layer for Tower.
#[derive(Clone)]
pub struct AuthLayer {
    tokens: Arc<TokenService>,
}

impl AuthLayer {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            tokens: self.tokens.clone(),
        }
    }
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    tokens: Arc<TokenService>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let tokens = self.tokens.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let verified = extract_bearer(request.headers())
                .and_then(|token| {
                    tokens.validate_access_token(token).map_err(|e| {
                        debug!(
                            token = %SensitiveFieldRedactor::global().redact("token", token),
                            "Access token rejected"
                        );
                        e
                    })
                });

            match verified {
                Ok(claims) => {
                    AuthMetrics::record_auth_success("access_token");
                    request
                        .extensions_mut()
                        .insert(AuthContext::Authenticated(claims.into()));
                    inner.call(request).await
                }
                Err(e) => {
                    AuthMetrics::record_auth_failure(failure_reason(&e));
                    Ok(e.into_response())
                }
            }
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Extractors
// ═══════════════════════════════════════════════════════════════════════════════

/// Extractor for the authentication context; anonymous when the auth layer
/// did not run.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = TaskgateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .unwrap_or(AuthContext::Anonymous))
    }
}

/// Extractor that requires an authenticated caller.
#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = TaskgateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .and_then(|ctx| ctx.principal().cloned())
            .ok_or_else(|| TaskgateError::unauthorized(UNAUTHENTICATED_MESSAGE))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers(Some("Bearer abc.def.ghi"))).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header() {
        let err = extract_bearer(&headers(None)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(err.user_message(), MISSING_HEADER_MESSAGE);
    }

    #[test]
    fn test_malformed_headers() {
        for value in ["Basic abc", "bearer abc", "Bearer", "Bearer a b", "Bearer  abc", "abc"] {
            let err = extract_bearer(&headers(Some(value))).unwrap_err();
            assert_eq!(err.user_message(), MALFORMED_HEADER_MESSAGE, "value: {}", value);
        }
    }

    #[test]
    fn test_principal_from_claims() {
        let principal: Principal = AccessClaims {
            user_id: Uuid::new_v4(),
            username: "root".into(),
            roles: vec!["admin".into()],
            permissions: vec!["users:read".into()],
            iat: 0,
            exp: 0,
        }
        .into();

        assert!(principal.is_admin());
        assert!(principal.has_any_role(["user", "admin"]));
        assert!(principal.has_permission("users:read"));
        assert!(!principal.has_permission("users:delete"));
    }

    #[test]
    fn test_anonymous_context_has_no_principal() {
        assert!(AuthContext::Anonymous.principal().is_none());
        assert!(!AuthContext::Anonymous.is_authenticated());
    }
}
