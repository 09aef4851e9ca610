//! API layer for Taskgate.
//!
//! REST interface via Axum. Every route under `/api/v1` except the `auth`
//! endpoints sits behind the bearer token layer; individual routes add their
//! own authorization gates with `route_layer`.
//!
//! # Routes
//!
//! - `/health`, `/metrics` (unversioned, public)
//! - `/api/v1/auth/*` (public)
//! - `/api/v1/tasks`, `/api/v1/users`, `/api/v1/admin` (authenticated)

mod handlers;
pub mod v1;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{CredentialVerifier, PasswordHasher, TokenService};
use crate::db::Store;
use crate::error::TaskgateError;
use crate::rbac::PolicyStore;
use crate::telemetry::MetricsRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: Arc<TokenService>,
    pub credentials: CredentialVerifier,
    pub policy: PolicyStore,
    pub hasher: PasswordHasher,
    pub metrics: MetricsRegistry,
}

impl AppState {
    /// Wire the services over one store.
    pub fn new(
        store: Arc<dyn Store>,
        tokens: TokenService,
        hasher: PasswordHasher,
        metrics: MetricsRegistry,
    ) -> crate::error::Result<Self> {
        let credentials = CredentialVerifier::new(store.clone(), hasher.clone())?;
        Ok(Self {
            policy: PolicyStore::new(store.clone()),
            tokens: Arc::new(tokens),
            credentials,
            hasher,
            metrics,
            store,
        })
    }
}

/// Build the API router.
///
/// This creates a router with:
/// - Health check endpoint (unversioned)
/// - Metrics endpoint (unversioned)
/// - V1 API routes under `/api/v1/`
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::prometheus_metrics))
        .nest(v1::V1_PREFIX, v1::v1_router(&state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// JSON body extractor whose rejection is a `BadRequest` in the standard
/// error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = TaskgateError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(TaskgateError::bad_request("invalid request body")
                .with_internal_message(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_success() {
        let response = ApiResponse::success("test data");
        assert!(response.success);
        assert_eq!(response.data, "test data");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], "test data");
    }
}
