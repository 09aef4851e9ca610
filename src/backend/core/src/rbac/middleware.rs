//! Axum authorization middleware that enforces gates on requests.
//!
//! This middleware reads the [`AuthContext`] injected by the auth layer and
//! evaluates a chain of [`Gate`]s against the caller's token claims and the
//! matched route parameters. Gates never touch the store.

use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams, Request},
    response::{IntoResponse, Response},
};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tower::{Layer, Service};
use tracing::warn;
use uuid::Uuid;

use super::models::{Action, Permission};
use super::roles::ADMIN_ROLE;
use crate::error::TaskgateError;
use crate::middleware::auth::{AuthContext, Principal, UNAUTHENTICATED_MESSAGE};
use crate::telemetry::AuthMetrics;

// ═══════════════════════════════════════════════════════════════════════════════
// Gates
// ═══════════════════════════════════════════════════════════════════════════════

/// A single authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// Caller holds at least one of the listed roles.
    Role(Vec<String>),
    /// Caller's permission set contains the permission.
    Permission(Permission),
    /// Role check, then permission check.
    RoleAndPermission { role: String, permission: Permission },
    /// Admins pass; otherwise the named path parameter must equal the
    /// caller's user id.
    OwnershipOrAdmin { param: &'static str },
}

/// Why a gate refused the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateDenial {
    #[error("insufficient permissions - role required")]
    RoleRequired,

    #[error("insufficient permissions - permission required")]
    PermissionRequired,

    #[error("resource ID not provided")]
    MissingResourceId,

    #[error("invalid resource ID format")]
    InvalidResourceId,

    #[error("access denied - resource ownership required")]
    OwnershipRequired,
}

impl GateDenial {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::RoleRequired => "role",
            Self::PermissionRequired => "permission",
            Self::MissingResourceId | Self::InvalidResourceId => "bad_resource_id",
            Self::OwnershipRequired => "ownership",
        }
    }
}

impl From<GateDenial> for TaskgateError {
    fn from(denial: GateDenial) -> Self {
        match denial {
            GateDenial::MissingResourceId | GateDenial::InvalidResourceId => {
                TaskgateError::bad_request(denial.to_string())
            }
            _ => TaskgateError::forbidden(denial.to_string()),
        }
    }
}

impl Gate {
    pub fn role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Role(roles.into_iter().map(Into::into).collect())
    }

    pub fn permission(resource: &str, action: Action) -> Self {
        Self::Permission(Permission::new(resource, action))
    }

    pub fn role_and_permission(role: &str, resource: &str, action: Action) -> Self {
        Self::RoleAndPermission {
            role: role.to_string(),
            permission: Permission::new(resource, action),
        }
    }

    pub fn ownership_or_admin(param: &'static str) -> Self {
        Self::OwnershipOrAdmin { param }
    }

    /// Evaluate against the caller and the matched path parameters.
    pub fn evaluate(
        &self,
        principal: &Principal,
        params: &HashMap<String, String>,
    ) -> Result<(), GateDenial> {
        match self {
            Self::Role(allowed) => {
                if principal.has_any_role(allowed) {
                    Ok(())
                } else {
                    Err(GateDenial::RoleRequired)
                }
            }
            Self::Permission(permission) => check_permission(principal, permission),
            Self::RoleAndPermission { role, permission } => {
                if !principal.has_role(role) {
                    return Err(GateDenial::RoleRequired);
                }
                check_permission(principal, permission)
            }
            Self::OwnershipOrAdmin { param } => {
                if principal.has_role(ADMIN_ROLE) {
                    return Ok(());
                }
                let raw = params
                    .get(*param)
                    .filter(|v| !v.is_empty())
                    .ok_or(GateDenial::MissingResourceId)?;
                let owner = Uuid::parse_str(raw).map_err(|_| GateDenial::InvalidResourceId)?;
                if owner == principal.user_id {
                    Ok(())
                } else {
                    Err(GateDenial::OwnershipRequired)
                }
            }
        }
    }

    fn needs_path_params(&self) -> bool {
        matches!(self, Self::OwnershipOrAdmin { .. })
    }
}

fn check_permission(principal: &Principal, permission: &Permission) -> Result<(), GateDenial> {
    if principal.has_permission(&permission.to_string()) {
        Ok(())
    } else {
        Err(GateDenial::PermissionRequired)
    }
}

/// Evaluate gates in order, stopping at the first denial.
pub fn evaluate_chain(
    gates: &[Gate],
    principal: &Principal,
    params: &HashMap<String, String>,
) -> Result<(), GateDenial> {
    gates.iter().try_for_each(|gate| gate.evaluate(principal, params))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Layer
// ═══════════════════════════════════════════════════════════════════════════════

/// Layer that wraps services with gate enforcement.
///
/// Apply with `route_layer` so that path parameters are available.
///
/// # Example
///
/// ```rust,ignore
/// use taskgate_core::rbac::{Action, Gate, GateLayer};
///
/// let app = Router::new()
///     .route("/api/v1/users/:user_id/tasks", get(list_user_tasks))
///     .route_layer(GateLayer::new([
///         Gate::permission("tasks", Action::Read),
///         Gate::ownership_or_admin("user_id"),
///     ]));
/// ```
#[derive(Clone)]
pub struct GateLayer {
    gates: Arc<[Gate]>,
}

impl GateLayer {
    pub fn new(gates: impl IntoIterator<Item = Gate>) -> Self {
        Self {
            gates: gates.into_iter().collect(),
        }
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            gates: self.gates.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tower Service
// ═══════════════════════════════════════════════════════════════════════════════

/// Service that enforces a gate chain per request.
#[derive(Clone)]
pub struct GateService<S> {
    inner: S,
    gates: Arc<[Gate]>,
}

impl<S> Service<Request<Body>> for GateService<S>
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

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let gates = self.gates.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let principal = match request.extensions().get::<AuthContext>() {
                Some(AuthContext::Authenticated(principal)) => principal.clone(),
                _ => {
                    return Ok(TaskgateError::unauthorized(UNAUTHENTICATED_MESSAGE).into_response());
                }
            };

            let (mut parts, body) = request.into_parts();
            let params = if gates.iter().any(Gate::needs_path_params) {
                path_params(&mut parts).await
            } else {
                HashMap::new()
            };

            if let Err(denial) = evaluate_chain(&gates, &principal, &params) {
                warn!(
                    user_id = %principal.user_id,
                    path = %parts.uri.path(),
                    reason = %denial,
                    "Request denied by authorization gate"
                );
                AuthMetrics::record_gate_denial(denial.metric_label());
                return Ok(TaskgateError::from(denial).into_response());
            }

            inner.call(Request::from_parts(parts, body)).await
        })
    }
}

async fn path_params(parts: &mut axum::http::request::Parts) -> HashMap<String, String> {
    match RawPathParams::from_request_parts(parts, &()).await {
        Ok(raw) => raw
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
        Err(_) => HashMap::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
