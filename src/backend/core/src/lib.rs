#![allow(clippy::result_large_err)]
//! # Taskgate Core
//!
//! Authentication and authorization for a task-management HTTP API.
//!
//! ## Architecture
//!
//! - **Auth**: Argon2id credential verification, HS256 access tokens and
//!   single-use rotating refresh tokens
//! - **RBAC**: Role and permission policy store, route gates and
//!   resource ownership checks
//! - **Middleware**: Bearer token authentication as a Tower layer
//! - **DB**: Persistence behind the [`db::Store`] trait (PostgreSQL or in-memory)
//! - **Telemetry**: Structured logging, OTLP tracing and Prometheus metrics

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod rbac;
pub mod telemetry;

pub use error::{ErrorCode, Result, TaskgateError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{build_router, AppState};
    pub use crate::auth::{AccessClaims, CredentialVerifier, PasswordHasher, TokenPair, TokenService};
    pub use crate::db::{MemoryStore, PgStore, Store, Task, User};
    pub use crate::error::{ErrorCode, Result, TaskgateError};
    pub use crate::middleware::{AuthContext, AuthLayer, Principal};
    pub use crate::rbac::{Action, Gate, GateLayer, Permission, PolicyStore, PredefinedRole};
}
