//! HTTP middleware for Taskgate.
//!
//! Authentication lives here; authorization gates are in [`crate::rbac`].

pub mod auth;

pub use auth::{extract_bearer, AuthContext, AuthLayer, AuthService, Principal};
