//! V1 API module for Taskgate.
//!
//! This module contains the stable V1 API endpoints for:
//! - Registration, login, token refresh and logout
//! - Task management with ownership enforcement
//! - User administration and role assignment

pub mod auth;
pub mod routes;
pub mod tasks;
pub mod users;

pub use routes::{v1_router, V1_PREFIX};

use uuid::Uuid;

use crate::error::{Result, TaskgateError};

/// Parse a path identifier, reporting `BadRequest` on malformed input.
pub(crate) fn parse_id(raw: &str, entity: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| TaskgateError::bad_request(format!("invalid {} ID", entity)))
}
