//! Registration and session endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::api::{ApiResponse, AppState, JsonBody};
use crate::db::{NewUser, User};
use crate::error::{Result, TaskgateError};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> Result<()> {
        let username_len = self.username.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&username_len) {
            return Err(TaskgateError::validation(format!(
                "username must be between {} and {} characters",
                USERNAME_MIN, USERNAME_MAX
            )));
        }
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        {
            return Err(TaskgateError::validation(
                "username may only contain letters, digits, '_', '.' and '-'",
            ));
        }

        let email_ok = match self.email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
            None => false,
        };
        if !email_ok {
            return Err(TaskgateError::validation("invalid email address"));
        }

        if self.password.chars().count() < PASSWORD_MIN {
            return Err(TaskgateError::validation(format!(
                "password must be at least {} characters",
                PASSWORD_MIN
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for RegisteredUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[instrument(skip(state, req), fields(username = %req.username))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse> {
    req.validate()?;

    if state.store.find_user_by_username(&req.username).await?.is_some() {
        return Err(TaskgateError::conflict("username already exists"));
    }

    let password_hash = state.hasher.hash(req.password).await?;
    let user = state
        .store
        .insert_user(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        })
        .await?;
    state.policy.assign_default_role(user.id).await?;

    info!(user_id = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(RegisteredUser::from(user))),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse> {
    if req.username.is_empty() || req.password.is_empty() {
        return Err(TaskgateError::bad_request("invalid request body"));
    }

    let user = state.credentials.verify(&req.username, &req.password).await?;
    let pair = state.tokens.issue_tokens(&user).await?;
    info!(user_id = %user.id, "User logged in");
    Ok(Json(pair))
}

pub async fn refresh(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<impl IntoResponse> {
    let pair = state.tokens.refresh_tokens(&req.refresh_token).await?;
    Ok(Json(pair))
}

pub async fn logout(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> Result<impl IntoResponse> {
    state.tokens.revoke_refresh_token(&req.refresh_token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(request("alice_01", "alice@example.com", "secret1").validate().is_ok());
    }

    #[test]
    fn test_registration_rejections() {
        assert!(request("al", "alice@example.com", "secret1").validate().is_err());
        assert!(request("alice smith", "alice@example.com", "secret1").validate().is_err());
        assert!(request("alice", "alice.example.com", "secret1").validate().is_err());
        assert!(request("alice", "@example.com", "secret1").validate().is_err());
        assert!(request("alice", "alice@example.com", "short").validate().is_err());
    }
}
