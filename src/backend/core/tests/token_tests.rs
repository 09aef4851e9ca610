//! Token lifecycle tests through the HTTP surface.
//!
//! Tests cover:
//! - Bearer header parsing failures
//! - Expired versus tampered access tokens
//! - Single-use refresh token rotation, including concurrent redemption
//! - Logout and expired refresh token cleanup

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::Utc;
use common::{error_code, error_message, spawn_app};
use serde_json::json;
use std::sync::Arc;
use taskgate_core::auth::AccessClaims;
use taskgate_core::db::{RefreshTokenRecord, Store};
use uuid::Uuid;

// ============================================================================
// Authorization Header
// ============================================================================

#[tokio::test]
async fn test_missing_header() {
    let app = spawn_app().await;
    let (status, body) = app.send(Method::GET, "/api/v1/users/profile", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "authorization header is required");
}

#[tokio::test]
async fn test_malformed_headers() {
    let app = spawn_app().await;
    let session = app.user("alice").await;

    for value in [
        format!("Token {}", session.access_token),
        format!("bearer {}", session.access_token),
        format!("Bearer {} extra", session.access_token),
        "Bearer".to_string(),
    ] {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/v1/users/profile")
            .header(header::AUTHORIZATION, value.as_str())
            .body(Body::empty())
            .unwrap();
        let (status, body) = app.send_request(request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", value);
        assert_eq!(error_message(&body), "invalid authorization header format");
    }
}

// ============================================================================
// Access Tokens
// ============================================================================

#[tokio::test]
async fn test_expired_and_tampered_tokens_are_distinguished() {
    let app = spawn_app().await;
    let session = app.user("alice").await;

    let now = Utc::now().timestamp();
    let expired = app
        .tokens
        .encode_claims(&AccessClaims {
            user_id: session.user_id,
            username: "alice".into(),
            roles: vec!["user".into()],
            permissions: vec!["tasks:read".into()],
            iat: now - 120,
            exp: now - 60,
        })
        .unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/profile", Some(&expired), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "EXPIRED_TOKEN");

    let mut tampered = session.access_token.clone().into_bytes();
    let at = session.access_token.rfind('.').unwrap() + 5;
    tampered[at] = if tampered[at] == b'A' { b'B' } else { b'A' };
    let tampered = String::from_utf8(tampered).unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/v1/users/profile", Some(&tampered), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "INVALID_TOKEN");
}

#[tokio::test]
async fn test_forged_admin_claims_rejected() {
    let app = spawn_app().await;
    let session = app.user("alice").await;

    // Re-sign elevated claims with a different key.
    let forger = taskgate_core::auth::TokenService::new(
        taskgate_core::auth::TokenConfig {
            secret: "a-completely-different-secret-of-decent-length".into(),
            ..common::token_config()
        },
        app.store.clone(),
        app.policy.clone(),
    );
    let mut claims = app.tokens.validate_access_token(&session.access_token).unwrap();
    claims.roles.push("admin".into());
    claims.permissions.push("tasks:read".into());
    let forged = forger.encode_claims(&claims).unwrap();

    let (status, body) = app.send(Method::GET, "/api/v1/tasks", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "INVALID_TOKEN");
}

// ============================================================================
// Refresh Rotation
// ============================================================================

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let app = spawn_app().await;
    let session = app.user("alice").await;
    let body = json!({ "refresh_token": session.refresh_token });

    let (status, first) = app
        .send(Method::POST, "/api/v1/auth/refresh", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(first["refresh_token"], session.refresh_token.as_str());
    assert!(first["expires_in"].as_i64().unwrap() > 0);

    let (status, second) = app
        .send(Method::POST, "/api/v1/auth/refresh", None, Some(body))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&second), "INVALID_REFRESH_TOKEN");

    // The rotated token works exactly once more.
    let (status, _) = app
        .send(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": first["refresh_token"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_with_malformed_or_unknown_token() {
    let app = spawn_app().await;

    for token in ["not-a-uuid".to_string(), Uuid::new_v4().to_string()] {
        let (status, body) = app
            .send(
                Method::POST,
                "/api/v1/auth/refresh",
                None,
                Some(json!({ "refresh_token": token })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "INVALID_REFRESH_TOKEN");
    }
}

#[tokio::test]
async fn test_expired_refresh_token() {
    let app = spawn_app().await;
    let session = app.user("alice").await;

    let stale = Uuid::new_v4();
    app.store
        .insert_refresh_token(&RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            refresh_token: stale,
            expires_at: Utc::now() - chrono::Duration::seconds(1),
            created_at: Utc::now() - chrono::Duration::hours(1),
        })
        .await
        .unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/v1/auth/refresh",
            None,
            Some(json!({ "refresh_token": stale })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "REFRESH_TOKEN_EXPIRED");

    assert_eq!(app.tokens.purge_expired().await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_has_one_winner() {
    let app = spawn_app().await;
    let session = app.user("alice").await;
    let tokens = app.tokens.clone();
    let refresh_token = Arc::new(session.refresh_token);

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let tokens = tokens.clone();
            let refresh_token = refresh_token.clone();
            tokio::spawn(async move { tokens.refresh_tokens(&refresh_token).await })
        })
        .collect();

    let mut winners = 0;
    for attempt in attempts {
        if attempt.await.unwrap().is_ok() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    // Losers must not leave a live token behind.
    assert_eq!(app.store.refresh_token_count(session.user_id), 1);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = spawn_app().await;
    let session = app.user("alice").await;
    let body = json!({ "refresh_token": session.refresh_token });

    let (status, _) = app
        .send(Method::POST, "/api/v1/auth/logout", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(Method::POST, "/api/v1/auth/refresh", None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::POST, "/api/v1/auth/logout", None, Some(body))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_access_token_survives_logout_until_expiry() {
    let app = spawn_app().await;
    let session = app.user("alice").await;

    app.send(
        Method::POST,
        "/api/v1/auth/logout",
        None,
        Some(json!({ "refresh_token": session.refresh_token })),
    )
    .await;

    let (status, _) = app
        .send(Method::GET, "/api/v1/users/profile", Some(&session.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}
