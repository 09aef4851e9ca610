//! Shared harness: the full router over an in-memory store.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use taskgate_core::{
    api::{build_router, AppState},
    auth::{PasswordHasher, TokenConfig, TokenService},
    config::PasswordHashingConfig,
    db::{MemoryStore, Store},
    rbac::PolicyStore,
    telemetry::MetricsRegistry,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration-test-signing-secret-0123456789";
pub const PASSWORD: &str = "correct-horse";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub policy: PolicyStore,
    pub tokens: Arc<TokenService>,
}

pub struct Session {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn token_config() -> TokenConfig {
    TokenConfig {
        secret: SECRET.to_string(),
        access_ttl: chrono::Duration::minutes(15),
        refresh_ttl: chrono::Duration::hours(1),
    }
}

pub async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let dyn_store: Arc<dyn Store> = store.clone();

    let policy = PolicyStore::new(dyn_store.clone());
    policy.seed_defaults().await.unwrap();

    let hasher = PasswordHasher::new(&PasswordHashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap();
    let tokens = TokenService::new(token_config(), dyn_store.clone(), policy.clone());

    let state = AppState::new(dyn_store, tokens, hasher, MetricsRegistry::disabled()).unwrap();
    let tokens = state.tokens.clone();

    TestApp {
        router: build_router(state),
        store,
        policy,
        tokens,
    }
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn register(&self, username: &str) -> Uuid {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn login(&self, username: &str) -> Session {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": username, "password": PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);

        let access_token = body["access_token"].as_str().unwrap().to_string();
        let claims = self.tokens.validate_access_token(&access_token).unwrap();
        Session {
            user_id: claims.user_id,
            access_token,
            refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn user(&self, username: &str) -> Session {
        self.register(username).await;
        self.login(username).await
    }

    /// Registers, promotes to admin, then logs in so the token carries the role.
    pub async fn admin(&self, username: &str) -> Session {
        let id = self.register(username).await;
        self.policy.assign_role(id, "admin").await.unwrap();
        self.login(username).await
    }

    pub async fn create_task(&self, token: &str, title: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/v1/tasks",
                Some(token),
                Some(json!({ "title": title })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create task failed: {}", body);
        body["data"].clone()
    }
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

pub fn error_message(body: &Value) -> &str {
    body["error"]["message"].as_str().unwrap_or_default()
}
