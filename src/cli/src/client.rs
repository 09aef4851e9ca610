//! HTTP client for communicating with the Taskgate API server.
//!
//! Authenticated calls carry the saved access token. A `401` triggers one
//! refresh attempt and one retry; the rotated pair is written back to the
//! session file because the old refresh token is now spent.

use anyhow::{Context, Result};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::session::{Session, SessionStore};

/// Success envelope used by every non-token endpoint.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[allow(dead_code)]
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorInfo,
}

#[derive(Debug, Deserialize)]
struct ErrorInfo {
    code: String,
    message: String,
}

/// Token pair returned bare by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

/// An API failure, carrying the server's machine-readable code when present.
#[derive(Debug, thiserror::Error)]
#[error("API error ({status}): {code} {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

/// HTTP client for the Taskgate API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Mutex<Option<Session>>,
    store: Option<SessionStore>,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Mutex::new(None),
            store: None,
        })
    }

    /// Load the saved session from `store` and persist future rotations there.
    pub fn with_session_store(mut self, store: SessionStore) -> Result<Self> {
        self.session = Mutex::new(store.load()?);
        self.store = Some(store);
        Ok(self)
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }

    /// Replace the current session and persist it.
    pub async fn set_session(&self, session: Option<Session>) -> Result<()> {
        if let Some(store) = &self.store {
            match &session {
                Some(s) => store.save(s)?,
                None => store.clear()?,
            }
        }
        *self.session.lock().await = session;
        Ok(())
    }

    // ── Requests ────────────────────────────────────────────────────────────

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send(Method::GET, path, None).await?;
        decode_envelope(resp).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body).context("Failed to serialize request")?;
        let resp = self.send(Method::POST, path, Some(&body)).await?;
        decode_envelope(resp).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body).context("Failed to serialize request")?;
        let resp = self.send(Method::PUT, path, Some(&body)).await?;
        decode_envelope(resp).await
    }

    /// DELETE with an enveloped response body.
    pub async fn delete_with<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.send(Method::DELETE, path, None).await?;
        decode_envelope(resp).await
    }

    /// DELETE expecting `204 No Content`.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let resp = self.send(Method::DELETE, path, None).await?;
        check_status(resp).await.map(|_| ())
    }

    /// Unauthenticated POST whose response is not enveloped.
    pub async fn post_public<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body).context("Failed to serialize request")?;
        let resp = self.send_once(Method::POST, path, Some(&body), None).await?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", path))
    }

    /// Unauthenticated POST expecting no body.
    pub async fn post_public_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let body = serde_json::to_value(body).context("Failed to serialize request")?;
        let resp = self.send_once(Method::POST, path, Some(&body), None).await?;
        check_status(resp).await.map(|_| ())
    }

    /// Perform a raw GET request and return the full JSON value (for health endpoint).
    pub async fn get_raw(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        // Unhealthy is reported with 503 and a body worth showing.
        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
        let token = self.access_token().await;
        let resp = self.send_once(method.clone(), path, body, token.as_deref()).await?;

        if resp.status() != StatusCode::UNAUTHORIZED || token.is_none() {
            return Ok(resp);
        }
        match self.refresh().await? {
            Some(token) => self.send_once(method, path, body, Some(&token)).await,
            None => Ok(resp),
        }
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))
    }

    async fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Redeem the saved refresh token. Returns the new access token, or `None`
    /// when the session cannot be refreshed (in which case it is discarded).
    async fn refresh(&self) -> Result<Option<String>> {
        let Some(mut session) = self.session().await else {
            return Ok(None);
        };

        let body = serde_json::json!({ "refresh_token": session.refresh_token });
        let resp = self
            .send_once(Method::POST, "/api/v1/auth/refresh", Some(&body), None)
            .await?;

        if !resp.status().is_success() {
            self.set_session(None).await?;
            return Ok(None);
        }

        let pair: TokenPair = resp.json().await.context("Failed to parse refresh response")?;
        session.access_token = pair.access_token.clone();
        session.refresh_token = pair.refresh_token;
        self.set_session(Some(session)).await?;
        Ok(Some(pair.access_token))
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    let err = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(envelope) => ApiError {
            status,
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => ApiError {
            status,
            code: "UNKNOWN".into(),
            message: text,
        },
    };
    Err(err.into())
}

async fn decode_envelope<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let url = resp.url().to_string();
    let resp = check_status(resp).await?;
    let envelope: ApiResponse<T> = resp
        .json()
        .await
        .with_context(|| format!("Failed to parse response from {}", url))?;
    Ok(envelope.data)
}
