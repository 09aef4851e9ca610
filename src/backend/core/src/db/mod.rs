//! Persistence layer for Taskgate.
//!
//! The [`Store`] trait is the only way the auth, policy and task code reaches
//! persistent state. Two implementations ship:
//!
//! - [`PgStore`]: PostgreSQL via sqlx, schema managed by `migrations/`
//! - [`MemoryStore`]: process-local maps for tests and single-node demos
//!
//! Refresh token deletion reports the number of rows removed; callers rely on
//! a zero count to detect that a concurrent redemption already consumed the
//! token.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Result;
use crate::rbac::Permission;

pub use memory::MemoryStore;
pub use postgres::PgStore;

// ═══════════════════════════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════════════════════════

/// A registered account. Soft-deleted users are never returned by lookups.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Roles
// ═══════════════════════════════════════════════════════════════════════════════

/// A named bucket of permissions as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub permissions: Vec<Permission>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Refresh Tokens
// ═══════════════════════════════════════════════════════════════════════════════

/// One outstanding refresh token. Consumed (deleted) on redemption.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub refresh_token: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tasks
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown task priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// Owning user; only an admin may change it after creation.
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: Uuid,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub user_id: Option<Uuid>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Store Contract
// ═══════════════════════════════════════════════════════════════════════════════

/// Keyed access to users, roles, refresh tokens and tasks.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a user. Duplicate username or email fails with `Conflict`.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn list_users(&self) -> Result<Vec<User>>;

    /// Mark a user deleted. Returns the number of rows affected.
    async fn soft_delete_user(&self, id: Uuid) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Roles
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the role or replace its description and permission set.
    async fn upsert_role(
        &self,
        name: &str,
        description: &str,
        permissions: &[Permission],
    ) -> Result<RoleRecord>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>>;

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<RoleRecord>>;

    /// Returns `false` when the user already held the role.
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool>;

    /// Returns `false` when the user did not hold the role.
    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Refresh Tokens
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()>;

    async fn find_refresh_token(&self, token: Uuid) -> Result<Option<RefreshTokenRecord>>;

    /// Delete by token value. Zero means another caller already consumed it.
    async fn delete_refresh_token(&self, token: Uuid) -> Result<u64>;

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64>;

    /// Remove every token with `expires_at < now`.
    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Tasks
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_task(&self, task: NewTask) -> Result<Task>;

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>>;

    async fn list_tasks(&self) -> Result<Vec<Task>>;

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>>;

    /// Apply `changes`; `None` when the task does not exist.
    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Option<Task>>;

    async fn delete_task(&self, id: Uuid) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Health
    // ─────────────────────────────────────────────────────────────────────────

    /// Cheap connectivity check for the health endpoint.
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_round_trip() {
        for status in [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Completed] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_task_priority_serde() {
        let json = serde_json::to_string(&TaskPriority::High).unwrap();
        assert_eq!(json, "\"high\"");
        assert_eq!(TaskPriority::default(), TaskPriority::Medium);
    }

    #[test]
    fn test_refresh_record_expiry_is_strict() {
        let now = Utc::now();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            refresh_token: Uuid::new_v4(),
            expires_at: now,
            created_at: now,
        };
        assert!(!record.is_expired_at(now));
        assert!(record.is_expired_at(now + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_user_serialization_omits_hash() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password_hash: "$argon2id$secret".into(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password_hash"));
    }
}
