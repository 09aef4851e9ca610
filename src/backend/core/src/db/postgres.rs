//! PostgreSQL [`Store`] using sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{
    NewTask, NewUser, RefreshTokenRecord, RoleRecord, Store, Task, TaskChanges, TaskPriority,
    TaskStatus, User,
};
use crate::error::{ErrorCode, Result, TaskgateError};
use crate::rbac::{Action, Permission};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, created_at, updated_at, deleted_at";

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, due_date, user_id, created_at, updated_at";

/// Database connection and operations.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool.
    pub async fn connect(database_url: &str, max_connections: u32, min_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn role_by(&self, column: &str, value: RoleKey<'_>) -> Result<Option<RoleRecord>> {
        let sql = format!(
            r#"
            SELECT r.id, r.name, r.description, p.resource, p.action
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE r.{} = $1
            "#,
            column
        );
        let query = sqlx::query(&sql);
        let query = match value {
            RoleKey::Id(id) => query.bind(id),
            RoleKey::Name(name) => query.bind(name),
        };
        let rows = query.fetch_all(&self.pool).await?;
        Ok(fold_role_rows(rows)?.into_iter().next())
    }
}

enum RoleKey<'a> {
    Id(Uuid),
    Name(&'a str),
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: String,
    status: String,
    priority: String,
    due_date: Option<DateTime<Utc>>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = TaskgateError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let status: TaskStatus = row.status.parse().map_err(TaskgateError::internal)?;
        let priority: TaskPriority = row.priority.parse().map_err(TaskgateError::internal)?;
        Ok(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            status,
            priority,
            due_date: row.due_date,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn tasks_from_rows(rows: Vec<TaskRow>) -> Result<Vec<Task>> {
    rows.into_iter().map(Task::try_from).collect()
}

/// Collapse `role x permission` join rows into one record per role.
fn fold_role_rows(rows: Vec<sqlx::postgres::PgRow>) -> Result<Vec<RoleRecord>> {
    let mut roles: BTreeMap<String, RoleRecord> = BTreeMap::new();
    for row in rows {
        let name: String = row.try_get("name")?;
        let id: Uuid = row.try_get("id")?;
        let description: String = row.try_get("description")?;
        let entry = roles.entry(name.clone()).or_insert_with(|| RoleRecord {
            id,
            name,
            description,
            permissions: Vec::new(),
        });

        let resource: Option<String> = row.try_get("resource")?;
        let action: Option<String> = row.try_get("action")?;
        if let (Some(resource), Some(action)) = (resource, action) {
            let action: Action = action.parse().map_err(TaskgateError::internal)?;
            entry.permissions.push(Permission::new(resource, action));
        }
    }

    Ok(roles
        .into_values()
        .map(|mut role| {
            role.permissions.sort();
            role
        })
        .collect())
}

fn user_conflict(error: sqlx::Error) -> TaskgateError {
    let error = TaskgateError::from(error);
    if error.code() == ErrorCode::Conflict {
        TaskgateError::conflict("username or email already exists")
    } else {
        error
    }
}

#[async_trait]
impl Store for PgStore {
    // ═══════════════════════════════════════════════════════════════════════════
    // Users
    // ═══════════════════════════════════════════════════════════════════════════

    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(user_conflict)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE username = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE id = $1 AND deleted_at IS NULL",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE deleted_at IS NULL ORDER BY created_at, username",
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Roles
    // ═══════════════════════════════════════════════════════════════════════════

    async fn upsert_role(
        &self,
        name: &str,
        description: &str,
        permissions: &[Permission],
    ) -> Result<RoleRecord> {
        let mut tx = self.pool.begin().await?;

        let role_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO roles (id, name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET description = EXCLUDED.description
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        for permission in permissions {
            let permission_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO permissions (id, resource, action)
                VALUES ($1, $2, $3)
                ON CONFLICT (resource, action) DO UPDATE SET resource = EXCLUDED.resource
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&permission.resource)
            .bind(permission.action.as_str())
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(permission_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.role_by("id", RoleKey::Id(role_id))
            .await?
            .ok_or_else(|| TaskgateError::not_found("role", name))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>> {
        self.role_by("name", RoleKey::Name(name)).await
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<RoleRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.description, p.resource, p.action
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        fold_role_rows(rows)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Refresh Tokens
    // ═══════════════════════════════════════════════════════════════════════════

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, refresh_token, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.refresh_token)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_refresh_token(&self, token: Uuid) -> Result<Option<RefreshTokenRecord>> {
        Ok(sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT id, user_id, refresh_token, expires_at, created_at
            FROM refresh_tokens
            WHERE refresh_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_refresh_token(&self, token: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE refresh_token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Tasks
    // ═══════════════════════════════════════════════════════════════════════════

    async fn insert_task(&self, task: NewTask) -> Result<Task> {
        let sql = format!(
            r#"
            INSERT INTO tasks (id, title, description, status, priority, due_date, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status.as_str())
            .bind(task.priority.as_str())
            .bind(task.due_date)
            .bind(task.user_id)
            .fetch_one(&self.pool)
            .await?;

        Task::try_from(row)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let sql = format!("SELECT {} FROM tasks ORDER BY created_at", TASK_COLUMNS);
        tasks_from_rows(sqlx::query_as::<_, TaskRow>(&sql).fetch_all(&self.pool).await?)
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE user_id = $1 ORDER BY created_at",
            TASK_COLUMNS
        );
        tasks_from_rows(
            sqlx::query_as::<_, TaskRow>(&sql)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Option<Task>> {
        let sql = format!(
            r#"
            UPDATE tasks
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                status = COALESCE($4, status),
                priority = COALESCE($5, priority),
                due_date = COALESCE($6, due_date),
                user_id = COALESCE($7, user_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TASK_COLUMNS
        );
        sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id)
            .bind(changes.title)
            .bind(changes.description)
            .bind(changes.status.map(|s| s.as_str()))
            .bind(changes.priority.map(|p| p.as_str()))
            .bind(changes.due_date)
            .bind(changes.user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Task::try_from)
            .transpose()
    }

    async fn delete_task(&self, id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Health
    // ═══════════════════════════════════════════════════════════════════════════

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
