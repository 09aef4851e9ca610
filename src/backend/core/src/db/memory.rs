//! In-memory [`Store`] backed by `parking_lot` locks and a `DashMap`.
//!
//! Refresh tokens live in a `DashMap` keyed by token value so that removal is
//! atomic per key: of two concurrent deletes for the same token exactly one
//! observes a removed entry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{
    NewTask, NewUser, RefreshTokenRecord, RoleRecord, Store, Task, TaskChanges, User,
};
use crate::error::{Result, TaskgateError};
use crate::rbac::Permission;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    roles: RwLock<HashMap<Uuid, RoleRecord>>,
    user_roles: RwLock<HashMap<Uuid, HashSet<Uuid>>>,
    refresh_tokens: DashMap<Uuid, RefreshTokenRecord>,
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding refresh tokens for `user_id`.
    pub fn refresh_token_count(&self, user_id: Uuid) -> usize {
        self.refresh_tokens
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write();
        // Uniqueness spans soft-deleted rows, matching the SQL constraint.
        if users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(TaskgateError::conflict("username or email already exists"));
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.username == username && !u.is_deleted())
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .get(&id)
            .filter(|u| !u.is_deleted())
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| !u.is_deleted())
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        Ok(users)
    }

    async fn soft_delete_user(&self, id: Uuid) -> Result<u64> {
        let mut users = self.users.write();
        match users.get_mut(&id) {
            Some(user) if !user.is_deleted() => {
                let now = Utc::now();
                user.deleted_at = Some(now);
                user.updated_at = now;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn upsert_role(
        &self,
        name: &str,
        description: &str,
        permissions: &[Permission],
    ) -> Result<RoleRecord> {
        let mut roles = self.roles.write();
        let mut permissions = permissions.to_vec();
        permissions.sort();
        permissions.dedup();

        if let Some(existing) = roles.values_mut().find(|r| r.name == name) {
            existing.description = description.to_string();
            existing.permissions = permissions;
            return Ok(existing.clone());
        }

        let role = RoleRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            permissions,
        };
        roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<RoleRecord>> {
        Ok(self.roles.read().values().find(|r| r.name == name).cloned())
    }

    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<RoleRecord>> {
        let role_ids = match self.user_roles.read().get(&user_id) {
            Some(ids) => ids.clone(),
            None => return Ok(Vec::new()),
        };
        let roles = self.roles.read();
        let mut assigned: Vec<RoleRecord> = role_ids
            .iter()
            .filter_map(|id| roles.get(id).cloned())
            .collect();
        assigned.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assigned)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        if !self.roles.read().contains_key(&role_id) {
            return Err(TaskgateError::not_found("role", role_id.to_string()));
        }
        Ok(self
            .user_roles
            .write()
            .entry(user_id)
            .or_default()
            .insert(role_id))
    }

    async fn revoke_role(&self, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        Ok(self
            .user_roles
            .write()
            .get_mut(&user_id)
            .map(|ids| ids.remove(&role_id))
            .unwrap_or(false))
    }

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<()> {
        self.refresh_tokens
            .insert(record.refresh_token, record.clone());
        Ok(())
    }

    async fn find_refresh_token(&self, token: Uuid) -> Result<Option<RefreshTokenRecord>> {
        Ok(self.refresh_tokens.get(&token).map(|r| r.clone()))
    }

    async fn delete_refresh_token(&self, token: Uuid) -> Result<u64> {
        Ok(u64::from(self.refresh_tokens.remove(&token).is_some()))
    }

    async fn delete_refresh_tokens_for_user(&self, user_id: Uuid) -> Result<u64> {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|_, r| r.user_id != user_id);
        Ok(before.saturating_sub(self.refresh_tokens.len()) as u64)
    }

    async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64> {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|_, r| r.expires_at >= now);
        Ok(before.saturating_sub(self.refresh_tokens.len()) as u64)
    }

    async fn insert_task(&self, task: NewTask) -> Result<Task> {
        let now = Utc::now();
        let record = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            user_id: task.user_id,
            created_at: now,
            updated_at: now,
        };
        self.tasks.write().insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_task(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.read().get(&id).cloned())
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().values().cloned().collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn list_tasks_for_user(&self, user_id: Uuid) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, changes: TaskChanges) -> Result<Option<Task>> {
        let mut tasks = self.tasks.write();
        let Some(task) = tasks.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = changes.title {
            task.title = title;
        }
        if let Some(description) = changes.description {
            task.description = description;
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(user_id) = changes.user_id {
            task.user_id = user_id;
        }
        task.updated_at = Utc::now();

        Ok(Some(task.clone()))
    }

    async fn delete_task(&self, id: Uuid) -> Result<u64> {
        Ok(u64::from(self.tasks.write().remove(&id).is_some()))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::rbac::Action;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
        }
    }

    fn refresh_record(user_id: Uuid, expires_at: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            refresh_token: Uuid::new_v4(),
            expires_at,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.insert_user(new_user("alice")).await.unwrap();

        let err = store.insert_user(new_user("alice")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[tokio::test]
    async fn test_soft_deleted_user_is_absent() {
        let store = MemoryStore::new();
        let user = store.insert_user(new_user("bob")).await.unwrap();

        assert_eq!(store.soft_delete_user(user.id).await.unwrap(), 1);
        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(store.find_user_by_username("bob").await.unwrap().is_none());
        assert_eq!(store.soft_delete_user(user.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_token_delete_counts_rows() {
        let store = MemoryStore::new();
        let record = refresh_record(Uuid::new_v4(), Utc::now() + chrono::Duration::hours(1));
        store.insert_refresh_token(&record).await.unwrap();

        assert_eq!(store.delete_refresh_token(record.refresh_token).await.unwrap(), 1);
        assert_eq!(store.delete_refresh_token(record.refresh_token).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired_refresh_tokens() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        store
            .insert_refresh_token(&refresh_record(user_id, now - chrono::Duration::minutes(5)))
            .await
            .unwrap();
        store
            .insert_refresh_token(&refresh_record(user_id, now + chrono::Duration::minutes(5)))
            .await
            .unwrap();

        assert_eq!(store.delete_expired_refresh_tokens(now).await.unwrap(), 1);
        assert_eq!(store.refresh_token_count(user_id), 1);
    }

    #[tokio::test]
    async fn test_upsert_role_replaces_permissions() {
        let store = MemoryStore::new();
        let first = store
            .upsert_role("user", "v1", &[Permission::new("tasks", Action::Read)])
            .await
            .unwrap();
        let second = store
            .upsert_role(
                "user",
                "v2",
                &[
                    Permission::new("tasks", Action::Update),
                    Permission::new("tasks", Action::Read),
                    Permission::new("tasks", Action::Read),
                ],
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.description, "v2");
        assert_eq!(second.permissions.len(), 2);
    }

    #[tokio::test]
    async fn test_assign_and_revoke_role() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let role = store.upsert_role("admin", "", &[]).await.unwrap();

        assert!(store.assign_role(user_id, role.id).await.unwrap());
        assert!(!store.assign_role(user_id, role.id).await.unwrap());
        assert_eq!(store.roles_for_user(user_id).await.unwrap().len(), 1);

        assert!(store.revoke_role(user_id, role.id).await.unwrap());
        assert!(store.roles_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assign_unknown_role_fails() {
        let store = MemoryStore::new();
        let err = store.assign_role(Uuid::new_v4(), Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
