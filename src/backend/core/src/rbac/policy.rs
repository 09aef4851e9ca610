//! Policy store: role and permission resolution backed by the [`Store`].
//!
//! The policy store answers "which roles and permissions does user X hold
//! right now?". Answers are snapshotted into access tokens at issuance, so a
//! change made here only reaches a caller on their next login or refresh.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::Permission;
use super::roles::{PredefinedRole, DEFAULT_ROLE};
use crate::db::{RoleRecord, Store};
use crate::error::{Result, TaskgateError};

/// Roles and flattened permissions held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedGrants {
    /// Role names, sorted.
    pub roles: Vec<String>,
    /// Union of permissions across roles as `resource:action`, sorted and
    /// de-duplicated.
    pub permissions: Vec<String>,
}

impl ResolvedGrants {
    fn from_roles(roles: &[RoleRecord]) -> Self {
        let names: BTreeSet<String> = roles.iter().map(|r| r.name.clone()).collect();
        let permissions: BTreeSet<String> = roles
            .iter()
            .flat_map(|r| r.permissions.iter().map(Permission::to_string))
            .collect();

        Self {
            roles: names.into_iter().collect(),
            permissions: permissions.into_iter().collect(),
        }
    }
}

#[derive(Clone)]
pub struct PolicyStore {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

impl PolicyStore {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Resolve a user's current roles and permissions.
    ///
    /// A user with no roles resolves to empty sets; that is not an error.
    pub async fn resolve(&self, user_id: Uuid) -> Result<ResolvedGrants> {
        let roles = self.store.roles_for_user(user_id).await?;
        let grants = ResolvedGrants::from_roles(&roles);
        debug!(
            user_id = %user_id,
            roles = ?grants.roles,
            permission_count = grants.permissions.len(),
            "Resolved grants"
        );
        Ok(grants)
    }

    /// Create or refresh the predefined roles. Idempotent.
    pub async fn seed_defaults(&self) -> Result<()> {
        for role in PredefinedRole::all() {
            self.store
                .upsert_role(role.name(), role.description(), &role.permissions())
                .await?;
        }
        info!(roles = PredefinedRole::all().len(), "Seeded predefined roles");
        Ok(())
    }

    /// Give a freshly registered user the default role.
    pub async fn assign_default_role(&self, user_id: Uuid) -> Result<()> {
        self.assign_role(user_id, DEFAULT_ROLE).await.map(|_| ())
    }

    /// Grant `role_name` to `user_id`. Returns `false` if already held.
    pub async fn assign_role(&self, user_id: Uuid, role_name: &str) -> Result<bool> {
        let role = self.existing_role(role_name).await?;
        self.ensure_user(user_id).await?;

        let granted = self.store.assign_role(user_id, role.id).await?;
        info!(user_id = %user_id, role = %role_name, granted, "Role assigned");
        Ok(granted)
    }

    /// Remove `role_name` from `user_id`. Returns `false` if not held.
    pub async fn revoke_role(&self, user_id: Uuid, role_name: &str) -> Result<bool> {
        let role = self.existing_role(role_name).await?;
        self.ensure_user(user_id).await?;

        let revoked = self.store.revoke_role(user_id, role.id).await?;
        info!(user_id = %user_id, role = %role_name, revoked, "Role revoked");
        Ok(revoked)
    }

    async fn existing_role(&self, role_name: &str) -> Result<RoleRecord> {
        self.store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| TaskgateError::not_found("role", role_name))
    }

    async fn ensure_user(&self, user_id: Uuid) -> Result<()> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| TaskgateError::not_found("user", user_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, NewUser};
    use crate::error::ErrorCode;

    async fn setup() -> (PolicyStore, Arc<MemoryStore>, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let policy = PolicyStore::new(store.clone());
        policy.seed_defaults().await.unwrap();
        let user = store
            .insert_user(NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: "hash".into(),
            })
            .await
            .unwrap();
        (policy, store, user.id)
    }

    #[tokio::test]
    async fn test_user_without_roles_resolves_empty() {
        let (policy, _, user_id) = setup().await;
        let grants = policy.resolve(user_id).await.unwrap();
        assert!(grants.roles.is_empty());
        assert!(grants.permissions.is_empty());
    }

    #[tokio::test]
    async fn test_default_role_grants_task_permissions() {
        let (policy, _, user_id) = setup().await;
        policy.assign_default_role(user_id).await.unwrap();

        let grants = policy.resolve(user_id).await.unwrap();
        assert_eq!(grants.roles, vec!["user"]);
        assert_eq!(
            grants.permissions,
            vec!["tasks:create", "tasks:delete", "tasks:read", "tasks:update"]
        );
    }

    #[tokio::test]
    async fn test_union_is_deduplicated() {
        let (policy, _, user_id) = setup().await;
        policy.assign_role(user_id, "user").await.unwrap();
        policy.assign_role(user_id, "admin").await.unwrap();

        let grants = policy.resolve(user_id).await.unwrap();
        assert_eq!(grants.roles, vec!["admin", "user"]);
        assert_eq!(grants.permissions.len(), 11);
        assert_eq!(
            grants.permissions.iter().filter(|p| *p == "tasks:read").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (policy, store, _) = setup().await;
        policy.seed_defaults().await.unwrap();
        let admin = store.find_role_by_name("admin").await.unwrap().unwrap();
        assert_eq!(admin.permissions.len(), 11);
    }

    #[tokio::test]
    async fn test_assign_unknown_role_is_not_found() {
        let (policy, _, user_id) = setup().await;
        let err = policy.assign_role(user_id, "superuser").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_revoke_role() {
        let (policy, _, user_id) = setup().await;
        policy.assign_role(user_id, "admin").await.unwrap();
        assert!(policy.revoke_role(user_id, "admin").await.unwrap());
        assert!(!policy.revoke_role(user_id, "admin").await.unwrap());
        assert!(policy.resolve(user_id).await.unwrap().roles.is_empty());
    }
}
