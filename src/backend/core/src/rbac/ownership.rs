//! Handler-level ownership checks.
//!
//! Used where the owner cannot be read from the URL, e.g. a task addressed by
//! its own id: the handler loads the record first, then calls in here before
//! touching it.

use uuid::Uuid;

use crate::db::Task;
use crate::error::{Result, TaskgateError};
use crate::middleware::auth::Principal;

pub const OWNERSHIP_DENIED_MESSAGE: &str = "access denied - resource ownership required";

/// A record with an owning user.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

impl Owned for Task {
    fn owner_id(&self) -> Uuid {
        self.user_id
    }
}

/// Admins pass; everyone else must own the record.
pub fn ensure_owner_or_admin(principal: &Principal, owner_id: Uuid) -> Result<()> {
    if principal.is_admin() || principal.user_id == owner_id {
        Ok(())
    } else {
        Err(TaskgateError::forbidden(OWNERSHIP_DENIED_MESSAGE))
    }
}

/// Resolve a loaded record for `principal`.
///
/// A missing record is `NotFound` before ownership is considered.
pub fn authorize_resource<T: Owned>(
    principal: &Principal,
    resource: Option<T>,
    entity_type: &str,
    entity_id: Uuid,
) -> Result<T> {
    let resource =
        resource.ok_or_else(|| TaskgateError::not_found(entity_type, entity_id.to_string()))?;
    ensure_owner_or_admin(principal, resource.owner_id())?;
    Ok(resource)
}

/// Owner to stamp on a new record. Non-admins always own what they create;
/// an admin may create on behalf of another user.
pub fn owner_for_create(principal: &Principal, requested: Option<Uuid>) -> Uuid {
    match requested {
        Some(owner) if principal.is_admin() => owner,
        _ => principal.user_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{TaskPriority, TaskStatus};
    use crate::error::ErrorCode;
    use chrono::Utc;

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            user_id: Uuid::new_v4(),
            username: "tester".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: vec![],
        }
    }

    fn task_owned_by(user_id: Uuid) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "write report".into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: None,
            user_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_allowed() {
        let caller = principal(&["user"]);
        let task = task_owned_by(caller.user_id);
        assert!(authorize_resource(&caller, Some(task), "task", Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_non_owner_forbidden() {
        let caller = principal(&["user"]);
        let task = task_owned_by(Uuid::new_v4());
        let err = authorize_resource(&caller, Some(task), "task", Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
        assert_eq!(err.user_message(), OWNERSHIP_DENIED_MESSAGE);
    }

    #[test]
    fn test_admin_bypass() {
        let admin = principal(&["admin"]);
        let task = task_owned_by(Uuid::new_v4());
        assert!(authorize_resource(&admin, Some(task), "task", Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_not_found_reported_first() {
        let caller = principal(&["user"]);
        let err = authorize_resource::<Task>(&caller, None, "task", Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_owner_for_create() {
        let user = principal(&["user"]);
        let admin = principal(&["admin"]);
        let other = Uuid::new_v4();

        assert_eq!(owner_for_create(&user, Some(other)), user.user_id);
        assert_eq!(owner_for_create(&user, None), user.user_id);
        assert_eq!(owner_for_create(&admin, Some(other)), other);
        assert_eq!(owner_for_create(&admin, None), admin.user_id);
    }
}
