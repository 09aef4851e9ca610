//! Predefined roles with default permission sets.
//!
//! Taskgate ships with two built-in roles:
//!
//! | Role  | Description                                                 |
//! |-------|-------------------------------------------------------------|
//! | admin | Full task, user and role management                         |
//! | user  | Create, read, update and delete tasks (ownership enforced)  |

use super::models::{Action, Permission};

/// Name of the role that bypasses ownership checks.
pub const ADMIN_ROLE: &str = "admin";

/// Role assigned to every newly registered account.
pub const DEFAULT_ROLE: &str = "user";

/// Predefined role templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedRole {
    Admin,
    User,
}

impl PredefinedRole {
    /// Role name as stored and as carried in access token claims.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Admin => ADMIN_ROLE,
            Self::User => DEFAULT_ROLE,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full access to tasks, users and role assignments",
            Self::User => "Manage own tasks",
        }
    }

    pub fn permissions(&self) -> Vec<Permission> {
        let crud = [Action::Create, Action::Read, Action::Update, Action::Delete];
        let tasks = crud.iter().map(|a| Permission::new("tasks", *a));

        match self {
            Self::Admin => tasks
                .chain(crud.iter().map(|a| Permission::new("users", *a)))
                .chain(
                    [Action::Read, Action::Assign, Action::Revoke]
                        .iter()
                        .map(|a| Permission::new("roles", *a)),
                )
                .collect(),
            // Ownership of individual tasks is enforced separately.
            Self::User => tasks.collect(),
        }
    }

    pub fn all() -> Vec<PredefinedRole> {
        vec![Self::Admin, Self::User]
    }
}
