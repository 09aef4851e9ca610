//! RBAC data models: actions and `resource:action` permissions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TaskgateError};

// ═══════════════════════════════════════════════════════════════════════════════
// Action
// ═══════════════════════════════════════════════════════════════════════════════

/// Verb half of a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Assign,
    Revoke,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Assign => "assign",
            Self::Revoke => "revoke",
        }
    }

    pub fn all() -> [Action; 6] {
        [
            Self::Create,
            Self::Read,
            Self::Update,
            Self::Delete,
            Self::Assign,
            Self::Revoke,
        ]
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action: {}", s))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// An action on a resource type.
///
/// On the wire and inside access tokens a permission is the string
/// `resource:action`, for example:
/// - `tasks:create`
/// - `users:delete`
/// - `roles:assign`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Permission {
    /// The resource type (e.g., "tasks", "users", "roles").
    pub resource: String,
    pub action: Action,
}

impl Permission {
    pub fn new(resource: impl Into<String>, action: Action) -> Self {
        Self {
            resource: resource.into(),
            action,
        }
    }

    /// Parse `"resource:action"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (resource, action) = s
            .split_once(':')
            .ok_or_else(|| TaskgateError::validation(format!("invalid permission: {}", s)))?;
        if resource.is_empty() {
            return Err(TaskgateError::validation(format!("invalid permission: {}", s)));
        }
        let action = action.parse::<Action>().map_err(TaskgateError::validation)?;
        Ok(Self::new(resource, action))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource, self.action)
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Permission::parse(&raw).map_err(|e| serde::de::Error::custom(e.user_message().to_string()))
    }
}
