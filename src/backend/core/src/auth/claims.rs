//! Access token claims.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by an access token.
///
/// `roles` and `permissions` are a snapshot taken at issuance. Role changes
/// made afterwards are not visible until the next login or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
    /// `resource:action` strings.
    pub permissions: Vec<String>,
    /// Issued at (Unix seconds)
    pub iat: i64,
    /// Expires at (Unix seconds)
    pub exp: i64,
}

impl AccessClaims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AccessClaims {
        AccessClaims {
            user_id: Uuid::new_v4(),
            username: "alice".into(),
            roles: vec!["user".into()],
            permissions: vec!["tasks:read".into()],
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        }
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        for field in ["user_id", "username", "roles", "permissions", "iat", "exp"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
        assert!(value["user_id"].is_string());
    }

    #[test]
    fn test_membership_checks() {
        let claims = sample();
        assert!(claims.has_role("user"));
        assert!(!claims.has_role("admin"));
        assert!(claims.has_permission("tasks:read"));
        assert!(!claims.has_permission("tasks:delete"));
        assert_eq!(claims.expires_at().timestamp(), 1_700_003_600);
    }
}
