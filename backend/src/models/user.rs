//! User model and authenticated principals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role granted by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Member,
    Expert,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Expert => "EXPERT",
            Role::Admin => "ADMIN",
        }
    }

    /// Experts and admins may adjudicate and publish.
    pub fn is_reviewer(&self) -> bool {
        matches!(self, Role::Expert | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MEMBER" => Ok(Role::Member),
            "EXPERT" => Ok(Role::Expert),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// User entity. `identity` is the public wallet address shown in published
/// metadata and proofs.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub identity: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_reviewer(&self) -> bool {
        self.role.is_reviewer()
    }
}

/// Reserved actor used for batch-driven audit events.
///
/// Resolved once at start-up and passed by value to whatever needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemPrincipal(Uuid);

impl SystemPrincipal {
    pub fn new(user_id: Uuid) -> Self {
        Self(user_id)
    }

    pub fn user_id(&self) -> Uuid {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_is_case_insensitive() {
        assert_eq!("expert".parse::<Role>().unwrap(), Role::Expert);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
        assert!("moderator".parse::<Role>().is_err());
    }

    #[test]
    fn test_reviewer_roles() {
        assert!(!Role::Member.is_reviewer());
        assert!(Role::Expert.is_reviewer());
        assert!(Role::Admin.is_reviewer());
    }

    #[test]
    fn test_role_serializes_uppercase() {
        let json = serde_json::to_string(&Role::Expert).unwrap();
        assert_eq!(json, "\"EXPERT\"");
    }
}
