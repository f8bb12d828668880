//! User profiles with role-based address access.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::address::AddressEntry;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    #[default]
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub allowed_addresses: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins see every address; everyone else only their allowed list.
    pub fn can_access(&self, address_id: &str) -> bool {
        self.is_admin() || self.allowed_addresses.iter().any(|a| a == address_id)
    }

    pub fn visible(&self, addresses: Vec<AddressEntry>) -> Vec<AddressEntry> {
        addresses
            .into_iter()
            .filter(|a| self.can_access(&a.id))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRole {
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAllowedAddresses {
    pub allowed_addresses: Vec<String>,
}

/// Self-service profile edit. A blank name clears it.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(max = 100))]
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::address::AddressDoc;

    fn profile(role: UserRole, allowed: &[&str]) -> UserProfile {
        UserProfile {
            uid: "u1".to_string(),
            email: "u1@example.com".to_string(),
            display_name: None,
            role,
            allowed_addresses: allowed.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    fn entry(id: &str) -> AddressEntry {
        AddressEntry {
            id: id.to_string(),
            data: AddressDoc::default(),
        }
    }

    #[test]
    fn user_role_serialization() {
        assert_eq!(serde_json::to_string(&UserRole::Admin).unwrap(), "\"admin\"");
        let role: UserRole = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, UserRole::User);
    }

    #[test]
    fn admin_sees_everything() {
        let admin = profile(UserRole::Admin, &[]);
        assert!(admin.can_access("anything"));
        assert_eq!(admin.visible(vec![entry("a"), entry("b")]).len(), 2);
    }

    #[test]
    fn user_sees_only_allowed_addresses() {
        let user = profile(UserRole::User, &["b"]);
        assert!(!user.can_access("a"));
        let visible = user.visible(vec![entry("a"), entry("b"), entry("c")]);
        assert_eq!(visible, vec![entry("b")]);
    }
}
