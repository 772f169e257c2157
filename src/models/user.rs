//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user.
///
/// Email and username are unique across all users, compared
/// case-insensitively. The password field only ever holds a PHC hash string.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Stable identifier (also used as document ID)
    pub id: Uuid,
    /// Email address, lowercased at registration
    pub email: String,
    /// Display username (original casing preserved)
    pub username: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// When the user registered
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user in a credential store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

impl User {
    /// Materialize a new user with a fresh identifier.
    pub fn from_new(new_user: NewUser) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            created_at: Utc::now(),
        }
    }
}

/// Canonical form used for uniqueness checks and lookups.
pub fn normalize_identifier(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User::from_new(NewUser {
            email: "alice@example.com".to_string(),
            username: "Alice".to_string(),
            password_hash: "$argon2id$stub".to_string(),
        })
    }

    #[test]
    fn test_from_new_assigns_distinct_ids() {
        assert_ne!(alice().id, alice().id);
    }
}
