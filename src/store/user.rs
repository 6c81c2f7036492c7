//! Account records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    /// Unique, compared case-insensitively.
    pub username: String,
    /// Argon2id PHC string.
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// Data for creating an account. `password` must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password_hash.into(),
        }
    }

    pub(crate) fn into_user(self, id: i64, created_at: DateTime<Utc>) -> User {
        User {
            id,
            username: self.username,
            password: self.password,
            created_at,
        }
    }
}

/// Username clash message shared by every backend.
pub(crate) fn username_taken(username: &str) -> crate::CloudboxError {
    crate::CloudboxError::Conflict(format!("username '{username}' already exists"))
}
