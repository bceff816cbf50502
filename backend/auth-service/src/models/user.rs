//! User model
use chrono::{DateTime, Utc};
use crypto_core::AccessClaims;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Row of the `users` table. `password` holds the Argon2 PHC string.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public fields embedded in access tokens.
    pub fn access_snapshot(&self) -> AccessClaims {
        AccessClaims {
            email: self.email.clone(),
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.clone(),
            username: self.username.clone(),
            created_at: self.created_at,
        }
    }
}

// Keep the hash out of logs.
impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// User as returned to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 42,
            email: "ada@example.com".to_string(),
            username: "ada".to_string(),
            password: "$argon2id$v=19$m=65536,t=2,p=4$c2FsdA$aGFzaA".to_string(),
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        }
    }

    #[test]
    fn test_debug_redacts_password_hash() {
        let rendered = format!("{:?}", user());
        assert!(rendered.contains("ada@example.com"));
        assert!(!rendered.contains("argon2id"));
    }

    #[test]
    fn test_login_request_debug_omits_password() {
        let request: LoginRequest =
            serde_json::from_str(r#"{"email":"ada@example.com","password":"hunter22"}"#).unwrap();
        assert!(!format!("{request:?}").contains("hunter22"));
    }

    #[test]
    fn test_access_snapshot_copies_public_fields() {
        let user = user();
        let snapshot = user.access_snapshot();
        assert_eq!(snapshot.email, user.email);
        assert_eq!(snapshot.username, user.username);
        assert_eq!(snapshot.created_at, user.created_at);
    }
}
