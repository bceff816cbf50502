use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::User;

/// Read access to stored principals.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>>;
}

/// Postgres-backed repository over the `users` table
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, username, password, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Repository kept in process memory, for tests and local runs.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<i64, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user keyed by id.
    pub fn insert(&self, user: User) {
        self.users.write().insert(user.id, user);
    }

    pub fn remove(&self, user_id: i64) -> Option<User> {
        self.users.write().remove(&user_id)
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, user_id: i64) -> Result<Option<User>> {
        Ok(self.users.read().get(&user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i64, email: &str) -> User {
        User {
            id,
            email: email.to_string(),
            username: format!("user{id}"),
            password: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_lookup_by_email_and_id() {
        let repo = InMemoryUserRepository::new();
        repo.insert(user(1, "one@example.com"));
        repo.insert(user(2, "two@example.com"));

        let found = repo.find_by_email("two@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, 2);
        assert!(repo.find_by_email("three@example.com").await.unwrap().is_none());
        assert_eq!(repo.find_by_id(1).await.unwrap().unwrap().email, "one@example.com");
    }

    #[tokio::test]
    async fn test_removed_user_is_not_found() {
        let repo = InMemoryUserRepository::new();
        repo.insert(user(1, "one@example.com"));
        assert!(repo.remove(1).is_some());
        assert!(repo.find_by_id(1).await.unwrap().is_none());
    }
}
