use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

pub use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    Duplicate,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Duplicate;
            }
        }
        StoreError::Database(err)
    }
}

/// Data access for users, keyed by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// Find a user by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    /// Insert a user; the unique index on `email` rejects duplicates.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, created_at, updated_at
            "#,
        )
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.db)
        .await?;
        debug!(user_id = %user.id, "user row inserted");
        Ok(user)
    }
}

#[cfg(test)]
pub use memory::MemoryUserStore;


#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: "$argon2id$placeholder".into(),
        }
    }

    #[tokio::test]
    async fn memory_store_create_then_find() {
        let store = MemoryUserStore::new();
        let created = store.create(new_user("a@x.com")).await.expect("create");
        let found = store
            .find_by_email("a@x.com")
            .await
            .expect("find")
            .expect("user present");
        assert_eq!(found.id, created.id);
        assert_eq!(found.created_at, found.updated_at);
    }

    #[tokio::test]
    async fn memory_store_rejects_duplicate_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.expect("first create");
        let err = store.create(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn memory_store_remove_forgets_user() {
        let store = MemoryUserStore::new();
        store.create(new_user("a@x.com")).await.expect("create");
        assert!(store.remove("a@x.com").await.is_some());
        assert!(store.find_by_email("a@x.com").await.expect("find").is_none());
    }

    #[test]
    fn non_database_sqlx_errors_are_not_duplicates() {
        let err: StoreError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, StoreError::Database(_)));
    }

    // Runs against a real database: `DATABASE_URL=... cargo test -- --ignored`.
    #[tokio::test]
    #[ignore = "needs DATABASE_URL pointing at a disposable PostgreSQL database"]
    async fn postgres_unique_violation_maps_to_duplicate() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL set");
        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .expect("connect");
        sqlx::migrate!("./migrations").run(&db).await.expect("migrate");

        let store = PgUserStore::new(db);
        let email = format!("dup-{}@x.com", uuid::Uuid::new_v4());
        store.create(new_user(&email)).await.expect("first insert");

        let err = store.create(new_user(&email)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }
}
