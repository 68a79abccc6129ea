use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::{Row, error::SqlState};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::user::{NewUser, User},
};

/// Backend holding user records.
///
/// Implementations must reject a second user with the same email with
/// [`AppError::UserAlreadyExists`], independently of any lookup the caller
/// did first.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user and returns the stored record.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Finds a user by exact email match.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Finds a user by ID.
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Releases backend resources. Called once on shutdown.
    async fn close(&self) {}
}

/// A helper function to map a `tokio_postgres::Row` to a `User`.
fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let client = self.pool.get().await?;
        let id = Uuid::new_v4();
        let row = client
            .query_one(
                r#"
                INSERT INTO users (id, email, password, name, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                RETURNING id, email, password, name, created_at, updated_at
                "#,
                &[&id, &user.email, &user.password_hash, &user.name, &user.created_at],
            )
            .await
            .map_err(|e| {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    AppError::UserAlreadyExists
                } else {
                    AppError::Database(e)
                }
            })?;
        row_to_user(&row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, email, password, name, created_at, updated_at
                FROM users
                WHERE email = $1
                "#,
                &[&email],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                r#"
                SELECT id, email, password, name, created_at, updated_at
                FROM users
                WHERE id = $1
                "#,
                &[id],
            )
            .await?;
        row.map(|r| row_to_user(&r)).transpose()
    }

    async fn close(&self) {
        self.pool.close();
        tracing::info!("🔌 PostgreSQL pool closed");
    }
}

/// In-process user store. Contents are lost on restart.
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert_user(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write().await;

        if users.values().any(|u| u.email == user.email) {
            return Err(AppError::UserAlreadyExists);
        }

        let stored = User {
            id: Uuid::new_v4(),
            email: user.email,
            password: user.password_hash,
            name: user.name,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(id).cloned())
    }
}
