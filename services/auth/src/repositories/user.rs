//! User repository for database operations

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{UserRepository, normalize_page, page_offset};
use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, UpdateUser, User};

fn require_phone(phone: &str) -> AuthResult<()> {
    if phone.trim().is_empty() {
        return Err(AuthError::Validation("phone cannot be empty".to_string()));
    }
    Ok(())
}

/// PostgreSQL-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, new_user: &NewUser) -> AuthResult<User> {
        require_phone(&new_user.phone)?;
        info!("Creating new user: {}", new_user.phone);

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, phone)
            VALUES ($1, $2)
            RETURNING id, phone, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.phone.trim())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_by_phone(&self, phone: &str) -> AuthResult<Option<User>> {
        require_phone(phone)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone, created_at, updated_at
            FROM users
            WHERE phone = $1
            "#,
        )
        .bind(phone.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list(&self, page: i64, page_size: i64) -> AuthResult<(Vec<User>, i64)> {
        let (page, page_size) = normalize_page(page, page_size);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let Some(offset) = page_offset(page, page_size) else {
            return Ok((Vec::new(), total));
        };

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, phone, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page_size)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total))
    }

    async fn update(&self, id: Uuid, changes: &UpdateUser) -> AuthResult<Option<User>> {
        if let Some(phone) = &changes.phone {
            require_phone(phone)?;
        }
        info!("Updating user: {}", id);

        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET phone = COALESCE($2, phone), updated_at = NOW()
            WHERE id = $1
            RETURNING id, phone, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(changes.phone.as_deref().map(str::trim))
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete(&self, id: Uuid) -> AuthResult<bool> {
        info!("Deleting user: {}", id);

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Single-statement upsert so that concurrent first logins for the same
    /// phone resolve to one record.
    async fn get_or_create_by_phone(&self, phone: &str) -> AuthResult<User> {
        require_phone(phone)?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, phone)
            VALUES ($1, $2)
            ON CONFLICT (phone) DO UPDATE SET phone = EXCLUDED.phone
            RETURNING id, phone, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(phone.trim())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}
