//! Persistence capabilities for the authentication service

pub mod user;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AuthResult;
use crate::models::{NewUser, UpdateUser, User};

pub use user::PgUserRepository;

/// Default number of users per page when the caller asks for less than one
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Clamp pagination arguments to a valid first page and page size.
pub fn normalize_page(page: i64, page_size: i64) -> (i64, i64) {
    let page = page.max(1);
    let page_size = if page_size < 1 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };
    (page, page_size)
}

/// Number of rows preceding `page`, or `None` when it does not fit in an `i64`.
pub fn page_offset(page: i64, page_size: i64) -> Option<i64> {
    page.checked_sub(1)?.checked_mul(page_size)
}

/// Durable user storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, new_user: &NewUser) -> AuthResult<User>;

    /// Find a user by ID
    async fn get_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    /// Find a user by phone number
    async fn get_by_phone(&self, phone: &str) -> AuthResult<Option<User>>;

    /// List users, newest first, returning the page and the total count
    async fn list(&self, page: i64, page_size: i64) -> AuthResult<(Vec<User>, i64)>;

    /// Apply changes to a user, returning the updated record if it exists
    async fn update(&self, id: Uuid, changes: &UpdateUser) -> AuthResult<Option<User>>;

    /// Delete a user. Returns `true` when a record was removed.
    async fn delete(&self, id: Uuid) -> AuthResult<bool>;

    /// Fetch the user owning `phone`, creating it first if there is none
    async fn get_or_create_by_phone(&self, phone: &str) -> AuthResult<User> {
        if let Some(user) = self.get_by_phone(phone).await? {
            return Ok(user);
        }
        self.create(&NewUser {
            phone: phone.to_string(),
        })
        .await
    }
}
