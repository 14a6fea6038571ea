//! In-memory user repository used by tests

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{UserRepository, normalize_page, page_offset};
use crate::error::{AuthError, AuthResult};
use crate::models::{NewUser, UpdateUser, User};

#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<Mutex<Vec<User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, new_user: &NewUser) -> AuthResult<User> {
        let phone = new_user.phone.trim();
        if phone.is_empty() {
            return Err(AuthError::Validation("phone cannot be empty".to_string()));
        }

        let mut users = self.users.lock().await;
        if users.iter().any(|u| u.phone == phone) {
            return Err(AuthError::Internal(format!("duplicate phone {}", phone)));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            phone: phone.to_string(),
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_by_phone(&self, phone: &str) -> AuthResult<Option<User>> {
        let phone = phone.trim();
        if phone.is_empty() {
            return Err(AuthError::Validation("phone cannot be empty".to_string()));
        }
        let users = self.users.lock().await;
        Ok(users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn list(&self, page: i64, page_size: i64) -> AuthResult<(Vec<User>, i64)> {
        let (page, page_size) = normalize_page(page, page_size);
        let users = self.users.lock().await;
        let total = users.len() as i64;

        let Some(offset) = page_offset(page, page_size) else {
            return Ok((Vec::new(), total));
        };

        // Insertion order is creation order; newest first.
        let data = users
            .iter()
            .rev()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page_size).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok((data, total))
    }

    async fn update(&self, id: Uuid, changes: &UpdateUser) -> AuthResult<Option<User>> {
        let phone = match &changes.phone {
            Some(phone) if phone.trim().is_empty() => {
                return Err(AuthError::Validation("phone cannot be empty".to_string()));
            }
            Some(phone) => Some(phone.trim()),
            None => None,
        };

        let mut users = self.users.lock().await;
        if let Some(phone) = phone {
            if users.iter().any(|u| u.phone == phone && u.id != id) {
                return Err(AuthError::Internal(format!("duplicate phone {}", phone)));
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(phone) = phone {
            user.phone = phone.to_string();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> AuthResult<bool> {
        let mut users = self.users.lock().await;
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_by_phone_reuses_record() {
        let repo = InMemoryUserRepository::new();

        let first = repo.get_or_create_by_phone("+15551234567").await.unwrap();
        let second = repo.get_or_create_by_phone(" +15551234567 ").await.unwrap();
        assert_eq!(first.id, second.id);

        let (users, total) = repo.list(1, 10).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users, vec![first]);
    }

    #[tokio::test]
    async fn test_empty_phone_is_rejected() {
        let repo = InMemoryUserRepository::new();
        assert!(matches!(
            repo.get_or_create_by_phone("  ").await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paginated() {
        let repo = InMemoryUserRepository::new();
        for i in 0..5 {
            repo.create(&NewUser {
                phone: format!("+1555000000{}", i),
            })
            .await
            .unwrap();
        }

        let (page, total) = repo.list(1, 2).await.unwrap();
        assert_eq!(total, 5);
        let phones: Vec<_> = page.iter().map(|u| u.phone.as_str()).collect();
        assert_eq!(phones, ["+15550000004", "+15550000003"]);

        let (page, _) = repo.list(3, 2).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].phone, "+15550000000");

        let (page, _) = repo.list(0, 0).await.unwrap();
        assert_eq!(page.len(), 5);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = InMemoryUserRepository::new();
        let user = repo
            .create(&NewUser {
                phone: "+15550001111".to_string(),
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                user.id,
                &UpdateUser {
                    phone: Some("+15550002222".to_string()),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.phone, "+15550002222");
        assert!(repo.get_by_phone("+15550001111").await.unwrap().is_none());

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(
            repo.update(user.id, &UpdateUser::default())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_update_rejects_empty_or_taken_phone() {
        let repo = InMemoryUserRepository::new();
        let first = repo.get_or_create_by_phone("+15550001111").await.unwrap();
        let second = repo.get_or_create_by_phone("+15550002222").await.unwrap();

        let change = |phone: &str| UpdateUser {
            phone: Some(phone.to_string()),
        };
        assert!(matches!(
            repo.update(first.id, &change("  ")).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            repo.update(first.id, &change("+15550002222")).await,
            Err(AuthError::Internal(_))
        ));
        assert!(matches!(
            repo.update(Uuid::new_v4(), &change("")).await,
            Err(AuthError::Validation(_))
        ));

        // Re-saving a user's own phone is not a conflict.
        let same = repo
            .update(second.id, &change(" +15550002222 "))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(same.phone, "+15550002222");
        assert_eq!(
            repo.get_by_id(first.id).await.unwrap().unwrap().phone,
            "+15550001111"
        );
    }

    #[tokio::test]
    async fn test_list_far_past_the_end_is_empty() {
        let repo = InMemoryUserRepository::new();
        repo.get_or_create_by_phone("+15550001111").await.unwrap();

        let (page, total) = repo.list(i64::MAX, 20).await.unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 1);
    }
}
