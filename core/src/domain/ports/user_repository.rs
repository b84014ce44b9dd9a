//! Port for user reads and rating-cache maintenance.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::user::{User, UserId};

use super::StoreError;

/// Port for user persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user. Fails with [`StoreError::Conflict`] on a
    /// duplicate id.
    async fn insert(&self, user: User) -> Result<(), StoreError>;

    /// Find a user by id.
    async fn find(&self, user_id: UserId) -> Result<Option<User>, StoreError>;

    /// All unbanned users who can take on work.
    async fn list_active_doers(&self) -> Result<Vec<User>, StoreError>;

    /// All administrators.
    async fn list_admins(&self) -> Result<Vec<User>, StoreError>;

    /// Overwrite a user's denormalised rating cache.
    ///
    /// Used by the rating-cache rebuild path; ordinary maintenance happens
    /// transactionally inside
    /// [`super::RatingRepository::insert`](super::RatingRepository).
    async fn set_rating_cache(
        &self,
        user_id: UserId,
        avg_rating: Decimal,
        total_ratings: u32,
    ) -> Result<User, StoreError>;
}
