//! Port for rating persistence.

use async_trait::async_trait;

use crate::domain::rating::Rating;
use crate::domain::user::UserId;

use super::StoreError;

/// Port for rating persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Insert a rating.
    ///
    /// Atomically with the row, fold the score into the rated user's
    /// denormalised `avg_rating`/`total_ratings` cache. Fails with
    /// [`StoreError::Conflict`] when `(task, rater, rated)` already exists.
    async fn insert(&self, rating: Rating) -> Result<Rating, StoreError>;

    /// All ratings received by a user.
    async fn list_for_rated(&self, rated_id: UserId) -> Result<Vec<Rating>, StoreError>;
}
