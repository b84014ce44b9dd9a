//! Ratings between posters and doers, and the denormalised rating cache.

use std::sync::Arc;

use mockable::Clock;
use rust_decimal::Decimal;
use tracing::info;

use crate::domain::error::{CoreError, CoreResult};
use crate::domain::money::round_half_even;
use crate::domain::notification::NotificationKind;
use crate::domain::notifications::{EmitNotification, NotificationService};
use crate::domain::ports::{RatingRepository, TaskRepository, UserRepository};
use crate::domain::rating::Rating;
use crate::domain::task::{TaskId, TaskStatus};
use crate::domain::user::{User, UserId};

/// A request to rate the counterparty of a completed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateUser {
    /// The completed task.
    pub task_id: TaskId,
    /// User giving the rating; must be the task's poster or doer.
    pub rater_id: UserId,
    /// User being rated; must be the other party.
    pub rated_id: UserId,
    /// Score in [1, 10].
    pub score: u8,
    /// Optional free-form feedback.
    pub feedback: Option<String>,
}

/// Records ratings and maintains each user's rating cache.
pub struct RatingService {
    ratings: Arc<dyn RatingRepository>,
    tasks: Arc<dyn TaskRepository>,
    users: Arc<dyn UserRepository>,
    notifier: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
}

impl RatingService {
    /// Build the service over its ports.
    pub fn new(
        ratings: Arc<dyn RatingRepository>,
        tasks: Arc<dyn TaskRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            ratings,
            tasks,
            users,
            notifier,
            clock,
        }
    }

    /// Rate the counterparty of a completed task.
    ///
    /// One rating per `(task, rater, rated)`; the insert folds the score
    /// into the rated user's cache in the same transaction.
    pub async fn rate(&self, request: RateUser) -> CoreResult<Rating> {
        let task = self
            .tasks
            .find(request.task_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no task {}", request.task_id)))?;
        if task.status != TaskStatus::Completed {
            return Err(CoreError::stale_state("only completed tasks can be rated"));
        }

        let rater = self
            .users
            .find(request.rater_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("no user {}", request.rater_id)))?;
        if rater.is_banned {
            return Err(CoreError::permission_denied("banned users cannot rate"));
        }

        let participants = [Some(task.poster_id), task.doer_id];
        if !participants.contains(&Some(request.rater_id)) {
            return Err(CoreError::permission_denied(
                "only the poster or the doer can rate this task",
            ));
        }
        let counterparty_ok = (request.rater_id == task.poster_id
            && task.doer_id == Some(request.rated_id))
            || (task.doer_id == Some(request.rater_id) && request.rated_id == task.poster_id);
        if !counterparty_ok {
            return Err(CoreError::permission_denied(
                "ratings go to the task's other party",
            ));
        }

        let rating = Rating::new(
            request.task_id,
            request.rater_id,
            request.rated_id,
            request.score,
            request.feedback,
            self.clock.utc(),
        )
        .map_err(|err| CoreError::constraint_violation(err.to_string()))?;

        let rating = self.ratings.insert(rating).await?;
        info!(task = %request.task_id, rated = %request.rated_id, score = request.score, "rating recorded");

        self.notifier
            .emit(EmitNotification::plain(
                request.rated_id,
                NotificationKind::RatingReceived,
                "You received a rating",
                format!("You were rated {}/10 for \"{}\".", request.score, task.title),
                Some(request.task_id),
            ))
            .await?;
        Ok(rating)
    }

    /// Recompute a user's rating cache from the rating rows.
    ///
    /// The cache is a pure denormalisation; this recovery path makes the
    /// two representations interchangeable.
    pub async fn rebuild_cache(&self, user_id: UserId) -> CoreResult<User> {
        let ratings = self.ratings.list_for_rated(user_id).await?;
        let total = u32::try_from(ratings.len())
            .map_err(|_| CoreError::constraint_violation("rating count overflow"))?;
        let avg = if ratings.is_empty() {
            Decimal::ZERO
        } else {
            let sum: Decimal = ratings.iter().map(|r| Decimal::from(r.score)).sum();
            round_half_even(sum / Decimal::from(total))
        };
        Ok(self.users.set_rating_cache(user_id, avg, total).await?)
    }
}

#[cfg(test)]
#[path = "rating_service_tests.rs"]
mod tests;
