//! Ratings left between posters and doers after completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::task::TaskId;
use crate::domain::user::UserId;

/// Validation failures for [`Rating`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RatingValidationError {
    /// Score outside [1, 10].
    #[error("score {0} is outside 1..=10")]
    ScoreOutOfRange(u8),
}

/// An immutable rating of one user by another for a task.
///
/// `(task, rater, rated)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Unique identifier.
    pub id: Uuid,
    /// The completed task being rated.
    pub task_id: TaskId,
    /// User giving the rating.
    pub rater_id: UserId,
    /// User being rated.
    pub rated_id: UserId,
    /// Score in [1, 10].
    pub score: u8,
    /// Optional free-form feedback.
    pub feedback: Option<String>,
    /// Creation instant.
    pub created_at: DateTime<Utc>,
}

impl Rating {
    /// Validate and build a rating created at `now`.
    pub fn new(
        task_id: TaskId,
        rater_id: UserId,
        rated_id: UserId,
        score: u8,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, RatingValidationError> {
        if !(1..=10).contains(&score) {
            return Err(RatingValidationError::ScoreOutOfRange(score));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            task_id,
            rater_id,
            rated_id,
            score,
            feedback,
            created_at: now,
        })
    }
}
