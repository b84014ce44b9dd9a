//! Doer applications: bids on open tasks.
//!
//! Fairness stats are snapshotted when the application is inserted and never
//! change afterwards, so a doer's later rating movement cannot retro-alter
//! the ranking of a pending bid.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::config::CoreConfig;
use crate::domain::task::TaskId;
use crate::domain::user::UserId;

/// Opaque application identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ApplicationId(Uuid);

impl ApplicationId {
    /// Wrap an existing identifier.
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Application lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Awaiting resolution.
    Pending,
    /// Chosen by the resolver.
    Accepted,
    /// Declined.
    Rejected,
    /// Withdrawn by the doer while the task was still open.
    Withdrawn,
}

/// A doer's bid on an open task. At most one per (task, doer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    /// Unique identifier.
    pub id: ApplicationId,
    /// The task applied to.
    pub task_id: TaskId,
    /// The applying doer.
    pub doer_id: UserId,
    /// Why the doer is a good fit.
    pub cover_letter: String,
    /// When the doer proposes to finish.
    pub proposed_timeline: Option<String>,
    /// Lifecycle status.
    pub status: ApplicationStatus,
    /// Doer's mean rating at submission; immutable.
    pub doer_rating_snapshot: Decimal,
    /// Doer's completed-task count at submission; immutable.
    pub doer_completed_tasks_snapshot: u32,
    /// Whether the doer was below the newbie threshold at submission.
    pub doer_is_newbie: bool,
    /// Submission instant.
    pub created_at: DateTime<Utc>,
}

impl Application {
    /// Auction ranking score.
    ///
    /// `rating × 10 + completed × 2 + newbie bonus`. The bonus is calibrated
    /// so an unrated newbie outranks a single one-star veteran but loses to
    /// any three-star veteran.
    pub fn ranking_score(&self, config: &CoreConfig) -> Decimal {
        let base = self.doer_rating_snapshot * Decimal::from(10)
            + Decimal::from(self.doer_completed_tasks_snapshot) * Decimal::from(2);
        if self.doer_is_newbie {
            base + config.newbie_bonus
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use chrono::Utc;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    use super::*;

    fn application(rating: Decimal, completed: u32, newbie: bool) -> Application {
        Application {
            id: ApplicationId::random(),
            task_id: TaskId::random(),
            doer_id: UserId::random(),
            cover_letter: String::new(),
            proposed_timeline: None,
            status: ApplicationStatus::Pending,
            doer_rating_snapshot: rating,
            doer_completed_tasks_snapshot: completed,
            doer_is_newbie: newbie,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(dec!(5.0), 10, false, dec!(70))]
    #[case(dec!(4.0), 2, true, dec!(59))]
    #[case(dec!(0.0), 0, true, dec!(15))]
    #[case(dec!(1.0), 2, false, dec!(14))]
    #[case(dec!(3.0), 0, false, dec!(30))]
    fn ranking_score_matches_contract(
        #[case] rating: Decimal,
        #[case] completed: u32,
        #[case] newbie: bool,
        #[case] score: Decimal,
    ) {
        let config = CoreConfig::default();
        assert_eq!(application(rating, completed, newbie).ranking_score(&config), score);
    }

    #[test]
    fn unrated_newbie_beats_one_star_veteran_but_not_three_star() {
        let config = CoreConfig::default();
        let newbie = application(dec!(0.0), 0, true);
        let one_star = application(dec!(1.0), 1, false);
        let three_star = application(dec!(3.0), 0, false);

        assert!(newbie.ranking_score(&config) > one_star.ranking_score(&config));
        assert!(newbie.ranking_score(&config) < three_star.ranking_score(&config));
    }
}
