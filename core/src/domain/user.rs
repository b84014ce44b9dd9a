//! User identity as seen by the allocation core.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque user identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct UserId(Uuid);

impl UserId {
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

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Marketplace role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Creates tasks and pays for them.
    Poster,
    /// Executes tasks for a fee.
    Doer,
    /// Moderates the marketplace.
    Admin,
}

/// Kind of work a doer takes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoerType {
    /// Simple errands only.
    Microtasker,
    /// Verified-skill work only.
    Skilled,
    /// Both microtasks and skilled work.
    Both,
}

/// A poster, doer, or administrator.
///
/// `avg_rating` and `total_ratings` form a denormalised cache over the
/// ratings received by this user; the rating repository maintains it
/// transactionally and [`crate::domain::rating_service::RatingService`] can
/// rebuild it from the rating rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Marketplace role.
    pub role: Role,
    /// Kind of work taken on; meaningful for doers only.
    pub doer_type: Option<DoerType>,
    /// Cached mean of received rating scores, in [0, 10].
    pub avg_rating: Decimal,
    /// Cached count of received ratings.
    pub total_ratings: u32,
    /// Free-form campus tag used for locality scoring.
    pub campus_location: Option<String>,
    /// Banned users may not post, apply, or receive assignments.
    pub is_banned: bool,
}

impl User {
    /// Mean received rating, or `None` when no rating exists yet.
    pub fn rating(&self) -> Option<Decimal> {
        (self.total_ratings > 0).then_some(self.avg_rating)
    }

    /// Whether this user may take on work in `category`.
    ///
    /// Microtasks are open to every doer type; skilled categories require a
    /// `Skilled` or `Both` doer.
    pub fn admits_category(&self, category: crate::domain::task::Category) -> bool {
        use crate::domain::task::Category;
        match self.doer_type {
            Some(DoerType::Both) => true,
            Some(DoerType::Microtasker) => category == Category::Microtask,
            Some(DoerType::Skilled) => category != Category::Microtask,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::task::Category;

    fn doer(doer_type: Option<DoerType>) -> User {
        User {
            id: UserId::random(),
            role: Role::Doer,
            doer_type,
            avg_rating: dec!(0),
            total_ratings: 0,
            campus_location: None,
            is_banned: false,
        }
    }

    #[test]
    fn rating_is_none_until_rated() {
        let mut user = doer(Some(DoerType::Both));
        assert_eq!(user.rating(), None);

        user.avg_rating = dec!(7.5);
        user.total_ratings = 2;
        assert_eq!(user.rating(), Some(dec!(7.5)));
    }

    #[test]
    fn category_admission_follows_doer_type() {
        assert!(doer(Some(DoerType::Both)).admits_category(Category::Typing));
        assert!(doer(Some(DoerType::Microtasker)).admits_category(Category::Microtask));
        assert!(!doer(Some(DoerType::Microtasker)).admits_category(Category::Typing));
        assert!(doer(Some(DoerType::Skilled)).admits_category(Category::Graphics));
        assert!(!doer(Some(DoerType::Skilled)).admits_category(Category::Microtask));
        assert!(!doer(None).admits_category(Category::Microtask));
    }
}
