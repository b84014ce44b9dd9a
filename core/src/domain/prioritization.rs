//! Multi-factor task prioritization.
//!
//! Computes, for a (task, doer) pair, seven weighted factor scores and their
//! total. The engine is pure over its inputs and `now`: identical inputs
//! yield identical output, and nothing is mutated. Listing views use
//! [`rank`] to order candidate tasks for a doer; the push-assignment path
//! uses the same scores to pick a doer for a task.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::money::round_half_even;
use crate::domain::task::Task;
use crate::domain::user::{User, UserId};

/// Weight of the urgency factor.
pub const URGENCY_WEIGHT: Decimal = dec!(1.5);
/// Weight of the locality factor.
pub const LOCATION_WEIGHT: Decimal = dec!(2.0);
/// Weight of the explicit-preference factor.
pub const PREFERENCE_WEIGHT: Decimal = dec!(2.0);
/// Weight of the time-window factor.
pub const TIME_WINDOW_WEIGHT: Decimal = dec!(1.5);
/// Weight of the price factor.
pub const PRICE_WEIGHT: Decimal = dec!(1.0);
/// Weight of the poster-rating factor.
pub const POSTER_RATING_WEIGHT: Decimal = dec!(2.0);
/// Weight of the deadline-proximity factor.
pub const DEADLINE_WEIGHT: Decimal = dec!(1.0);

/// Poster rating assumed when the poster has no ratings yet.
const DEFAULT_POSTER_RATING: Decimal = dec!(3.0);
/// Price at which the price factor saturates.
const PRICE_SATURATION: Decimal = dec!(1000);

/// The observing doer, reduced to what scoring needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoerContext {
    /// The doer's id, matched against task preferences.
    pub doer_id: UserId,
    /// The doer's campus tag, matched against task locality.
    pub campus_location: Option<String>,
}

impl From<&User> for DoerContext {
    fn from(user: &User) -> Self {
        Self {
            doer_id: user.id,
            campus_location: user.campus_location.clone(),
        }
    }
}

/// Weighted per-factor scores and their total, for transparency surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Urgency from the poster-declared priority level.
    pub urgency: Decimal,
    /// Campus locality match.
    pub location: Decimal,
    /// Explicit poster preference for this doer.
    pub preference: Decimal,
    /// Fit against the preferred execution window.
    pub time_window: Decimal,
    /// Price attractiveness, saturating at the configured ceiling.
    pub price: Decimal,
    /// Poster reputation.
    pub poster_rating: Decimal,
    /// Deadline proximity.
    pub deadline: Decimal,
    /// Sum of all weighted factors.
    pub total: Decimal,
}

/// Score one task for one doer at `now`.
///
/// `poster_rating` is the poster's mean received score, or `None` when the
/// poster has not been rated yet.
pub fn score(
    task: &Task,
    doer: &DoerContext,
    poster_rating: Option<Decimal>,
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    let urgency = weighted(urgency_raw(task), URGENCY_WEIGHT);
    let location = weighted(location_raw(task, doer), LOCATION_WEIGHT);
    let preference = weighted(preference_raw(task, doer), PREFERENCE_WEIGHT);
    let time_window = weighted(time_window_raw(task, now), TIME_WINDOW_WEIGHT);
    let price = weighted(price_raw(task), PRICE_WEIGHT);
    let poster_rating = weighted(poster_rating_raw(poster_rating), POSTER_RATING_WEIGHT);
    let deadline = weighted(deadline_raw(task, now), DEADLINE_WEIGHT);

    ScoreBreakdown {
        urgency,
        location,
        preference,
        time_window,
        price,
        poster_rating,
        deadline,
        total: urgency + location + preference + time_window + price + poster_rating + deadline,
    }
}

/// Order scored tasks for presentation: best score first, ties broken by
/// higher price, then newer creation.
pub fn rank(mut scored: Vec<(Task, ScoreBreakdown)>) -> Vec<(Task, ScoreBreakdown)> {
    scored.sort_by(|(a, sa), (b, sb)| {
        sb.total
            .cmp(&sa.total)
            .then_with(|| b.price.cmp(&a.price))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
    scored
}

fn weighted(raw: Decimal, weight: Decimal) -> Decimal {
    round_half_even(raw * weight)
}

fn urgency_raw(task: &Task) -> Decimal {
    Decimal::from(task.priority_level) / dec!(5)
}

fn location_raw(task: &Task, doer: &DoerContext) -> Decimal {
    match (&task.campus_location, &doer.campus_location) {
        (Some(task_campus), Some(doer_campus)) if task_campus == doer_campus => dec!(2.0),
        (None, _) => dec!(0.5),
        _ => Decimal::ZERO,
    }
}

fn preference_raw(task: &Task, doer: &DoerContext) -> Decimal {
    if task.preferred_doer == Some(doer.doer_id) {
        dec!(2.0)
    } else {
        Decimal::ZERO
    }
}

fn time_window_raw(task: &Task, now: DateTime<Utc>) -> Decimal {
    if let (Some(start), Some(end)) = (task.time_window_start, task.time_window_end) {
        if start <= now && now <= end {
            return dec!(1.5);
        }
    }
    if let Some(start) = task.time_window_start {
        if start.date_naive() == now.date_naive() {
            return dec!(1.0);
        }
    }
    if task.flexible_timing {
        return dec!(0.5);
    }
    if task.time_window_start.is_none() {
        return dec!(0.3);
    }
    Decimal::ZERO
}

fn price_raw(task: &Task) -> Decimal {
    (task.price / PRICE_SATURATION).min(dec!(1.0))
}

fn poster_rating_raw(poster_rating: Option<Decimal>) -> Decimal {
    poster_rating.unwrap_or(DEFAULT_POSTER_RATING) / dec!(5)
}

fn deadline_raw(task: &Task, now: DateTime<Utc>) -> Decimal {
    let remaining = task.deadline - now;
    if remaining <= TimeDelta::hours(24) {
        dec!(1.0)
    } else if remaining <= TimeDelta::days(3) {
        dec!(0.7)
    } else if remaining <= TimeDelta::days(7) {
        dec!(0.4)
    } else {
        dec!(0.2)
    }
}

#[cfg(test)]
#[path = "prioritization_tests.rs"]
mod tests;
