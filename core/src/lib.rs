//! Task allocation core for a campus errand marketplace.
//!
//! The crate decides, for any open errand, which doer should do it and in
//! what order doers see candidate work, under timing, fairness, and failure
//! constraints: multi-factor priority scoring, a bounded-window application
//! auction with a newbie-compensating ranking, push assignment for urgent
//! unanswered tasks, a deadline lifecycle with tiered reminders and
//! grace-period deletion, commission accounting with a chat-unlock gate, and
//! a de-duplicated notification sink, all driven by idempotent periodic
//! sweeps.
//!
//! The HTTP surface, identity, templates, file storage, the payment gateway,
//! and the relational engine are external collaborators reached through the
//! ports in [`domain::ports`].

pub mod domain;
pub mod outbound;
pub mod scheduler;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
