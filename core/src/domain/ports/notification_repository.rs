//! Port for the notification log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::notification::{Notification, NotificationId};
use crate::domain::user::UserId;

use super::StoreError;

/// Port for notification persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Append a notification.
    async fn insert(&self, notification: Notification) -> Result<(), StoreError>;

    /// When a notification with `dedup_key` was last emitted to `user_id`,
    /// if ever.
    async fn last_emitted(
        &self,
        user_id: UserId,
        dedup_key: String,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Unread count for a user.
    async fn count_unread(&self, user_id: UserId) -> Result<u64, StoreError>;

    /// Most recent notifications for a user, newest first.
    async fn list_recent(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Mark specific notifications read; returns how many changed.
    async fn mark_read(
        &self,
        user_id: UserId,
        ids: Vec<NotificationId>,
    ) -> Result<u64, StoreError>;

    /// Mark everything read for a user; returns how many changed.
    async fn mark_all_read(&self, user_id: UserId) -> Result<u64, StoreError>;

    /// Remove notifications created strictly before `cutoff`; returns how
    /// many were removed.
    async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
