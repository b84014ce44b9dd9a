//! Notification sink: typed, de-duplicated events per user.

use std::sync::Arc;

use chrono::TimeDelta;
use mockable::Clock;
use tracing::debug;

use crate::domain::error::CoreResult;
use crate::domain::notification::{Notification, NotificationId, NotificationKind};
use crate::domain::ports::NotificationRepository;
use crate::domain::task::TaskId;
use crate::domain::user::UserId;

/// An event to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitNotification {
    /// Recipient.
    pub user_id: UserId,
    /// Event type.
    pub kind: NotificationKind,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub body: String,
    /// Task this event concerns, if any.
    pub related_task: Option<TaskId>,
    /// De-duplication key; repeat emits with the same key are dropped.
    pub dedup_key: Option<String>,
    /// How long the key suppresses repeats. `None` with a key set means
    /// forever: the event fires at most once per recipient.
    pub dedup_window: Option<TimeDelta>,
}

impl EmitNotification {
    /// An event without de-duplication.
    pub fn plain(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        related_task: Option<TaskId>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            related_task,
            dedup_key: None,
            dedup_window: None,
        }
    }

    /// Suppress repeats carrying `key` within `window` (forever when
    /// `window` is `None`).
    pub fn deduped(mut self, key: impl Into<String>, window: Option<TimeDelta>) -> Self {
        self.dedup_key = Some(key.into());
        self.dedup_window = window;
        self
    }
}

/// Append-only notification log with read/unread lifecycle and retention.
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    /// Build the sink over its repository and clock.
    pub fn new(notifications: Arc<dyn NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            notifications,
            clock,
        }
    }

    /// Emit an event to a recipient.
    ///
    /// Returns `false` when a dedup key suppressed the emit.
    pub async fn emit(&self, event: EmitNotification) -> CoreResult<bool> {
        let now = self.clock.utc();

        if let Some(key) = &event.dedup_key {
            let last = self
                .notifications
                .last_emitted(event.user_id, key.clone())
                .await?;
            if let Some(emitted_at) = last {
                let suppressed = match event.dedup_window {
                    Some(window) => now - emitted_at < window,
                    None => true,
                };
                if suppressed {
                    debug!(user = %event.user_id, key = %key, "notification suppressed by dedup key");
                    return Ok(false);
                }
            }
        }

        self.notifications
            .insert(Notification {
                id: NotificationId::random(),
                user_id: event.user_id,
                kind: event.kind,
                title: event.title,
                body: event.body,
                related_task: event.related_task,
                dedup_key: event.dedup_key,
                is_read: false,
                created_at: now,
            })
            .await?;
        Ok(true)
    }

    /// When an event carrying `dedup_key` was last emitted to `user_id`.
    ///
    /// Lets callers enforce cross-key ordering rules (the deadline agent
    /// never follows a higher reminder tier with a lower one).
    pub async fn last_emitted(
        &self,
        user_id: UserId,
        dedup_key: impl Into<String>,
    ) -> CoreResult<Option<chrono::DateTime<chrono::Utc>>> {
        Ok(self
            .notifications
            .last_emitted(user_id, dedup_key.into())
            .await?)
    }

    /// Unread count for a user.
    pub async fn count_unread(&self, user_id: UserId) -> CoreResult<u64> {
        Ok(self.notifications.count_unread(user_id).await?)
    }

    /// Most recent notifications for a user, newest first.
    pub async fn list_recent(&self, user_id: UserId, limit: usize) -> CoreResult<Vec<Notification>> {
        Ok(self.notifications.list_recent(user_id, limit).await?)
    }

    /// Mark specific notifications read; returns how many changed.
    pub async fn mark_read(&self, user_id: UserId, ids: Vec<NotificationId>) -> CoreResult<u64> {
        Ok(self.notifications.mark_read(user_id, ids).await?)
    }

    /// Mark everything read for a user; returns how many changed.
    pub async fn mark_all_read(&self, user_id: UserId) -> CoreResult<u64> {
        Ok(self.notifications.mark_all_read(user_id).await?)
    }

    /// Prune notifications older than `retention`; returns how many were
    /// removed.
    pub async fn prune_expired(&self, retention: TimeDelta) -> CoreResult<u64> {
        let cutoff = self.clock.utc() - retention;
        let pruned = self.notifications.prune_older_than(cutoff).await?;
        if pruned > 0 {
            debug!(pruned, "pruned expired notifications");
        }
        Ok(pruned)
    }
}

#[cfg(test)]
#[path = "notifications_tests.rs"]
mod tests;
