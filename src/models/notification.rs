//! Notification rows produced by the notifier collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// What triggered a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    System,
    MatchReport,
    MatchReminder,
}

/// A notification delivered to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,

    pub user_id: UserId,

    pub title: String,

    pub body: String,

    pub kind: NotificationKind,

    /// The match (or other entity) this notification points at
    pub related_id: Option<String>,

    #[serde(default)]
    pub read: bool,

    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        title: String,
        body: String,
        kind: NotificationKind,
        related_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            body,
            kind,
            related_id,
            read: false,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(
            "u1".into(),
            "Match report".to_string(),
            "A report was published".to_string(),
            NotificationKind::MatchReport,
            Some("m1".to_string()),
            "2026-05-01T12:00:00Z".parse().unwrap(),
        );
        assert!(!n.read);
        assert_eq!(n.kind, NotificationKind::MatchReport);
    }

    #[test]
    fn test_kind_wire_format() {
        let json = serde_json::to_value(NotificationKind::MatchReminder).unwrap();
        assert_eq!(json, "match_reminder");
    }
}
