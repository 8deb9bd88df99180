use serde::{Deserialize, Serialize};

use crate::notify::intent::Intent;

/// Key of a notification in the tray. Individual notifications use the item
/// id; the bundled one uses [`AGGREGATE_NOTIFICATION_ID`](super::AGGREGATE_NOTIFICATION_ID).
pub type NotificationId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Social,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationStyle {
    BigText { big_title: String, big_text: String },
    Inbox { big_title: String, lines: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionIcon {
    PlayCircle,
    OpenInBrowser,
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub icon: ActionIcon,
    pub label: String,
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub channel_id: String,
    pub title: String,
    pub text: String,
    pub style: NotificationStyle,
    /// Number of items represented
    pub number: usize,
    /// Fired when the notification body is activated
    pub content_intent: Intent,
    /// Fired when the notification is dismissed
    pub delete_intent: Intent,
    pub actions: Vec<NotificationAction>,
    pub category: Category,
    pub priority: Priority,
    pub auto_cancel: bool,
}

impl Notification {
    /// Ids of the items this notification stands for.
    pub fn item_ids(&self) -> &[i64] {
        match &self.delete_intent {
            Intent::MarkAsNotified { item_ids } => item_ids,
            _ => &[],
        }
    }

    pub fn action(&self, index: usize) -> Option<&NotificationAction> {
        self.actions.get(index)
    }
}
