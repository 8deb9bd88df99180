use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ItemState {
    pub item_id: i64,
    pub is_read: bool,
    /// Set once the item has been shown and dismissed, or otherwise handled
    pub notified: bool,
    pub read_at: Option<DateTime<Utc>>,
}
