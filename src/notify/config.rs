use serde::Deserialize;

/// Notification settings, read from the `[notifications]` table.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Dispatch notifications after each update
    pub enabled: bool,

    /// Number of pending items at which they are bundled into a single
    /// inbox notification
    pub bundle_threshold: usize,

    /// The notification tray groups notifications by itself, so items are
    /// never bundled
    pub auto_grouping: bool,

    /// Offer "Open enclosed media" on items that carry an enclosure
    pub open_enclosure_action: bool,

    /// Offer "Open in browser" on items that carry a link
    pub open_in_browser_action: bool,

    /// Offer "Mark as read" on every item
    pub mark_as_read_action: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bundle_threshold: 4,
            auto_grouping: false,
            open_enclosure_action: true,
            open_in_browser_action: true,
            mark_as_read_action: true,
        }
    }
}
