use crate::domain::ItemWithFeed;
use crate::notify::config::NotificationConfig;
use crate::notify::intent::{FeedTarget, Intent};
use crate::notify::model::{
    ActionIcon, Category, Notification, NotificationAction, NotificationStyle, Priority,
};
use crate::notify::CHANNEL_ID;

pub const AGGREGATE_TITLE: &str = "Updated feeds";

/// Turns pending items into notifications. Holds no state besides the
/// settings deciding which secondary actions are offered.
#[derive(Debug, Clone, Default)]
pub struct NotificationBuilder {
    config: NotificationConfig,
}

impl NotificationBuilder {
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    pub fn single(&self, item: &ItemWithFeed) -> Notification {
        let id = item.id();
        let title = item.plain_title();
        let text = item.feed_display_title.clone();

        let mut actions = Vec::new();

        if self.config.open_enclosure_action {
            if let Some(enclosure) = &item.item.enclosure_link {
                actions.push(NotificationAction {
                    icon: ActionIcon::PlayCircle,
                    label: "Open enclosed media".into(),
                    intent: Intent::OpenInDefault {
                        item_id: id,
                        link: Some(enclosure.clone()),
                    },
                });
            }
        }

        if self.config.open_in_browser_action {
            if let Some(link) = &item.item.link {
                actions.push(NotificationAction {
                    icon: ActionIcon::OpenInBrowser,
                    label: "Open in browser".into(),
                    intent: Intent::OpenInDefault {
                        item_id: id,
                        link: Some(link.clone()),
                    },
                });
            }
        }

        if self.config.mark_as_read_action {
            actions.push(NotificationAction {
                icon: ActionIcon::Check,
                label: "Mark as read".into(),
                intent: Intent::OpenInDefault {
                    item_id: id,
                    link: None,
                },
            });
        }

        Notification {
            channel_id: CHANNEL_ID.into(),
            style: NotificationStyle::BigText {
                big_title: title.clone(),
                big_text: text.clone(),
            },
            title,
            text,
            number: 1,
            content_intent: Intent::reader(id),
            delete_intent: Intent::MarkAsNotified { item_ids: vec![id] },
            actions,
            category: Category::Social,
            priority: Priority::Low,
            auto_cancel: true,
        }
    }

    /// One notification listing every item. Opens the feed when all items
    /// share one, the all-feeds view otherwise.
    pub fn inbox(&self, items: &[ItemWithFeed]) -> Notification {
        let ids: Vec<i64> = items.iter().map(|i| i.id()).collect();

        let mut feed_titles: Vec<&str> = Vec::new();
        for item in items {
            if !feed_titles.contains(&item.feed_display_title.as_str()) {
                feed_titles.push(&item.feed_display_title);
            }
        }

        let lines = items
            .iter()
            .map(|i| format!("{} \u{2014} {}", i.feed_display_title, i.plain_title()))
            .collect();

        let target = match items.split_first() {
            Some((first, rest)) if rest.iter().all(|i| i.feed_id() == first.feed_id()) => {
                FeedTarget::Feed(first.feed_id())
            }
            _ => FeedTarget::AllFeeds,
        };

        Notification {
            channel_id: CHANNEL_ID.into(),
            title: AGGREGATE_TITLE.into(),
            text: feed_titles.join(", "),
            style: NotificationStyle::Inbox {
                big_title: AGGREGATE_TITLE.into(),
                lines,
            },
            number: items.len(),
            content_intent: Intent::feed(target, ids.clone()),
            delete_intent: Intent::MarkAsNotified { item_ids: ids },
            actions: Vec::new(),
            category: Category::Social,
            priority: Priority::Low,
            auto_cancel: true,
        }
    }
}
