pub mod sqlite;

use crate::app::Result;
use crate::domain::{Feed, FeedUpdate, Item, ItemState, ItemWithFeed};

pub use sqlite::SqliteStore;

pub trait Store {
    // Feed operations
    fn add_feed(&self, feed: &Feed) -> Result<i64>;
    fn get_feed(&self, id: i64) -> Result<Option<Feed>>;
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn get_all_feeds(&self) -> Result<Vec<Feed>>;
    fn update_feed(&self, id: i64, update: &FeedUpdate) -> Result<()>;
    fn delete_feed(&self, id: i64) -> Result<()>;
    /// Enabling notifications marks the feed's current items as notified,
    /// so only items arriving afterwards are announced.
    fn set_feed_notify(&self, id: i64, notify: bool) -> Result<()>;

    // Item operations
    /// Returns the new item id, or `None` when the guid was already stored.
    fn add_item(&self, item: &Item) -> Result<Option<i64>>;
    fn add_items(&self, items: &[Item]) -> Result<usize>;
    fn get_item(&self, id: i64) -> Result<Option<Item>>;
    fn get_items_by_feed(&self, feed_id: i64) -> Result<Vec<Item>>;
    fn get_all_items(&self) -> Result<Vec<Item>>;

    // State operations
    fn get_item_state(&self, item_id: i64) -> Result<Option<ItemState>>;
    fn set_read(&self, item_id: i64, is_read: bool) -> Result<()>;
    fn get_unread_count(&self, feed_id: i64) -> Result<i64>;

    // Notification queries
    fn feed_ids_to_notify(&self) -> Result<Vec<i64>>;
    /// Unread, not yet notified items of the given feeds.
    fn items_to_notify(&self, feed_ids: &[i64]) -> Result<Vec<ItemWithFeed>>;
    fn mark_as_notified(&self, item_ids: &[i64]) -> Result<()>;
    fn mark_as_read_and_notified(&self, item_id: i64) -> Result<()>;
}
