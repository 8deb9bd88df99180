pub mod feed;
pub mod item;
pub mod state;

pub use feed::{Feed, FeedUpdate};
pub use item::{plain_text, Item, ItemWithFeed};
pub use state::ItemState;
