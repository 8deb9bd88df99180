//! Notifications for newly arrived items.
//!
//! ```text
//! Store ──► NotificationDispatcher ──► NotificationBuilder ──► Notifier (tray)
//!   ▲                                                             │
//!   └──────────────── ActionHandler ◄──── Intent ◄────────────────┘
//! ```
//!
//! After each update the [`NotificationDispatcher`] collects unread items of
//! notify-enabled feeds that have not been announced yet. Fewer than
//! `bundle_threshold` items are posted one notification each, keyed by item
//! id; more are bundled into one inbox notification under
//! [`AGGREGATE_NOTIFICATION_ID`]. Switching between the two cancels the
//! other presentation, so an item is never visible twice.
//!
//! Every notification carries [`Intent`]s. Dismissing one marks its items as
//! notified; activating one marks the item read and opens it.

pub mod builder;
pub mod config;
pub mod dispatcher;
pub mod handler;
pub mod intent;
pub mod model;
pub mod notifier;

pub use builder::NotificationBuilder;
pub use config::NotificationConfig;
pub use dispatcher::{BundlePolicy, DispatchOutcome, NotificationDispatcher};
pub use handler::{ActionHandler, ActionOutcome, LinkOpener, SystemOpener};
pub use intent::{DeepLink, FeedTarget, Intent};
pub use model::{Notification, NotificationAction, NotificationId, NotificationStyle};
pub use notifier::{MemoryNotifier, Notifier, SpoolNotifier};

/// Key of the bundled inbox notification. Item ids are positive row ids, so
/// it never collides with an item.
pub const AGGREGATE_NOTIFICATION_ID: NotificationId = -1;

pub const CHANNEL_ID: &str = "tidings-notifications";
