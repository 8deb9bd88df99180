//! # Tidings
//!
//! An offline-first RSS/Atom feed reader that posts notifications when
//! subscribed feeds publish something new.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Normalizer → Store → NotificationDispatcher → Notifier
//!                          ↑                                  │
//!                          └──────── ActionHandler ←──────────┘
//! ```
//!
//! - [`fetcher`]: HTTP client with ETag/conditional request support
//! - [`normalizer`]: Converts RSS/Atom/JSON feeds to unified domain models
//! - [`store`]: SQLite persistence layer
//! - [`notify`]: Turns pending items into individual or bundled
//!   notifications and carries out their actions
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a feed and get notified about its new items
//! tidings add --notify https://blog.rust-lang.org/feed.xml
//!
//! # Update all feeds, then notify
//! tidings update
//!
//! # See what was posted, and open the bundled notification
//! tidings notifications list
//! tidings notifications open -1
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, fetcher, normalizer, notification dispatcher and action handler.
pub mod app;

/// Configuration loaded from `~/.config/tidings/config.toml`.
pub mod config;

/// Background daemon for automatic feed updates.
///
/// - `tidings daemon start` - Start the background updater
/// - `tidings daemon stop` - Stop the daemon
/// - `tidings daemon status` - Check if daemon is running
pub mod daemon;

/// Command-line interface using clap.
pub mod cli;

/// Core domain models.
///
/// - [`Feed`](domain::Feed): RSS/Atom feed metadata and notification opt-in
/// - [`Item`](domain::Item): Individual feed entries with SHA256 guids
/// - [`ItemState`](domain::ItemState): Read/notified state
pub mod domain;

/// HTTP fetching with conditional request support.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for feed fetching
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`ParallelFetcher`](fetcher::parallel::ParallelFetcher): Concurrent fetching with semaphore
pub mod fetcher;

/// Feed parsing and normalization.
///
/// Converts RSS 0.9x/1.0/2.0, Atom 0.3/1.0, and JSON Feed 1.0
/// into unified [`Item`](domain::Item) structs.
pub mod normalizer;

/// New-item notifications.
///
/// - [`NotificationDispatcher`](notify::NotificationDispatcher): bundles or
///   posts one notification per item
/// - [`Notifier`](notify::Notifier): the notification tray
/// - [`ActionHandler`](notify::ActionHandler): runs notification intents
pub mod notify;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
