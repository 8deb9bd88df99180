pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tidings")]
#[command(about = "An RSS/Atom reader that tells you when feeds update", long_about = None)]
pub struct Cli {
    /// Number of parallel workers for fetching feeds (overrides config)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// Database path (default: data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new feed
    Add {
        /// URL of the feed to add
        url: String,

        /// Notify about items this feed publishes from now on
        #[arg(long)]
        notify: bool,
    },
    /// Remove a feed
    Remove {
        /// URL of the feed to remove
        url: String,
    },
    /// Import feeds from an OPML file
    Import {
        /// Path to the OPML file
        path: PathBuf,
    },
    /// Update all feeds, then notify about new items
    Update {
        /// Only fetch; leave notifications alone
        #[arg(long)]
        no_notify: bool,
    },
    /// List feeds or items
    List {
        /// Show items instead of feeds
        #[arg(long)]
        items: bool,
    },
    /// Turn notifications for a feed on or off
    NotifyFeed {
        /// URL of the feed
        url: String,

        /// Turn notifications off
        #[arg(long)]
        off: bool,
    },
    /// Notify about pending items without fetching
    Notify,
    /// Inspect and act on posted notifications
    Notifications {
        #[command(subcommand)]
        action: NotificationAction,
    },
    /// Mark an item read and withdraw its notification
    MarkRead {
        /// Item id as shown by `list --items`
        id: i64,
    },
    /// Background daemon for automatic updates
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum NotificationAction {
    /// Show the notification tray
    List,
    /// Activate a notification, or one of its action buttons
    Open {
        /// Notification id (-1 is the bundled notification)
        #[arg(allow_negative_numbers = true)]
        id: i64,

        /// Index of the action button to press
        #[arg(short, long)]
        action: Option<usize>,
    },
    /// Run a `tidings://` intent URI shown by `notifications list`
    OpenUri {
        /// Intent URI, e.g. tidings://items/12
        uri: String,
    },
    /// Dismiss a notification
    Dismiss {
        /// Notification id (-1 is the bundled notification)
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the background daemon
    Start {
        /// Update interval (e.g., "1h", "30m", "6h", "1d"; default from config)
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip initial update on start
        #[arg(long)]
        no_initial_update: bool,

        /// Log file path (default: stdout)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Run in foreground (don't detach)
        #[arg(short, long)]
        foreground: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_open_accepts_aggregate_id() {
        let cli = Cli::try_parse_from(["tidings", "notifications", "open", "-1", "--action", "0"])
            .unwrap();

        match cli.command {
            Commands::Notifications {
                action: NotificationAction::Open { id, action },
            } => {
                assert_eq!(id, -1);
                assert_eq!(action, Some(0));
            }
            _ => panic!("expected notifications open"),
        }
    }

    #[test]
    fn test_open_uri_takes_intent() {
        let cli = Cli::try_parse_from([
            "tidings",
            "notifications",
            "open-uri",
            "tidings://feed/all?notified=1%2C2",
        ])
        .unwrap();

        match cli.command {
            Commands::Notifications {
                action: NotificationAction::OpenUri { uri },
            } => assert_eq!(uri, "tidings://feed/all?notified=1%2C2"),
            _ => panic!("expected notifications open-uri"),
        }
    }

    #[test]
    fn test_update_no_notify_flag() {
        let cli = Cli::try_parse_from(["tidings", "update", "--no-notify"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { no_notify: true }));
    }
}
