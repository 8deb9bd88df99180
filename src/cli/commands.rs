use std::path::Path;

use tracing::warn;

use crate::app::{AppContext, Result, TidingsError};
use crate::domain::{plain_text, Feed, FeedUpdate, Item};
use crate::fetcher::{refresh_feed, summarize};
use crate::notify::{
    ActionOutcome, DispatchOutcome, FeedTarget, Intent, NotificationId, NotificationStyle,
    AGGREGATE_NOTIFICATION_ID,
};
use crate::store::Store;

pub async fn add_feed(ctx: &AppContext, url: &str, notify: bool) -> Result<()> {
    if ctx.store.get_feed_by_url(url)?.is_some() {
        println!("Feed already exists: {}", url);
        return Ok(());
    }

    let feed_id = ctx.store.add_feed(&Feed::new(url.to_string()))?;
    println!("Added feed: {}", url);

    let feed = stored_feed(ctx, feed_id, url)?;
    let count = refresh_feed(ctx.fetcher.as_ref(), &feed, ctx.store.as_ref(), &ctx.normalizer).await?;

    let feed = stored_feed(ctx, feed_id, url)?;
    if let Some(title) = &feed.title {
        println!("Feed title: {}", title);
    }
    println!("Fetched {} items", count);

    if notify {
        // Items already fetched count as seen; only later ones notify.
        ctx.store.set_feed_notify(feed_id, true)?;
        println!("Notifications on for {}", feed.display_title());
    }

    Ok(())
}

fn stored_feed(ctx: &AppContext, feed_id: i64, url: &str) -> Result<Feed> {
    ctx.store
        .get_feed(feed_id)?
        .ok_or_else(|| TidingsError::FeedNotFound(url.to_string()))
}

pub fn remove_feed(ctx: &AppContext, url: &str) -> Result<()> {
    let feed = ctx
        .store
        .get_feed_by_url(url)?
        .ok_or_else(|| TidingsError::FeedNotFound(url.to_string()))?;

    ctx.dispatcher.remove_feed(feed.id)?;
    println!("Removed feed: {}", url);
    Ok(())
}

/// Refresh every feed. Unless `notify` is false or notifications are
/// disabled in the config, pending items are dispatched afterwards.
pub async fn update_feeds(ctx: &AppContext, notify: bool) -> Result<()> {
    let feeds = ctx.store.get_all_feeds()?;

    if feeds.is_empty() {
        println!("No feeds to update");
        return Ok(());
    }

    println!("Updating {} feeds...", feeds.len());

    let reports = ctx
        .parallel_fetcher
        .refresh_all(feeds, ctx.store.clone(), &ctx.normalizer)
        .await;

    for report in &reports {
        match &report.result {
            Ok(count) if *count > 0 => {
                println!("  {} new items from {}", count, report.feed_title);
            }
            Ok(_) => {}
            Err(e) => eprintln!("  Error updating {}: {}", report.feed_title, e),
        }
    }

    let (total_new, errors) = summarize(&reports);
    println!("Update complete: {} new items, {} errors", total_new, errors);

    if notify && ctx.config.notifications.enabled {
        notify_pending(ctx).await?;
    }
    Ok(())
}

/// Dispatch pending items without fetching.
pub async fn notify_pending(ctx: &AppContext) -> Result<()> {
    let outcome = ctx.dispatcher.clone().notify_pending_in_background().await?;
    println!("{}", describe_dispatch(&outcome));
    Ok(())
}

fn describe_dispatch(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Nothing => "No new items to notify".to_string(),
        DispatchOutcome::Individual(ids) => format!("Posted {} notifications", ids.len()),
        DispatchOutcome::Aggregate(ids) => {
            format!("Posted 1 notification bundling {} items", ids.len())
        }
    }
}

pub fn set_feed_notify(ctx: &AppContext, url: &str, enabled: bool) -> Result<()> {
    let feed = ctx
        .store
        .get_feed_by_url(url)?
        .ok_or_else(|| TidingsError::FeedNotFound(url.to_string()))?;

    ctx.store.set_feed_notify(feed.id, enabled)?;
    println!(
        "Notifications {} for {}",
        if enabled { "on" } else { "off" },
        feed.display_title()
    );
    Ok(())
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.get_all_feeds()?;

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in feeds {
        let unread = ctx.store.get_unread_count(feed.id)?;
        let bell = if feed.notify { " [notify]" } else { "" };
        println!(
            "{} ({} unread){}\n  {}",
            feed.display_title(),
            unread,
            bell,
            feed.url
        );
    }

    Ok(())
}

pub fn list_items(ctx: &AppContext) -> Result<()> {
    let items = ctx.store.get_all_items()?;
    print_items(ctx, &items)
}

fn print_items(ctx: &AppContext, items: &[Item]) -> Result<()> {
    if items.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in items {
        let state = ctx.store.get_item_state(item.id)?;
        let read_marker = if state.map(|s| s.is_read).unwrap_or(false) {
            " "
        } else {
            "\u{25cf}"
        };

        let date = item
            .published_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());

        println!(
            "{} {:>6} {} {}",
            read_marker,
            item.id,
            date,
            item.plain_title()
        );
    }

    Ok(())
}

pub fn list_notifications(ctx: &AppContext) -> Result<()> {
    let active = ctx.dispatcher.notifier().active()?;

    if active.is_empty() {
        println!("No notifications");
        return Ok(());
    }

    for (id, notification) in active {
        println!("[{}] {}", id, notification.title);
        println!("    {}", notification.text);
        println!("    {}", notification.content_intent);
        if let NotificationStyle::Inbox { lines, .. } = &notification.style {
            for line in lines {
                println!("      {}", line);
            }
        }
        for (index, action) in notification.actions.iter().enumerate() {
            println!("    ({}) {}  {}", index, action.label, action.intent);
        }
    }

    Ok(())
}

pub fn open_notification(ctx: &AppContext, id: NotificationId, action: Option<usize>) -> Result<()> {
    let outcome = ctx.actions.activate(id, action)?;
    print_outcome(ctx, &outcome)
}

/// Run a `tidings://` intent URI as printed by `notifications list`.
pub fn open_uri(ctx: &AppContext, uri: &str) -> Result<()> {
    let intent: Intent = uri.parse()?;
    let outcome = ctx.actions.handle(&intent)?;
    print_outcome(ctx, &outcome)
}

pub fn dismiss_notification(ctx: &AppContext, id: NotificationId) -> Result<()> {
    let outcome = ctx.actions.dismiss(id)?;
    if id == AGGREGATE_NOTIFICATION_ID {
        println!("Dismissed bundled notification");
    }
    print_outcome(ctx, &outcome)
}

/// Same as the "Mark as read" notification action.
pub fn mark_read(ctx: &AppContext, item_id: i64) -> Result<()> {
    let outcome = ctx.actions.handle(&Intent::OpenInDefault {
        item_id,
        link: None,
    })?;
    print_outcome(ctx, &outcome)
}

fn print_outcome(ctx: &AppContext, outcome: &ActionOutcome) -> Result<()> {
    match outcome {
        ActionOutcome::MarkedNotified(ids) => {
            println!("Marked {} items as notified", ids.len());
        }
        ActionOutcome::Opened {
            link: Some(link), ..
        } => println!("Opened {}", link),
        ActionOutcome::Opened { item_id, link: None } => {
            println!("Marked item {} as read", item_id)
        }
        ActionOutcome::ShowItem(item) => {
            println!("{}", item.plain_title());
            if let Some(link) = &item.link {
                println!("{}", link);
            }
            println!();
            println!("{}", plain_text(item.display_content()));
        }
        ActionOutcome::ShowFeed(FeedTarget::Feed(feed_id)) => {
            let items = ctx.store.get_items_by_feed(*feed_id)?;
            print_items(ctx, &items)?;
        }
        ActionOutcome::ShowFeed(FeedTarget::AllFeeds) => list_items(ctx)?,
    }
    Ok(())
}

/// Import feeds from an OPML file
pub async fn import_opml(ctx: &AppContext, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let outlines = parse_opml(&content);

    if outlines.is_empty() {
        println!("No feeds found in OPML file");
        return Ok(());
    }

    println!("Found {} feeds in OPML file", outlines.len());

    let mut added = 0;
    let mut skipped = 0;
    let mut errors = 0;

    for (title, url) in outlines {
        if ctx.store.get_feed_by_url(&url)?.is_some() {
            skipped += 1;
            continue;
        }

        let feed_id = ctx.store.add_feed(&Feed::new(url.clone()))?;
        let feed = stored_feed(ctx, feed_id, &url)?;

        match refresh_feed(ctx.fetcher.as_ref(), &feed, ctx.store.as_ref(), &ctx.normalizer).await {
            Ok(count) => {
                if stored_feed(ctx, feed_id, &url)?.title.is_none() {
                    let update = FeedUpdate {
                        title: Some(title.clone()),
                        ..Default::default()
                    };
                    ctx.store.update_feed(feed_id, &update)?;
                }
                println!("  + {} ({} items)", title, count);
                added += 1;
            }
            Err(e) => {
                warn!("Import of {} failed: {}", url, e);
                eprintln!("  ! {} - {}", title, e);
                ctx.store.delete_feed(feed_id)?;
                errors += 1;
            }
        }
    }

    println!(
        "\nImport complete: {} added, {} skipped (already exist), {} errors",
        added, skipped, errors
    );

    Ok(())
}

/// `(title, xmlUrl)` of every outline that points at a feed. Outlines
/// without a title fall back to their `text` attribute.
fn parse_opml(content: &str) -> Vec<(String, String)> {
    content
        .split("<outline")
        .skip(1)
        .filter_map(|element| {
            let element = element.split('>').next().unwrap_or(element);
            let url = extract_attr(element, "xmlUrl")?;
            let title = extract_attr(element, "title")
                .or_else(|| extract_attr(element, "text"))
                .unwrap_or_else(|| url.clone());
            Some((title, url))
        })
        .collect()
}

/// Value of `attr="..."` in an XML element string, entities decoded.
/// The name must be preceded by whitespace.
fn extract_attr(element: &str, attr: &str) -> Option<String> {
    let pattern = format!("{}=\"", attr);
    let start = element
        .match_indices(&pattern)
        .find(|(at, _)| {
            element[..*at]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace)
        })
        .map(|(at, _)| at + pattern.len())?;
    let rest = &element[start..];
    let end = rest.find('"')?;
    Some(html_escape::decode_html_entities(&rest[..end]).to_string())
}
