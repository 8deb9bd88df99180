use std::sync::Arc;

use tracing::{debug, info};

use crate::app::{Result, TidingsError};
use crate::domain::ItemWithFeed;
use crate::notify::builder::NotificationBuilder;
use crate::notify::config::NotificationConfig;
use crate::notify::notifier::Notifier;
use crate::notify::AGGREGATE_NOTIFICATION_ID;
use crate::store::Store;

/// When pending items are shown one by one and when they are bundled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundlePolicy {
    /// Bundle once this many items are pending
    pub threshold: usize,
    /// Never bundle; the tray groups notifications itself
    pub auto_grouping: bool,
}

impl Default for BundlePolicy {
    fn default() -> Self {
        Self {
            threshold: 4,
            auto_grouping: false,
        }
    }
}

impl From<&NotificationConfig> for BundlePolicy {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            threshold: config.bundle_threshold,
            auto_grouping: config.auto_grouping,
        }
    }
}

impl BundlePolicy {
    pub fn should_bundle(&self, count: usize) -> bool {
        !self.auto_grouping && count >= self.threshold
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Nothing,
    /// One notification per item id
    Individual(Vec<i64>),
    /// A single notification bundling these item ids
    Aggregate(Vec<i64>),
}

pub struct NotificationDispatcher<S: Store, N: Notifier + ?Sized> {
    store: Arc<S>,
    notifier: Arc<N>,
    builder: NotificationBuilder,
    policy: BundlePolicy,
}

impl<S: Store, N: Notifier + ?Sized> NotificationDispatcher<S, N> {
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: &NotificationConfig) -> Self {
        Self {
            store,
            notifier,
            builder: NotificationBuilder::new(config.clone()),
            policy: BundlePolicy::from(config),
        }
    }

    pub fn with_policy(mut self, policy: BundlePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn effective_policy(&self) -> BundlePolicy {
        BundlePolicy {
            auto_grouping: self.policy.auto_grouping || self.notifier.supports_auto_grouping(),
            ..self.policy
        }
    }

    /// Unread, not yet notified items of notify-enabled feeds.
    pub fn items_to_notify(&self) -> Result<Vec<ItemWithFeed>> {
        let feed_ids = self.store.feed_ids_to_notify()?;
        if feed_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.items_to_notify(&feed_ids)
    }

    pub fn notify_pending(&self) -> Result<DispatchOutcome> {
        let items = self.items_to_notify()?;
        self.dispatch(&items)
    }

    /// Show `items`, individually or bundled, and withdraw whichever
    /// presentation is not used so no item is shown twice.
    pub fn dispatch(&self, items: &[ItemWithFeed]) -> Result<DispatchOutcome> {
        if items.is_empty() {
            self.notifier.cancel(AGGREGATE_NOTIFICATION_ID)?;
            debug!("No items to notify");
            return Ok(DispatchOutcome::Nothing);
        }

        let ids: Vec<i64> = items.iter().map(|i| i.id()).collect();

        if !self.effective_policy().should_bundle(items.len()) {
            self.notifier.cancel(AGGREGATE_NOTIFICATION_ID)?;
            for item in items {
                self.notifier.notify(item.id(), &self.builder.single(item))?;
            }
            info!("Posted {} item notifications", ids.len());
            Ok(DispatchOutcome::Individual(ids))
        } else {
            for id in &ids {
                self.notifier.cancel(*id)?;
            }
            self.notifier
                .notify(AGGREGATE_NOTIFICATION_ID, &self.builder.inbox(items))?;
            info!("Posted bundled notification for {} items", ids.len());
            Ok(DispatchOutcome::Aggregate(ids))
        }
    }

    /// Withdraw the notification of one item. Without auto-grouping the
    /// bundle may contain the item, so it is rebuilt from what is pending.
    pub fn cancel_notification(&self, item_id: i64) -> Result<()> {
        self.notifier.cancel(item_id)?;
        if !self.effective_policy().auto_grouping {
            self.notify_pending()?;
        }
        Ok(())
    }

    /// Delete a feed and withdraw the notifications of its items. The
    /// bundle is rebuilt from what is still pending, or cancelled.
    pub fn remove_feed(&self, feed_id: i64) -> Result<()> {
        let item_ids: Vec<i64> = self
            .store
            .get_items_by_feed(feed_id)?
            .iter()
            .map(|item| item.id)
            .collect();

        self.store.delete_feed(feed_id)?;

        for id in &item_ids {
            self.notifier.cancel(*id)?;
        }
        debug!("Withdrew notifications of {} removed items", item_ids.len());

        if self.effective_policy().auto_grouping {
            return Ok(());
        }
        self.notify_pending()?;
        Ok(())
    }
}

impl<S, N> NotificationDispatcher<S, N>
where
    S: Store + Send + Sync + 'static,
    N: Notifier + ?Sized + 'static,
{
    /// Run [`notify_pending`](Self::notify_pending) on the blocking pool.
    pub async fn notify_pending_in_background(self: Arc<Self>) -> Result<DispatchOutcome> {
        tokio::task::spawn_blocking(move || self.notify_pending())
            .await
            .map_err(|e| TidingsError::Other(format!("Notification task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Feed, Item};
    use crate::notify::intent::{FeedTarget, Intent};
    use crate::notify::notifier::MemoryNotifier;
    use crate::store::SqliteStore;

    struct Fixture {
        store: Arc<SqliteStore>,
        tray: Arc<MemoryNotifier>,
        dispatcher: NotificationDispatcher<SqliteStore, MemoryNotifier>,
    }

    fn fixture_with(tray: MemoryNotifier, config: NotificationConfig) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let tray = Arc::new(tray);
        let dispatcher = NotificationDispatcher::new(store.clone(), tray.clone(), &config);
        Fixture {
            store,
            tray,
            dispatcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MemoryNotifier::new(), NotificationConfig::default())
    }

    fn add_feed(store: &SqliteStore, url: &str, notify: bool) -> i64 {
        store
            .add_feed(&Feed::new(url.into()).with_notify(notify))
            .unwrap()
    }

    fn add_items(store: &SqliteStore, feed_id: i64, url: &str, count: usize) -> Vec<i64> {
        (0..count)
            .map(|i| {
                let mut item = Item::new(feed_id, url, &format!("entry-{}", i));
                item.title = Some(format!("Post {}", i));
                store.add_item(&item).unwrap().unwrap()
            })
            .collect()
    }

    fn add_items_from(store: &SqliteStore, feed_id: i64, start: usize, count: usize) -> Vec<i64> {
        (start..start + count)
            .map(|i| {
                let item = Item::new(feed_id, "https://a.example/feed", &format!("entry-{}", i));
                store.add_item(&item).unwrap().unwrap()
            })
            .collect()
    }

    impl Fixture {
        fn with_threshold(self, threshold: usize) -> Self {
            Fixture {
                dispatcher: self.dispatcher.with_policy(BundlePolicy {
                    threshold,
                    auto_grouping: false,
                }),
                ..self
            }
        }
    }

    fn sorted(mut ids: Vec<i64>) -> Vec<i64> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_policy_threshold() {
        let policy = BundlePolicy::default();
        assert!(!policy.should_bundle(3));
        assert!(policy.should_bundle(4));

        let grouped = BundlePolicy {
            auto_grouping: true,
            ..policy
        };
        assert!(!grouped.should_bundle(100));
    }

    #[test]
    fn test_empty_cancels_aggregate() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 5);
        f.dispatcher.notify_pending().unwrap();
        assert_eq!(f.tray.ids().unwrap(), vec![AGGREGATE_NOTIFICATION_ID]);

        f.store.mark_as_notified(&ids).unwrap();
        let outcome = f.dispatcher.notify_pending().unwrap();

        assert_eq!(outcome, DispatchOutcome::Nothing);
        assert!(f.tray.ids().unwrap().is_empty());
    }

    #[test]
    fn test_no_notify_feeds_means_nothing() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", false);
        add_items(&f.store, feed, "https://a.example/feed", 2);

        assert!(f.dispatcher.items_to_notify().unwrap().is_empty());
        assert_eq!(f.dispatcher.notify_pending().unwrap(), DispatchOutcome::Nothing);
    }

    #[test]
    fn test_below_threshold_posts_each_item() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 3);

        let outcome = f.dispatcher.notify_pending().unwrap();

        match outcome {
            DispatchOutcome::Individual(posted) => assert_eq!(sorted(posted), ids),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(f.tray.ids().unwrap(), ids);
        for id in &ids {
            let n = f.tray.get(*id).unwrap().unwrap();
            assert_eq!(n.content_intent, Intent::reader(*id));
        }
    }

    #[test]
    fn test_threshold_bundles_and_cancels_individuals() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 3);
        f.dispatcher.notify_pending().unwrap();
        assert_eq!(f.tray.ids().unwrap(), ids);

        let mut all = ids.clone();
        all.extend(add_items_from(&f.store, feed, 3, 1));
        let outcome = f.dispatcher.notify_pending().unwrap();

        match outcome {
            DispatchOutcome::Aggregate(bundled) => assert_eq!(sorted(bundled), all),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(f.tray.ids().unwrap(), vec![AGGREGATE_NOTIFICATION_ID]);
        let aggregate = f.tray.get(AGGREGATE_NOTIFICATION_ID).unwrap().unwrap();
        assert_eq!(aggregate.number, 4);
    }

    #[test]
    fn test_unbundling_cancels_aggregate() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 5);
        f.dispatcher.notify_pending().unwrap();

        f.store.set_read(ids[0], true).unwrap();
        f.store.set_read(ids[1], true).unwrap();
        let outcome = f.dispatcher.notify_pending().unwrap();

        assert!(matches!(outcome, DispatchOutcome::Individual(_)));
        assert_eq!(f.tray.ids().unwrap(), ids[2..].to_vec());
    }

    #[test]
    fn test_auto_grouping_tray_never_bundles() {
        let f = fixture_with(
            MemoryNotifier::with_auto_grouping(true),
            NotificationConfig::default(),
        );
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 6);

        let outcome = f.dispatcher.notify_pending().unwrap();

        assert!(matches!(outcome, DispatchOutcome::Individual(_)));
        assert_eq!(f.tray.ids().unwrap(), ids);
    }

    #[test]
    fn test_auto_grouping_from_config() {
        let f = fixture_with(
            MemoryNotifier::new(),
            NotificationConfig {
                auto_grouping: true,
                ..Default::default()
            },
        );
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        add_items(&f.store, feed, "https://a.example/feed", 5);

        assert!(matches!(
            f.dispatcher.notify_pending().unwrap(),
            DispatchOutcome::Individual(_)
        ));
    }

    #[test]
    fn test_custom_threshold() {
        let f = fixture().with_threshold(2);
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        add_items(&f.store, feed, "https://a.example/feed", 2);

        assert!(matches!(
            f.dispatcher.notify_pending().unwrap(),
            DispatchOutcome::Aggregate(_)
        ));
    }

    #[test]
    fn test_aggregate_targets_single_feed() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 4);

        f.dispatcher.notify_pending().unwrap();

        let aggregate = f.tray.get(AGGREGATE_NOTIFICATION_ID).unwrap().unwrap();
        match aggregate.content_intent {
            Intent::Navigate(crate::notify::intent::DeepLink::Feed {
                target,
                mark_as_notified,
            }) => {
                assert_eq!(target, FeedTarget::Feed(feed));
                assert_eq!(sorted(mark_as_notified), ids);
            }
            other => panic!("unexpected intent: {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_targets_all_feeds_when_mixed() {
        let f = fixture();
        let a = add_feed(&f.store, "https://a.example/feed", true);
        let b = add_feed(&f.store, "https://b.example/feed", true);
        add_items(&f.store, a, "https://a.example/feed", 2);
        add_items(&f.store, b, "https://b.example/feed", 2);

        f.dispatcher.notify_pending().unwrap();

        let aggregate = f.tray.get(AGGREGATE_NOTIFICATION_ID).unwrap().unwrap();
        assert!(matches!(
            aggregate.content_intent,
            Intent::Navigate(crate::notify::intent::DeepLink::Feed {
                target: FeedTarget::AllFeeds,
                ..
            })
        ));
    }

    #[test]
    fn test_redispatch_does_not_duplicate() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 2);

        f.dispatcher.notify_pending().unwrap();
        f.dispatcher.notify_pending().unwrap();

        assert_eq!(f.tray.ids().unwrap(), ids);
    }

    #[test]
    fn test_cancel_notification_rebuilds_bundle() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 4);
        f.dispatcher.notify_pending().unwrap();

        f.store.mark_as_read_and_notified(ids[0]).unwrap();
        f.dispatcher.cancel_notification(ids[0]).unwrap();

        // Three left, below the threshold
        assert_eq!(f.tray.ids().unwrap(), ids[1..].to_vec());
    }

    #[test]
    fn test_cancel_notification_with_auto_grouping_only_cancels() {
        let f = fixture_with(
            MemoryNotifier::with_auto_grouping(true),
            NotificationConfig::default(),
        );
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 2);
        f.dispatcher.notify_pending().unwrap();

        // Still pending in the store, but not re-posted
        f.dispatcher.cancel_notification(ids[0]).unwrap();

        assert_eq!(f.tray.ids().unwrap(), vec![ids[1]]);
    }

    #[test]
    fn test_remove_feed_withdraws_its_notifications() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 2);
        f.dispatcher.notify_pending().unwrap();
        assert_eq!(f.tray.ids().unwrap(), ids);

        f.dispatcher.remove_feed(feed).unwrap();

        assert!(f.tray.ids().unwrap().is_empty());
        assert!(f.store.get_feed(feed).unwrap().is_none());
    }

    #[test]
    fn test_remove_feed_unbundles_remaining_items() {
        let f = fixture();
        let a = add_feed(&f.store, "https://a.example/feed", true);
        let b = add_feed(&f.store, "https://b.example/feed", true);
        add_items(&f.store, a, "https://a.example/feed", 3);
        let kept = add_items(&f.store, b, "https://b.example/feed", 2);
        f.dispatcher.notify_pending().unwrap();
        assert_eq!(f.tray.ids().unwrap(), vec![AGGREGATE_NOTIFICATION_ID]);

        f.dispatcher.remove_feed(a).unwrap();

        // Two left, below the threshold
        assert_eq!(f.tray.ids().unwrap(), kept);
    }

    #[test]
    fn test_remove_feed_with_auto_grouping_keeps_other_feeds() {
        let f = fixture_with(
            MemoryNotifier::with_auto_grouping(true),
            NotificationConfig::default(),
        );
        let a = add_feed(&f.store, "https://a.example/feed", true);
        let b = add_feed(&f.store, "https://b.example/feed", true);
        add_items(&f.store, a, "https://a.example/feed", 2);
        let kept = add_items(&f.store, b, "https://b.example/feed", 1);
        f.dispatcher.notify_pending().unwrap();

        f.dispatcher.remove_feed(a).unwrap();

        assert_eq!(f.tray.ids().unwrap(), kept);
    }

    #[tokio::test]
    async fn test_notify_pending_in_background() {
        let f = fixture();
        let feed = add_feed(&f.store, "https://a.example/feed", true);
        let ids = add_items(&f.store, feed, "https://a.example/feed", 1);

        let outcome = Arc::new(f.dispatcher)
            .notify_pending_in_background()
            .await
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Individual(ids.clone()));
        assert_eq!(f.tray.ids().unwrap(), ids);
    }
}
