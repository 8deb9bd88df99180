use std::sync::Arc;

use tracing::{debug, info};

use crate::app::{Result, TidingsError};
use crate::domain::Item;
use crate::notify::dispatcher::NotificationDispatcher;
use crate::notify::intent::{DeepLink, FeedTarget, Intent};
use crate::notify::model::NotificationId;
use crate::notify::notifier::Notifier;
use crate::notify::AGGREGATE_NOTIFICATION_ID;
use crate::store::Store;

/// Opens links outside the app.
pub trait LinkOpener: Send + Sync {
    fn open(&self, link: &str) -> Result<()>;
}

/// Opens links with the desktop's default handler.
pub struct SystemOpener;

impl LinkOpener for SystemOpener {
    fn open(&self, link: &str) -> Result<()> {
        open::that(link)?;
        Ok(())
    }
}

/// What the front end should do after an intent was handled.
#[derive(Debug, Clone)]
pub enum ActionOutcome {
    MarkedNotified(Vec<i64>),
    Opened { item_id: i64, link: Option<String> },
    ShowItem(Box<Item>),
    ShowFeed(FeedTarget),
}

/// Carries out the intents attached to notifications.
pub struct ActionHandler<S: Store, N: Notifier + ?Sized> {
    dispatcher: Arc<NotificationDispatcher<S, N>>,
    opener: Arc<dyn LinkOpener>,
}

impl<S: Store, N: Notifier + ?Sized> ActionHandler<S, N> {
    pub fn new(dispatcher: Arc<NotificationDispatcher<S, N>>, opener: Arc<dyn LinkOpener>) -> Self {
        Self { dispatcher, opener }
    }

    pub fn handle(&self, intent: &Intent) -> Result<ActionOutcome> {
        let store = self.dispatcher.store();

        match intent {
            Intent::MarkAsNotified { item_ids } => {
                store.mark_as_notified(item_ids)?;
                debug!("Marked {} items as notified", item_ids.len());
                Ok(ActionOutcome::MarkedNotified(item_ids.clone()))
            }
            Intent::OpenInDefault { item_id, link } => {
                store.mark_as_read_and_notified(*item_id)?;
                self.dispatcher.cancel_notification(*item_id)?;
                if let Some(link) = link {
                    info!("Opening {}", link);
                    self.opener.open(link)?;
                }
                Ok(ActionOutcome::Opened {
                    item_id: *item_id,
                    link: link.clone(),
                })
            }
            Intent::Navigate(DeepLink::Reader { item_id }) => {
                let item = store
                    .get_item(*item_id)?
                    .ok_or(TidingsError::ItemNotFound(*item_id))?;
                store.mark_as_read_and_notified(*item_id)?;
                self.dispatcher.cancel_notification(*item_id)?;
                Ok(ActionOutcome::ShowItem(Box::new(item)))
            }
            Intent::Navigate(DeepLink::Feed {
                target,
                mark_as_notified,
            }) => {
                store.mark_as_notified(mark_as_notified)?;
                self.dispatcher
                    .notifier()
                    .cancel(AGGREGATE_NOTIFICATION_ID)?;
                Ok(ActionOutcome::ShowFeed(*target))
            }
        }
    }

    /// Activate a shown notification: its body when `action` is `None`,
    /// otherwise the action button at that index.
    pub fn activate(&self, id: NotificationId, action: Option<usize>) -> Result<ActionOutcome> {
        let notifier = self.dispatcher.notifier();
        let notification = notifier
            .get(id)?
            .ok_or(TidingsError::NotificationNotFound(id))?;

        let intent = match action {
            None => notification.content_intent.clone(),
            Some(index) => notification
                .action(index)
                .map(|a| a.intent.clone())
                .ok_or_else(|| {
                    TidingsError::InvalidIntent(format!(
                        "notification {} has no action {}",
                        id, index
                    ))
                })?,
        };

        if notification.auto_cancel {
            notifier.cancel(id)?;
        }
        self.handle(&intent)
    }

    /// Swipe a notification away, firing its delete intent.
    pub fn dismiss(&self, id: NotificationId) -> Result<ActionOutcome> {
        let notifier = self.dispatcher.notifier();
        let notification = notifier
            .get(id)?
            .ok_or(TidingsError::NotificationNotFound(id))?;

        notifier.cancel(id)?;
        self.handle(&notification.delete_intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::domain::Feed;
    use crate::notify::config::NotificationConfig;
    use crate::notify::notifier::MemoryNotifier;
    use crate::store::SqliteStore;

    #[derive(Default)]
    struct RecordingOpener {
        opened: Mutex<Vec<String>>,
    }

    impl LinkOpener for RecordingOpener {
        fn open(&self, link: &str) -> Result<()> {
            self.opened.lock().unwrap().push(link.to_string());
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<SqliteStore>,
        tray: Arc<MemoryNotifier>,
        opener: Arc<RecordingOpener>,
        handler: ActionHandler<SqliteStore, MemoryNotifier>,
        feed_id: i64,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let tray = Arc::new(MemoryNotifier::new());
        let opener = Arc::new(RecordingOpener::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            tray.clone(),
            &NotificationConfig::default(),
        ));
        let handler = ActionHandler::new(dispatcher, opener.clone());
        let feed_id = store
            .add_feed(&Feed::new("https://a.example/feed".into()).with_notify(true))
            .unwrap();
        Fixture {
            store,
            tray,
            opener,
            handler,
            feed_id,
        }
    }

    impl Fixture {
        fn add_items(&self, count: usize) -> Vec<i64> {
            (0..count)
                .map(|i| {
                    let mut item =
                        Item::new(self.feed_id, "https://a.example/feed", &format!("e{}", i));
                    item.title = Some(format!("Post {}", i));
                    item.link = Some(format!("https://a.example/post/{}", i));
                    self.store.add_item(&item).unwrap().unwrap()
                })
                .collect()
        }

        fn post_pending(&self) {
            self.handler.dispatcher.notify_pending().unwrap();
        }

        fn notified(&self, id: i64) -> bool {
            self.store
                .get_item_state(id)
                .unwrap()
                .map(|s| s.notified)
                .unwrap_or(false)
        }
    }

    #[test]
    fn test_dismiss_aggregate_marks_all_notified() {
        let f = fixture();
        let ids = f.add_items(5);
        f.post_pending();

        let outcome = f.handler.dismiss(AGGREGATE_NOTIFICATION_ID).unwrap();

        assert!(matches!(outcome, ActionOutcome::MarkedNotified(ref marked) if marked.len() == 5));
        assert!(ids.iter().all(|id| f.notified(*id)));
        assert!(f.tray.ids().unwrap().is_empty());

        f.post_pending();
        assert!(f.tray.ids().unwrap().is_empty());
    }

    #[test]
    fn test_dismiss_single_marks_only_that_item() {
        let f = fixture();
        let ids = f.add_items(2);
        f.post_pending();

        f.handler.dismiss(ids[0]).unwrap();

        assert!(f.notified(ids[0]));
        assert!(!f.notified(ids[1]));
        assert_eq!(f.tray.ids().unwrap(), vec![ids[1]]);
    }

    #[test]
    fn test_activate_body_opens_reader() {
        let f = fixture();
        let ids = f.add_items(1);
        f.post_pending();

        let outcome = f.handler.activate(ids[0], None).unwrap();

        match outcome {
            ActionOutcome::ShowItem(item) => assert_eq!(item.id, ids[0]),
            other => panic!("unexpected outcome: {:?}", other),
        }
        let state = f.store.get_item_state(ids[0]).unwrap().unwrap();
        assert!(state.is_read && state.notified);
        assert!(f.tray.ids().unwrap().is_empty());
    }

    #[test]
    fn test_activate_browser_action_opens_link() {
        let f = fixture();
        let ids = f.add_items(1);
        f.post_pending();

        // Actions: open in browser, mark as read
        f.handler.activate(ids[0], Some(0)).unwrap();

        assert_eq!(
            f.opener.opened.lock().unwrap().as_slice(),
            &["https://a.example/post/0".to_string()]
        );
        assert!(f.store.get_item_state(ids[0]).unwrap().unwrap().is_read);
    }

    #[test]
    fn test_mark_as_read_action_opens_nothing() {
        let f = fixture();
        let ids = f.add_items(1);
        f.post_pending();

        let outcome = f.handler.activate(ids[0], Some(1)).unwrap();

        assert!(matches!(outcome, ActionOutcome::Opened { link: None, .. }));
        assert!(f.opener.opened.lock().unwrap().is_empty());
    }

    #[test]
    fn test_activate_unknown_action() {
        let f = fixture();
        let ids = f.add_items(1);
        f.post_pending();

        assert!(matches!(
            f.handler.activate(ids[0], Some(9)),
            Err(TidingsError::InvalidIntent(_))
        ));
        // Still shown
        assert_eq!(f.tray.ids().unwrap(), ids);
    }

    #[test]
    fn test_activate_missing_notification() {
        let f = fixture();
        assert!(matches!(
            f.handler.activate(42, None),
            Err(TidingsError::NotificationNotFound(42))
        ));
    }

    #[test]
    fn test_activate_aggregate_shows_feed() {
        let f = fixture();
        let ids = f.add_items(4);
        f.post_pending();

        let outcome = f.handler.activate(AGGREGATE_NOTIFICATION_ID, None).unwrap();

        assert!(matches!(outcome, ActionOutcome::ShowFeed(FeedTarget::Feed(id)) if id == f.feed_id));
        assert!(ids.iter().all(|id| f.notified(*id)));
        assert!(f.tray.ids().unwrap().is_empty());
    }

    #[test]
    fn test_reading_one_bundled_item_unbundles_the_rest() {
        let f = fixture();
        let ids = f.add_items(4);
        f.post_pending();

        f.handler.handle(&Intent::reader(ids[0])).unwrap();

        assert_eq!(f.tray.ids().unwrap(), ids[1..].to_vec());
    }

    #[test]
    fn test_reader_for_missing_item() {
        let f = fixture();
        assert!(matches!(
            f.handler.handle(&Intent::reader(77)),
            Err(TidingsError::ItemNotFound(77))
        ));
    }
}
