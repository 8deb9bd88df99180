use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::app::{Result, TidingsError};
use crate::notify::model::{Notification, NotificationId};

/// The notification tray.
///
/// Posting under an id that is already shown replaces that notification,
/// so re-dispatching the same items never duplicates them.
pub trait Notifier: Send + Sync {
    fn notify(&self, id: NotificationId, notification: &Notification) -> Result<()>;

    /// Cancelling an id that is not shown is a no-op.
    fn cancel(&self, id: NotificationId) -> Result<()>;

    /// Shown notifications ordered by id.
    fn active(&self) -> Result<Vec<(NotificationId, Notification)>>;

    fn get(&self, id: NotificationId) -> Result<Option<Notification>> {
        Ok(self
            .active()?
            .into_iter()
            .find(|(active_id, _)| *active_id == id)
            .map(|(_, n)| n))
    }

    /// Whether the tray groups many notifications of one app by itself.
    fn supports_auto_grouping(&self) -> bool {
        false
    }
}

type Tray = BTreeMap<NotificationId, Notification>;

fn poisoned<T>(e: std::sync::PoisonError<T>) -> TidingsError {
    TidingsError::Other(format!("notification tray lock poisoned: {}", e))
}

/// In-process tray.
#[derive(Default)]
pub struct MemoryNotifier {
    tray: Mutex<Tray>,
    auto_grouping: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_grouping(auto_grouping: bool) -> Self {
        Self {
            tray: Mutex::new(Tray::new()),
            auto_grouping,
        }
    }

    fn tray(&self) -> Result<MutexGuard<'_, Tray>> {
        self.tray.lock().map_err(poisoned)
    }

    pub fn ids(&self) -> Result<Vec<NotificationId>> {
        Ok(self.tray()?.keys().copied().collect())
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, id: NotificationId, notification: &Notification) -> Result<()> {
        self.tray()?.insert(id, notification.clone());
        Ok(())
    }

    fn cancel(&self, id: NotificationId) -> Result<()> {
        self.tray()?.remove(&id);
        Ok(())
    }

    fn active(&self) -> Result<Vec<(NotificationId, Notification)>> {
        Ok(self
            .tray()?
            .iter()
            .map(|(id, n)| (*id, n.clone()))
            .collect())
    }

    fn get(&self, id: NotificationId) -> Result<Option<Notification>> {
        Ok(self.tray()?.get(&id).cloned())
    }

    fn supports_auto_grouping(&self) -> bool {
        self.auto_grouping
    }
}

/// Tray persisted as a JSON file, shared by every process that points at
/// the same path (the CLI and the daemon).
pub struct SpoolNotifier {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SpoolNotifier {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn load(&self) -> Result<Tray> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Tray::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Tray::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, tray: &Tray) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(tray)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F: FnOnce(&mut Tray)>(&self, f: F) -> Result<()> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        let mut tray = self.load()?;
        f(&mut tray);
        self.save(&tray)
    }
}

impl Notifier for SpoolNotifier {
    fn notify(&self, id: NotificationId, notification: &Notification) -> Result<()> {
        self.update(|tray| {
            tray.insert(id, notification.clone());
        })
    }

    fn cancel(&self, id: NotificationId) -> Result<()> {
        self.update(|tray| {
            tray.remove(&id);
        })
    }

    fn active(&self) -> Result<Vec<(NotificationId, Notification)>> {
        let _guard = self.lock.lock().map_err(poisoned)?;
        Ok(self.load()?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Item, ItemWithFeed};
    use crate::notify::builder::NotificationBuilder;

    fn notification(id: i64, title: &str) -> Notification {
        let mut item = Item::new(1, "https://example.com/feed.xml", &id.to_string());
        item.id = id;
        item.title = Some(title.into());
        NotificationBuilder::default().single(&ItemWithFeed {
            item,
            feed_display_title: "Blog".into(),
        })
    }

    #[test]
    fn test_memory_notify_replaces_same_id() {
        let tray = MemoryNotifier::new();
        tray.notify(1, &notification(1, "first")).unwrap();
        tray.notify(1, &notification(1, "second")).unwrap();

        let active = tray.active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].1.title, "second");
    }

    #[test]
    fn test_memory_cancel_missing_is_noop() {
        let tray = MemoryNotifier::new();
        tray.notify(1, &notification(1, "a")).unwrap();
        tray.cancel(2).unwrap();
        assert_eq!(tray.ids().unwrap(), vec![1]);
        tray.cancel(1).unwrap();
        assert!(tray.ids().unwrap().is_empty());
    }

    #[test]
    fn test_memory_auto_grouping_flag() {
        assert!(!MemoryNotifier::new().supports_auto_grouping());
        assert!(MemoryNotifier::with_auto_grouping(true).supports_auto_grouping());
    }

    #[test]
    fn test_spool_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tray").join("notifications.json");

        {
            let tray = SpoolNotifier::new(&path).unwrap();
            tray.notify(7, &notification(7, "seven")).unwrap();
            tray.notify(3, &notification(3, "three")).unwrap();
        }

        let tray = SpoolNotifier::new(&path).unwrap();
        let ids: Vec<i64> = tray.active().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(tray.get(7).unwrap().unwrap().title, "seven");

        tray.cancel(7).unwrap();
        assert!(tray.get(7).unwrap().is_none());
    }

    #[test]
    fn test_spool_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tray = SpoolNotifier::new(dir.path().join("notifications.json")).unwrap();
        assert!(tray.active().unwrap().is_empty());
    }

    #[test]
    fn test_spool_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notifications.json");
        fs::write(&path, "not json").unwrap();

        let tray = SpoolNotifier::new(&path).unwrap();
        assert!(matches!(tray.active(), Err(TidingsError::Json(_))));
    }
}
