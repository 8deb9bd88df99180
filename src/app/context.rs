use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, TidingsError};
use crate::config::Config;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::parallel::ParallelFetcher;
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::notify::{
    ActionHandler, MemoryNotifier, NotificationDispatcher, Notifier, SpoolNotifier, SystemOpener,
};
use crate::store::sqlite::SqliteStore;

pub type Dispatcher = NotificationDispatcher<SqliteStore, dyn Notifier>;
pub type Actions = ActionHandler<SqliteStore, dyn Notifier>;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub parallel_fetcher: ParallelFetcher,
    pub normalizer: Normalizer,
    pub dispatcher: Arc<Dispatcher>,
    pub actions: Actions,
}

impl AppContext {
    /// Open the database and notification spool, by default under the
    /// user's data directory.
    pub fn new(db_path: Option<PathBuf>, config: Config) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::data_dir()?.join("tidings.db"),
        };
        let spool_path = match db_path.parent() {
            Some(dir) => dir.join("notifications.json"),
            None => Self::data_dir()?.join("notifications.json"),
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let notifier: Arc<dyn Notifier> = Arc::new(SpoolNotifier::new(spool_path)?);
        Self::assemble(store, notifier, config)
    }

    /// Everything in memory; notifications land in a [`MemoryNotifier`].
    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let notifier: Arc<dyn Notifier> = Arc::new(MemoryNotifier::new());
        Self::assemble(store, notifier, config)
    }

    fn assemble(
        store: Arc<SqliteStore>,
        notifier: Arc<dyn Notifier>,
        config: Config,
    ) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new()?);
        let parallel_fetcher = ParallelFetcher::with_workers(fetcher.clone(), config.update.workers);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            store.clone(),
            notifier,
            &config.notifications,
        ));
        let actions = ActionHandler::new(dispatcher.clone(), Arc::new(SystemOpener));

        Ok(Self {
            config,
            store,
            fetcher,
            parallel_fetcher,
            normalizer: Normalizer::new(),
            dispatcher,
            actions,
        })
    }

    fn data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TidingsError::Config("Could not find data directory".into()))?;
        let tidings_dir = data_dir.join("tidings");
        std::fs::create_dir_all(&tidings_dir)?;
        Ok(tidings_dir)
    }
}
