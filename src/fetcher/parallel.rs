use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::app::{Result, TidingsError};
use crate::domain::{Feed, FeedUpdate};
use crate::fetcher::{FetchResult, Fetcher};
use crate::normalizer::Normalizer;
use crate::store::Store;

pub const DEFAULT_WORKERS: usize = 10;

/// Outcome of refreshing one feed: the number of new items, or why it failed.
#[derive(Debug)]
pub struct RefreshReport {
    pub feed_id: i64,
    pub feed_title: String,
    pub result: Result<usize>,
}

pub struct ParallelFetcher {
    fetcher: Arc<dyn Fetcher>,
    semaphore: Arc<Semaphore>,
}

impl ParallelFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher>, workers: usize) -> Self {
        Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Refresh every feed, at most `workers` at a time. Reports come back in
    /// the order of `feeds`.
    pub async fn refresh_all<S: Store + Send + Sync + 'static>(
        &self,
        feeds: Vec<Feed>,
        store: Arc<S>,
        normalizer: &Normalizer,
    ) -> Vec<RefreshReport> {
        let mut handles = Vec::with_capacity(feeds.len());

        for feed in feeds {
            let fetcher = self.fetcher.clone();
            let semaphore = self.semaphore.clone();
            let store = store.clone();
            let normalizer = normalizer.clone();

            handles.push(tokio::spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        refresh_feed(fetcher.as_ref(), &feed, store.as_ref(), &normalizer).await
                    }
                    Err(e) => Err(TidingsError::Other(format!("Worker pool closed: {}", e))),
                };
                RefreshReport {
                    feed_id: feed.id,
                    feed_title: feed.display_title().to_string(),
                    result,
                }
            }));
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Refresh task failed: {}", e),
            }
        }

        reports
    }
}

/// Total new items and number of failed feeds.
pub fn summarize(reports: &[RefreshReport]) -> (usize, usize) {
    reports
        .iter()
        .fold((0, 0), |(new, errors), report| match &report.result {
            Ok(count) => (new + count, errors),
            Err(_) => (new, errors + 1),
        })
}

/// Fetch one feed, store its new items and its metadata. Returns how many
/// items were new.
pub async fn refresh_feed<S: Store + Sync>(
    fetcher: &dyn Fetcher,
    feed: &Feed,
    store: &S,
    normalizer: &Normalizer,
) -> Result<usize> {
    let result = fetcher
        .fetch(
            &feed.url,
            feed.etag.as_deref(),
            feed.last_modified.as_deref(),
        )
        .await?;

    match result {
        FetchResult::NotModified => {
            debug!("Feed {} not modified", feed.url);
            store.update_feed(
                feed.id,
                &FeedUpdate {
                    last_fetched_at: Some(Utc::now()),
                    ..Default::default()
                },
            )?;
            Ok(0)
        }
        FetchResult::Content {
            body,
            etag,
            last_modified,
        } => {
            let (meta, items) = normalizer.normalize(feed.id, &feed.url, &body)?;

            let update = FeedUpdate {
                title: meta.title,
                description: meta.description,
                etag,
                last_modified,
                last_fetched_at: Some(Utc::now()),
                ..Default::default()
            };
            store.update_feed(feed.id, &update)?;

            let new_count = store.add_items(&items)?;
            info!("Added {} new items from {}", new_count, feed.url);

            Ok(new_count)
        }
    }
}
