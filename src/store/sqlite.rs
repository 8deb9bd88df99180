use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, TidingsError};
use crate::domain::{Feed, FeedUpdate, Item, ItemState, ItemWithFeed};
use crate::store::Store;

const FEED_COLUMNS: &str = "id, url, title, custom_title, description, notify, etag, \
     last_modified, last_fetched_at, created_at";

const ITEM_COLUMNS: &str = "i.id, i.feed_id, i.guid, i.title, i.link, i.enclosure_link, \
     i.content, i.summary, i.author, i.published_at, i.fetched_at";

const INSERT_ITEM: &str = "INSERT OR IGNORE INTO items
     (feed_id, guid, title, link, enclosure_link, content, summary, author, published_at, fetched_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations.to_latest(&mut conn)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            TidingsError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            custom_title: row.get(3)?,
            description: row.get(4)?,
            notify: row.get::<_, i32>(5)? != 0,
            etag: row.get(6)?,
            last_modified: row.get(7)?,
            last_fetched_at: row
                .get::<_, Option<String>>(8)?
                .and_then(|s| Self::parse_datetime(&s)),
            created_at: row
                .get::<_, String>(9)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            guid: row.get(2)?,
            title: row.get(3)?,
            link: row.get(4)?,
            enclosure_link: row.get(5)?,
            content: row.get(6)?,
            summary: row.get(7)?,
            author: row.get(8)?,
            published_at: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| Self::parse_datetime(&s)),
            fetched_at: row
                .get::<_, String>(10)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }

    fn query_feed(&self, clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM feeds WHERE {} = ?1", FEED_COLUMNS, clause);
        let feed = conn
            .query_row(&sql, [param], Self::feed_from_row)
            .optional()?;
        Ok(feed)
    }
}

impl Store for SqliteStore {
    fn add_feed(&self, feed: &Feed) -> Result<i64> {
        let conn = self.conn()?;

        conn.execute(
            "INSERT INTO feeds (url, title, custom_title, description, notify, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                feed.url,
                feed.title,
                feed.custom_title,
                feed.description,
                feed.notify as i32,
                feed.created_at.to_rfc3339()
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    fn get_feed(&self, id: i64) -> Result<Option<Feed>> {
        self.query_feed("id", &id)
    }

    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>> {
        self.query_feed("url", &url)
    }

    fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feeds ORDER BY COALESCE(custom_title, title), url",
            FEED_COLUMNS
        ))?;

        let feeds = stmt
            .query_map([], Self::feed_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn update_feed(&self, id: i64, update: &FeedUpdate) -> Result<()> {
        let conn = self.conn()?;

        let text_columns = [
            ("title", &update.title),
            ("custom_title", &update.custom_title),
            ("description", &update.description),
            ("etag", &update.etag),
            ("last_modified", &update.last_modified),
        ];
        for (column, value) in text_columns {
            if let Some(value) = value {
                conn.execute(
                    &format!("UPDATE feeds SET {} = ?1 WHERE id = ?2", column),
                    params![value, id],
                )?;
            }
        }
        if let Some(ref last_fetched_at) = update.last_fetched_at {
            conn.execute(
                "UPDATE feeds SET last_fetched_at = ?1 WHERE id = ?2",
                params![last_fetched_at.to_rfc3339(), id],
            )?;
        }

        Ok(())
    }

    fn delete_feed(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn set_feed_notify(&self, id: i64, notify: bool) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE feeds SET notify = ?1 WHERE id = ?2",
            params![notify as i32, id],
        )?;
        if changed == 0 {
            return Err(TidingsError::FeedNotFound(id.to_string()));
        }

        if notify {
            tx.execute(
                "INSERT INTO item_state (item_id, notified)
                 SELECT id, 1 FROM items WHERE feed_id = ?1
                 ON CONFLICT(item_id) DO UPDATE SET notified = 1",
                params![id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn add_item(&self, item: &Item) -> Result<Option<i64>> {
        let conn = self.conn()?;

        let inserted = conn.execute(
            INSERT_ITEM,
            params![
                item.feed_id,
                item.guid,
                item.title,
                item.link,
                item.enclosure_link,
                item.content,
                item.summary,
                item.author,
                item.published_at.map(|dt| dt.to_rfc3339()),
                item.fetched_at.to_rfc3339()
            ],
        )?;

        Ok((inserted > 0).then(|| conn.last_insert_rowid()))
    }

    fn add_items(&self, items: &[Item]) -> Result<usize> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        let mut count = 0;

        {
            let mut stmt = tx.prepare(INSERT_ITEM)?;
            for item in items {
                count += stmt.execute(params![
                    item.feed_id,
                    item.guid,
                    item.title,
                    item.link,
                    item.enclosure_link,
                    item.content,
                    item.summary,
                    item.author,
                    item.published_at.map(|dt| dt.to_rfc3339()),
                    item.fetched_at.to_rfc3339()
                ])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let conn = self.conn()?;

        let item = conn
            .query_row(
                &format!("SELECT {} FROM items i WHERE i.id = ?1", ITEM_COLUMNS),
                params![id],
                Self::item_from_row,
            )
            .optional()?;

        Ok(item)
    }

    fn get_items_by_feed(&self, feed_id: i64) -> Result<Vec<Item>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items i WHERE i.feed_id = ?1
             ORDER BY i.published_at DESC, i.fetched_at DESC",
            ITEM_COLUMNS
        ))?;

        let items = stmt
            .query_map(params![feed_id], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn get_all_items(&self) -> Result<Vec<Item>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items i ORDER BY i.published_at DESC, i.fetched_at DESC",
            ITEM_COLUMNS
        ))?;

        let items = stmt
            .query_map([], Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn get_item_state(&self, item_id: i64) -> Result<Option<ItemState>> {
        let conn = self.conn()?;

        let state = conn
            .query_row(
                "SELECT item_id, is_read, notified, read_at FROM item_state WHERE item_id = ?1",
                params![item_id],
                |row| {
                    Ok(ItemState {
                        item_id: row.get(0)?,
                        is_read: row.get::<_, i32>(1)? != 0,
                        notified: row.get::<_, i32>(2)? != 0,
                        read_at: row
                            .get::<_, Option<String>>(3)?
                            .and_then(|s| Self::parse_datetime(&s)),
                    })
                },
            )
            .optional()?;

        Ok(state)
    }

    fn set_read(&self, item_id: i64, is_read: bool) -> Result<()> {
        let conn = self.conn()?;

        let read_at = is_read.then(|| Utc::now().to_rfc3339());

        conn.execute(
            "INSERT INTO item_state (item_id, is_read, read_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(item_id) DO UPDATE SET is_read = ?2, read_at = ?3",
            params![item_id, is_read as i32, read_at],
        )?;

        Ok(())
    }

    fn get_unread_count(&self, feed_id: i64) -> Result<i64> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM items i
             LEFT JOIN item_state s ON i.id = s.item_id
             WHERE i.feed_id = ?1 AND (s.is_read IS NULL OR s.is_read = 0)",
            params![feed_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    fn feed_ids_to_notify(&self) -> Result<Vec<i64>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT id FROM feeds WHERE notify = 1 ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;

        Ok(ids)
    }

    fn items_to_notify(&self, feed_ids: &[i64]) -> Result<Vec<ItemWithFeed>> {
        if feed_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;

        let placeholders = vec!["?"; feed_ids.len()].join(", ");
        let sql = format!(
            "SELECT {}, COALESCE(NULLIF(TRIM(f.custom_title), ''), f.title, f.url)
             FROM items i
             JOIN feeds f ON f.id = i.feed_id
             LEFT JOIN item_state s ON s.item_id = i.id
             WHERE i.feed_id IN ({})
               AND COALESCE(s.is_read, 0) = 0
               AND COALESCE(s.notified, 0) = 0
             ORDER BY i.published_at DESC, i.id DESC",
            ITEM_COLUMNS, placeholders
        );

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(feed_ids.iter()), |row| {
                Ok(ItemWithFeed {
                    item: Self::item_from_row(row)?,
                    feed_display_title: row.get(11)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn mark_as_notified(&self, item_ids: &[i64]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        {
            // Ids of items that were deleted meanwhile are skipped.
            let mut stmt = tx.prepare(
                "INSERT INTO item_state (item_id, notified)
                 SELECT id, 1 FROM items WHERE id = ?1
                 ON CONFLICT(item_id) DO UPDATE SET notified = 1",
            )?;
            for id in item_ids {
                stmt.execute(params![id])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn mark_as_read_and_notified(&self, item_id: i64) -> Result<()> {
        let conn = self.conn()?;

        let changed = conn.execute(
            "INSERT INTO item_state (item_id, is_read, notified, read_at)
             SELECT id, 1, 1, ?2 FROM items WHERE id = ?1
             ON CONFLICT(item_id) DO UPDATE SET is_read = 1, notified = 1, read_at = ?2",
            params![item_id, Utc::now().to_rfc3339()],
        )?;

        if changed == 0 {
            return Err(TidingsError::ItemNotFound(item_id));
        }
        Ok(())
    }
}
