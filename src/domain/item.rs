use chrono::{DateTime, Utc};
use html_escape::decode_html_entities;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Store-assigned id, 0 until the item has been inserted
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub enclosure_link: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
}

impl Item {
    pub fn new(feed_id: i64, feed_url: &str, entry_id: &str) -> Self {
        Self {
            id: 0,
            feed_id,
            guid: Self::generate_guid(feed_url, entry_id),
            title: None,
            link: None,
            enclosure_link: None,
            content: None,
            summary: None,
            author: None,
            published_at: None,
            fetched_at: Utc::now(),
        }
    }

    /// Generate a deterministic guid from feed URL and entry ID
    pub fn generate_guid(feed_url: &str, entry_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(feed_url.as_bytes());
        hasher.update(entry_id.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }

    /// Title with markup removed, suitable for notification text.
    pub fn plain_title(&self) -> String {
        match self.title.as_deref() {
            Some(title) => plain_text(title),
            None => self.display_title().to_string(),
        }
    }

    pub fn display_content(&self) -> &str {
        self.content
            .as_deref()
            .or(self.summary.as_deref())
            .unwrap_or("")
    }
}

/// Strip tags, decode entities and collapse whitespace.
pub fn plain_text(html: &str) -> String {
    let mut stripped = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                stripped.push(' ');
            }
            _ if !in_tag => stripped.push(c),
            _ => {}
        }
    }

    decode_html_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// An item joined with the feed fields notifications need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemWithFeed {
    pub item: Item,
    pub feed_display_title: String,
}

impl ItemWithFeed {
    pub fn id(&self) -> i64 {
        self.item.id
    }

    pub fn feed_id(&self) -> i64 {
        self.item.feed_id
    }

    pub fn plain_title(&self) -> String {
        self.item.plain_title()
    }
}
