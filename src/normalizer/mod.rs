use chrono::Utc;
use feed_rs::model::{Entry, Link};
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{Result, TidingsError};
use crate::domain::Item;

#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Default)]
pub struct Normalizer;

fn is_enclosure(link: &Link) -> bool {
    link.rel.as_deref() == Some("enclosure")
}

/// First enclosure of an entry: an Atom `rel="enclosure"` link, else the
/// first media content with a URL (RSS `<enclosure>`, Media RSS).
fn enclosure_link(entry: &Entry) -> Option<String> {
    entry
        .links
        .iter()
        .find(|l| is_enclosure(l))
        .map(|l| l.href.clone())
        .or_else(|| {
            entry
                .media
                .iter()
                .flat_map(|m| m.content.iter())
                .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
        })
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(
        &self,
        feed_id: i64,
        feed_url: &str,
        body: &[u8],
    ) -> Result<(FeedMeta, Vec<Item>)> {
        let feed = parser::parse(body).map_err(|e| TidingsError::FeedParse(e.to_string()))?;

        let meta = FeedMeta {
            title: feed
                .title
                .map(|t| decode_html_entities(&t.content).to_string()),
            description: feed
                .description
                .map(|d| decode_html_entities(&d.content).to_string()),
        };

        let items = feed
            .entries
            .into_iter()
            .map(|entry| {
                let enclosure = enclosure_link(&entry);
                let link = entry
                    .links
                    .iter()
                    .find(|l| !is_enclosure(l))
                    .map(|l| l.href.clone());

                let entry_id = if entry.id.is_empty() {
                    link.clone().unwrap_or_default()
                } else {
                    entry.id.clone()
                };

                let mut item = Item::new(feed_id, feed_url, &entry_id);
                item.title = entry
                    .title
                    .map(|t| decode_html_entities(&t.content).to_string());
                item.link = link;
                item.enclosure_link = enclosure;
                item.content = entry
                    .content
                    .and_then(|c| c.body)
                    .map(|b| decode_html_entities(&b).to_string());
                item.summary = entry
                    .summary
                    .map(|s| decode_html_entities(&s.content).to_string());
                item.author = entry.authors.first().map(|a| a.name.clone());
                item.published_at = entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc));

                item
            })
            .collect();

        Ok((meta, items))
    }
}
