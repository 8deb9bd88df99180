//! Actions carried by notifications, and their `tidings://` URI form.
//!
//! ```text
//! tidings://reader/42                      open item 42 in the reader
//! tidings://feed/7?notified=1%2C2          open feed 7, marking 1 and 2 notified
//! tidings://feed/all                       open the all-feeds view
//! tidings://items/42?link=https%3A%2F%2F.. open a link of item 42 externally
//! tidings://items/42                       mark item 42 as read
//! tidings://notified?ids=1%2C2             mark items 1 and 2 notified
//! ```
//!
//! The item id is always part of the URI, so intents of different items
//! never compare equal.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

use crate::app::{Result, TidingsError};

pub const SCHEME: &str = "tidings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedTarget {
    Feed(i64),
    AllFeeds,
}

/// An in-app view to navigate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeepLink {
    Reader {
        item_id: i64,
    },
    Feed {
        target: FeedTarget,
        /// Items to mark as notified when the view opens
        mark_as_notified: Vec<i64>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Navigate(DeepLink),
    /// Mark the item read; open `link` outside the app when present
    OpenInDefault { item_id: i64, link: Option<String> },
    MarkAsNotified { item_ids: Vec<i64> },
}

impl Intent {
    pub fn reader(item_id: i64) -> Self {
        Intent::Navigate(DeepLink::Reader { item_id })
    }

    pub fn feed(target: FeedTarget, mark_as_notified: Vec<i64>) -> Self {
        Intent::Navigate(DeepLink::Feed {
            target,
            mark_as_notified,
        })
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn split_ids(value: &str) -> Result<Vec<i64>> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(parse_id)
        .collect()
}

fn parse_id(s: &str) -> Result<i64> {
    s.parse::<i64>()
        .map_err(|_| TidingsError::InvalidIntent(format!("invalid id: {}", s)))
}

fn query(key: &str, value: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish()
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::Navigate(DeepLink::Reader { item_id }) => {
                write!(f, "{}://reader/{}", SCHEME, item_id)
            }
            Intent::Navigate(DeepLink::Feed {
                target,
                mark_as_notified,
            }) => {
                match target {
                    FeedTarget::Feed(id) => write!(f, "{}://feed/{}", SCHEME, id)?,
                    FeedTarget::AllFeeds => write!(f, "{}://feed/all", SCHEME)?,
                }
                if !mark_as_notified.is_empty() {
                    write!(f, "?{}", query("notified", &join_ids(mark_as_notified)))?;
                }
                Ok(())
            }
            Intent::OpenInDefault { item_id, link } => {
                write!(f, "{}://items/{}", SCHEME, item_id)?;
                if let Some(link) = link {
                    write!(f, "?{}", query("link", link))?;
                }
                Ok(())
            }
            Intent::MarkAsNotified { item_ids } => {
                write!(
                    f,
                    "{}://notified?{}",
                    SCHEME,
                    query("ids", &join_ids(item_ids))
                )
            }
        }
    }
}

impl FromStr for Intent {
    type Err = TidingsError;

    fn from_str(s: &str) -> Result<Self> {
        let url = Url::parse(s)?;
        if url.scheme() != SCHEME {
            return Err(TidingsError::InvalidIntent(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        let param = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };

        match (url.host_str(), segments.as_slice()) {
            (Some("reader"), [id]) => Ok(Intent::reader(parse_id(id)?)),
            (Some("feed"), [target]) => {
                let target = match *target {
                    "all" => FeedTarget::AllFeeds,
                    id => FeedTarget::Feed(parse_id(id)?),
                };
                let ids = match param("notified") {
                    Some(ids) => split_ids(&ids)?,
                    None => Vec::new(),
                };
                Ok(Intent::feed(target, ids))
            }
            (Some("items"), [id]) => Ok(Intent::OpenInDefault {
                item_id: parse_id(id)?,
                link: param("link"),
            }),
            (Some("notified"), []) => Ok(Intent::MarkAsNotified {
                item_ids: split_ids(&param("ids").unwrap_or_default())?,
            }),
            _ => Err(TidingsError::InvalidIntent(s.to_string())),
        }
    }
}
