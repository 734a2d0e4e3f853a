//! Feed item type and the collaborator traits around it.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedError;

/// One post from the upstream feed. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub body: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl FeedItem {
    /// Text scanned for links besides the title: the body, then the link URL.
    pub fn scan_text(&self) -> String {
        [self.body.as_deref(), self.url.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Source of recent feed items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Primary query.
    async fn fetch_recent_items(&self, limit: usize) -> Result<Vec<FeedItem>, FeedError>;

    /// Simpler query tried once when the primary query fails.
    async fn fetch_recent_items_fallback(&self, limit: usize) -> Result<Vec<FeedItem>, FeedError>;
}

/// Where replies to feed items are posted.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Post `text` as a reply to `item_id`. Returns whether a reply was created;
    /// a sink without credentials returns `false`.
    async fn post_reply(&self, item_id: &str, text: &str) -> bool;
}

/// Keep items created strictly after `now - window`, preserving order.
///
/// A window reaching before the earliest representable time keeps everything.
pub fn filter_recent(items: Vec<FeedItem>, now: DateTime<Utc>, window: Duration) -> Vec<FeedItem> {
    match now.checked_sub_signed(window) {
        Some(cutoff) => items.into_iter().filter(|item| item.created_at > cutoff).collect(),
        None => items,
    }
}
