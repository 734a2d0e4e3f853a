//! Per-run item pipeline.
//!
//! Items are handled one at a time:
//!
//! ```text
//! skip if processed → extract → reply → sign + publish → mark processed
//! ```
//!
//! Every path that reaches extraction ends with the item marked processed,
//! so a failed reply or publish is never retried on a later run.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::compose::{item_url, note_text, reply_text};
use crate::detect::{LinkExtractor, LinkRecord};
use crate::error::FeedError;
use crate::feed::{FeedItem, FeedSource, ReplySink};
use crate::relay::{FanoutPublisher, NostrKeys};
use crate::state::ProcessedSetStore;

/// Terminal state of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Already in the processed set
    Skipped,
    /// No video links found
    NoLinks,
    /// The reply could not be posted; nothing was published
    ReplyFailed,
    /// Reply posted and at least one relay accepted the note
    Published,
    /// Reply posted but no relay accepted the note
    PublishFailed,
    /// The note could not be built or signed
    Error,
}

/// Result of processing one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub item_id: String,
    pub state: ItemState,
    pub links: usize,
    pub commented: bool,
    pub published: bool,
}

impl ItemOutcome {
    fn new(item_id: &str, state: ItemState, links: usize) -> Self {
        Self {
            item_id: item_id.to_string(),
            state,
            links,
            commented: false,
            published: false,
        }
    }
}

/// Counters for one run. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub items_seen: usize,
    pub items_skipped: usize,
    pub items_with_links: usize,
    pub links_detected: usize,
    pub comments_posted: usize,
    pub publishes_succeeded: usize,
    pub item_errors: usize,
}

impl RunStats {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        self.items_seen += 1;
        self.links_detected += outcome.links;

        if outcome.links > 0 {
            self.items_with_links += 1;
        }
        if outcome.commented {
            self.comments_posted += 1;
        }
        if outcome.published {
            self.publishes_succeeded += 1;
        }

        match outcome.state {
            ItemState::Skipped => self.items_skipped += 1,
            ItemState::Error => self.item_errors += 1,
            _ => {}
        }
    }
}

/// Fetch recent items, trying the fallback query once if the primary fails.
pub async fn fetch_with_fallback(feed: &dyn FeedSource, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
    match feed.fetch_recent_items(limit).await {
        Ok(items) => Ok(items),
        Err(primary) => {
            warn!(error = %primary, "feed_fetch_failed_trying_fallback");
            feed.fetch_recent_items_fallback(limit).await.map_err(|e| {
                error!(primary_error = %primary, error = %e, "feed_fallback_failed");
                e
            })
        }
    }
}

/// Drives items from the feed through detection, reply and publish.
pub struct Pipeline {
    extractor: LinkExtractor,
    store: ProcessedSetStore,
    replies: Arc<dyn ReplySink>,
    publisher: FanoutPublisher,
    keys: NostrKeys,
}

impl Pipeline {
    /// `store` must already be initialized.
    pub fn new(
        extractor: LinkExtractor,
        store: ProcessedSetStore,
        replies: Arc<dyn ReplySink>,
        publisher: FanoutPublisher,
        keys: NostrKeys,
    ) -> Self {
        Self {
            extractor,
            store,
            replies,
            publisher,
            keys,
        }
    }

    pub fn store(&self) -> &ProcessedSetStore {
        &self.store
    }

    /// One full run: fetch, process every item, then save state.
    ///
    /// The final save happens whether or not the fetch succeeded; its
    /// failure is logged and does not change the returned result.
    pub async fn run(&mut self, feed: &dyn FeedSource, limit: usize) -> Result<RunStats, FeedError> {
        info!(limit = limit, known_items = self.store.len(), "run_starting");

        let result = match fetch_with_fallback(feed, limit).await {
            Ok(items) => Ok(self.process_all(&items).await),
            Err(e) => Err(e),
        };

        // Already logged by the store.
        let _ = self.store.shutdown().await;

        result
    }

    /// Process items strictly in order.
    pub async fn process_all(&mut self, items: &[FeedItem]) -> RunStats {
        let mut stats = RunStats::default();
        for item in items {
            let outcome = self.process_item(item).await;
            stats.record(&outcome);
        }
        stats
    }

    pub async fn process_item(&mut self, item: &FeedItem) -> ItemOutcome {
        if self.store.contains(&item.id) {
            debug!(item_id = %item.id, "item_already_processed");
            return ItemOutcome::new(&item.id, ItemState::Skipped, 0);
        }

        info!(
            item_id = %item.id,
            author = item.author.as_deref().unwrap_or(""),
            title_length = item.title.len(),
            "item_processing"
        );

        let links = self.extractor.extract(&item.title, &item.scan_text());

        let outcome = if links.is_empty() {
            debug!(item_id = %item.id, "item_no_links");
            ItemOutcome::new(&item.id, ItemState::NoLinks, 0)
        } else {
            info!(item_id = %item.id, links = links.len(), "item_links_detected");
            self.act(item, &links).await
        };

        self.store.mark_processed(&item.id).await;

        info!(
            item_id = %item.id,
            state = ?outcome.state,
            commented = outcome.commented,
            published = outcome.published,
            "item_complete"
        );
        outcome
    }

    /// Reply, then announce. Failures end up in the outcome, never in a panic or error.
    async fn act(&self, item: &FeedItem, links: &[LinkRecord]) -> ItemOutcome {
        let mut outcome = ItemOutcome::new(&item.id, ItemState::ReplyFailed, links.len());

        let reply = reply_text(&self.extractor, links);
        if !self.replies.post_reply(&item.id, &reply).await {
            warn!(item_id = %item.id, "item_reply_not_posted");
            return outcome;
        }
        outcome.commented = true;

        let content = note_text(item, links.len());
        let tags = vec![vec!["r".to_string(), item_url(&item.id)]];
        let event = match self.keys.sign_text_note(&content, tags, Utc::now().timestamp()) {
            Ok(event) => event,
            Err(e) => {
                error!(item_id = %item.id, error = %e, "item_note_signing_failed");
                outcome.state = ItemState::Error;
                return outcome;
            }
        };

        let result = self.publisher.publish(&event).await;
        if result.succeeded {
            outcome.state = ItemState::Published;
            outcome.published = true;
        } else {
            outcome.state = ItemState::PublishFailed;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use crate::relay::{RelayAck, RelayTransport, SignedEvent};
    use crate::state::store::tests::MemoryStore;
    use crate::state::FlushPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    const SECRET_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    struct FakeFeed {
        items: Vec<FeedItem>,
        fail_primary: bool,
        fail_fallback: bool,
        fallback_calls: AtomicUsize,
    }

    impl FakeFeed {
        fn new(items: Vec<FeedItem>) -> Self {
            Self {
                items,
                fail_primary: false,
                fail_fallback: false,
                fallback_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FeedSource for FakeFeed {
        async fn fetch_recent_items(&self, _limit: usize) -> Result<Vec<FeedItem>, FeedError> {
            if self.fail_primary {
                return Err(FeedError::GraphQl("primary down".to_string()));
            }
            Ok(self.items.clone())
        }

        async fn fetch_recent_items_fallback(&self, _limit: usize) -> Result<Vec<FeedItem>, FeedError> {
            self.fallback_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_fallback {
                return Err(FeedError::GraphQl("fallback down".to_string()));
            }
            Ok(self.items.clone())
        }
    }

    #[derive(Default)]
    struct FakeReplies {
        fail: AtomicBool,
        posted: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ReplySink for FakeReplies {
        async fn post_reply(&self, item_id: &str, text: &str) -> bool {
            if self.fail.load(Ordering::SeqCst) {
                return false;
            }
            self.posted
                .lock()
                .unwrap()
                .push((item_id.to_string(), text.to_string()));
            true
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        reject: AtomicBool,
        sent: Mutex<Vec<SignedEvent>>,
    }

    #[async_trait]
    impl RelayTransport for FakeTransport {
        async fn send_with_ack(&self, _endpoint: &str, event: &SignedEvent) -> Result<RelayAck, RelayError> {
            self.sent.lock().unwrap().push(event.clone());
            if self.reject.load(Ordering::SeqCst) {
                return Err(RelayError::Connect("refused".to_string()));
            }
            Ok(RelayAck::Accepted)
        }
    }

    struct Harness {
        pipeline: Pipeline,
        backend: Arc<MemoryStore>,
        replies: Arc<FakeReplies>,
        transport: Arc<FakeTransport>,
    }

    async fn harness(backend: MemoryStore) -> Harness {
        let backend = Arc::new(backend);
        let mut store = ProcessedSetStore::new(backend.clone(), Some("gist".to_string()), FlushPolicy::default());
        store.initialize().await.unwrap();

        let replies = Arc::new(FakeReplies::default());
        let transport = Arc::new(FakeTransport::default());
        let publisher = FanoutPublisher::new(
            vec!["wss://a".to_string(), "wss://b".to_string()],
            transport.clone(),
            Duration::from_millis(500),
        )
        .unwrap();

        let pipeline = Pipeline::new(
            LinkExtractor::default(),
            store,
            replies.clone(),
            publisher,
            NostrKeys::from_secret(SECRET_HEX).unwrap(),
        );

        Harness {
            pipeline,
            backend,
            replies,
            transport,
        }
    }

    fn item(id: &str, title: &str, body: Option<&str>) -> FeedItem {
        FeedItem {
            id: id.to_string(),
            title: title.to_string(),
            body: body.map(str::to_string),
            url: None,
            author: Some("alice".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_item_without_links_is_marked_without_side_effects() {
        let mut h = harness(MemoryStore::default()).await;

        let outcome = h.pipeline.process_item(&item("1", "Hello", Some("no video"))).await;

        assert_eq!(outcome.state, ItemState::NoLinks);
        assert!(h.pipeline.store().contains("1"));
        assert!(h.replies.posted.lock().unwrap().is_empty());
        assert!(h.transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_item_with_link_replies_and_publishes() {
        let mut h = harness(MemoryStore::default()).await;

        let outcome = h
            .pipeline
            .process_item(&item("2", "Watch", Some("https://youtu.be/dQw4w9WgXcQ")))
            .await;

        assert_eq!(outcome.state, ItemState::Published);
        assert_eq!(outcome.links, 1);
        assert!(outcome.commented && outcome.published);

        let posted = h.replies.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].0, "2");
        assert!(posted[0].1.contains("https://yewtu.be/watch?v=dQw4w9WgXcQ"));

        let sent = h.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].id, sent[1].id);
        assert!(sent[0].content.contains("https://stacker.news/items/2/r/YewTuBot"));
        assert!(sent[0]
            .tags
            .contains(&vec!["r".to_string(), "https://stacker.news/items/2/r/YewTuBot".to_string()]));
        assert!(h.pipeline.store().contains("2"));
    }

    #[tokio::test]
    async fn test_failed_publish_still_marks_item() {
        let mut h = harness(MemoryStore::default()).await;
        h.transport.reject.store(true, Ordering::SeqCst);

        let outcome = h
            .pipeline
            .process_item(&item("3", "https://www.youtube.com/watch?v=dQw4w9WgXcQ", None))
            .await;

        assert_eq!(outcome.state, ItemState::PublishFailed);
        assert!(outcome.commented);
        assert!(!outcome.published);
        assert!(h.pipeline.store().contains("3"));
    }

    #[tokio::test]
    async fn test_failed_reply_skips_publish_and_marks_item() {
        let mut h = harness(MemoryStore::default()).await;
        h.replies.fail.store(true, Ordering::SeqCst);

        let outcome = h
            .pipeline
            .process_item(&item("4", "Watch", Some("youtu.be/dQw4w9WgXcQ")))
            .await;

        assert_eq!(outcome.state, ItemState::ReplyFailed);
        assert!(h.transport.sent.lock().unwrap().is_empty());
        assert!(h.pipeline.store().contains("4"));
    }

    #[tokio::test]
    async fn test_processed_item_is_skipped() {
        let mut h = harness(MemoryStore::with_doc("gist", r#"{"processedPosts":["5"]}"#)).await;

        let outcome = h
            .pipeline
            .process_item(&item("5", "Watch", Some("https://youtu.be/dQw4w9WgXcQ")))
            .await;

        assert_eq!(outcome.state, ItemState::Skipped);
        assert!(h.replies.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_collects_stats_and_saves_state() {
        let mut h = harness(MemoryStore::with_doc("gist", r#"{"processedPosts":["old"]}"#)).await;
        let feed = FakeFeed::new(vec![
            item("old", "Watch", Some("https://youtu.be/dQw4w9WgXcQ")),
            item("a", "Plain text", None),
            item(
                "b",
                "Two videos",
                Some("https://youtu.be/dQw4w9WgXcQ and https://youtube.com/shorts/abcdefghijk"),
            ),
        ]);

        let stats = h.pipeline.run(&feed, 50).await.unwrap();

        assert_eq!(
            stats,
            RunStats {
                items_seen: 3,
                items_skipped: 1,
                items_with_links: 1,
                links_detected: 2,
                comments_posted: 1,
                publishes_succeeded: 1,
                item_errors: 0,
            }
        );
        assert_eq!(feed.fallback_calls.load(Ordering::SeqCst), 0);

        let doc = h.backend.doc("gist").unwrap();
        assert_eq!(doc.processed_posts, vec!["old", "a", "b"]);
    }

    #[tokio::test]
    async fn test_run_succeeds_when_every_relay_fails() {
        let mut h = harness(MemoryStore::default()).await;
        h.transport.reject.store(true, Ordering::SeqCst);
        let feed = FakeFeed::new(vec![item("z", "Clip", Some("https://youtu.be/dQw4w9WgXcQ"))]);

        let stats = h.pipeline.run(&feed, 50).await.unwrap();

        assert_eq!(stats.comments_posted, 1);
        assert_eq!(stats.publishes_succeeded, 0);
        assert_eq!(stats.item_errors, 0);
        assert_eq!(h.transport.sent.lock().unwrap().len(), 2);
        assert_eq!(h.backend.doc("gist").unwrap().processed_posts, vec!["z"]);
    }

    #[tokio::test]
    async fn test_run_uses_fallback_once() {
        let mut h = harness(MemoryStore::default()).await;
        let mut feed = FakeFeed::new(vec![item("f", "Plain", None)]);
        feed.fail_primary = true;

        let stats = h.pipeline.run(&feed, 50).await.unwrap();

        assert_eq!(stats.items_seen, 1);
        assert_eq!(feed.fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_fails_when_both_queries_fail_but_still_saves() {
        let mut h = harness(MemoryStore::default()).await;
        let mut feed = FakeFeed::new(vec![]);
        feed.fail_primary = true;
        feed.fail_fallback = true;

        let writes_before = h.backend.writes.load(Ordering::SeqCst);
        let result = h.pipeline.run(&feed, 50).await;

        assert!(matches!(result, Err(FeedError::GraphQl(_))));
        assert_eq!(feed.fallback_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.writes.load(Ordering::SeqCst), writes_before + 1);
    }

    #[test]
    fn test_stats_record() {
        let mut stats = RunStats::default();
        stats.record(&ItemOutcome::new("x", ItemState::Skipped, 0));
        stats.record(&ItemOutcome::new("y", ItemState::Error, 3));

        assert_eq!(stats.items_seen, 2);
        assert_eq!(stats.items_skipped, 1);
        assert_eq!(stats.item_errors, 1);
        assert_eq!(stats.links_detected, 3);
        assert_eq!(stats.items_with_links, 1);
    }
}
