//! Remote-backed set of processed item ids.
//!
//! The in-memory set is authoritative for the current run. Writes to the
//! remote document are batched; `shutdown` always writes.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use super::document::{DocumentStats, ProcessedDocument, DOCUMENT_VERSION};
use crate::error::StoreError;

/// Remote storage for a single JSON document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the document at `locator`; `Ok(None)` when it does not exist.
    async fn read(&self, locator: &str) -> Result<Option<String>, StoreError>;

    /// Replace the document at `locator`.
    async fn write(&self, locator: &str, contents: &str) -> Result<(), StoreError>;

    /// Create a new document and return its locator.
    async fn create(&self, contents: &str) -> Result<String, StoreError>;
}

/// When a `mark_processed` call writes through to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Flush on every insertion while the set holds at most this many ids
    pub eager_threshold: usize,
    /// Otherwise flush once this many insertions are unflushed
    pub interval: usize,
}

impl FlushPolicy {
    pub fn should_flush(&self, len: usize, unflushed: usize) -> bool {
        len <= self.eager_threshold || unflushed >= self.interval.max(1)
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            eager_threshold: 10,
            interval: 10,
        }
    }
}

/// The "already handled" gate, mirrored in memory and persisted remotely.
pub struct ProcessedSetStore {
    backend: Arc<dyn DocumentStore>,
    locator: Option<String>,
    policy: FlushPolicy,
    members: Vec<String>,
    index: HashSet<String>,
    processed_at: BTreeMap<String, DateTime<Utc>>,
    created: Option<DateTime<Utc>>,
    last_updated: Option<DateTime<Utc>>,
    unflushed: usize,
    /// Set when the initial load failed; the remote copy must be merged
    /// before it is overwritten.
    merge_before_write: bool,
}

impl ProcessedSetStore {
    /// Create an unloaded store. Call [`initialize`](Self::initialize) before use.
    pub fn new(backend: Arc<dyn DocumentStore>, locator: Option<String>, policy: FlushPolicy) -> Self {
        Self {
            backend,
            locator,
            policy,
            members: Vec::new(),
            index: HashSet::new(),
            processed_at: BTreeMap::new(),
            created: None,
            last_updated: None,
            unflushed: 0,
            merge_before_write: false,
        }
    }

    /// Load the remote document, creating it when absent.
    ///
    /// A malformed document is fatal. A failed read degrades to an empty set.
    /// Creating a brand-new document (no locator configured) must succeed.
    pub async fn initialize(&mut self) -> Result<(), StoreError> {
        info!(has_locator = self.locator.is_some(), "store_initializing");

        let Some(locator) = self.locator.clone() else {
            let doc = ProcessedDocument::empty(Utc::now());
            let locator = self.backend.create(&doc.to_json()?).await?;
            warn!(locator = %locator, "store_document_created_configure_gist_id");
            self.created = doc.created;
            self.locator = Some(locator);
            return Ok(());
        };

        match self.backend.read(&locator).await {
            Ok(Some(raw)) => {
                let doc = ProcessedDocument::parse(&raw).map_err(|e| {
                    error!(locator = %locator, error = %e, "store_document_corrupt");
                    e
                })?;
                self.absorb(doc);
                info!(members = self.members.len(), "store_initialized");
            }
            Ok(None) => {
                info!(locator = %locator, "store_document_missing_creating");
                let doc = ProcessedDocument::empty(Utc::now());
                self.created = doc.created;
                if let Err(e) = self.backend.write(&locator, &doc.to_json()?).await {
                    warn!(error = %e, "store_document_create_failed");
                }
            }
            Err(e) => {
                warn!(error = %e, "store_load_failed_starting_empty");
                self.merge_before_write = true;
            }
        }

        Ok(())
    }

    /// Membership check against the in-memory set.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Record `id` as processed. Re-marking is a no-op.
    ///
    /// The in-memory set reflects the insertion on return; the remote write
    /// follows the flush policy and its failure is logged, not returned.
    pub async fn mark_processed(&mut self, id: &str) {
        if !self.insert(id.to_string(), Utc::now()) {
            debug!(item_id = id, "store_already_processed");
            return;
        }

        self.unflushed += 1;
        debug!(item_id = id, members = self.members.len(), "store_marked_processed");

        if self.policy.should_flush(self.members.len(), self.unflushed) {
            if let Err(e) = self.flush().await {
                warn!(error = %e, unflushed = self.unflushed, "store_flush_failed");
            }
        }
    }

    /// Write the current set to the remote document.
    pub async fn flush(&mut self) -> Result<(), StoreError> {
        let locator = self.locator.clone().ok_or(StoreError::MissingLocator)?;

        if self.merge_before_write {
            match self.backend.read(&locator).await? {
                Some(raw) => {
                    let doc = ProcessedDocument::parse(&raw)?;
                    self.absorb(doc);
                    info!(members = self.members.len(), "store_merged_remote_before_write");
                }
                None => debug!("store_merge_found_no_document"),
            }
            self.merge_before_write = false;
        }

        let now = Utc::now();
        let version = self.next_version(now);
        let doc = ProcessedDocument {
            version: DOCUMENT_VERSION.to_string(),
            created: self.created,
            last_updated: Some(version),
            processed_posts: self.members.clone(),
            processed_at: self.processed_at.clone(),
            stats: DocumentStats {
                total_processed: self.members.len(),
                last_run: Some(now),
            },
        };

        self.backend.write(&locator, &doc.to_json()?).await?;

        self.last_updated = Some(version);
        self.unflushed = 0;
        debug!(members = self.members.len(), "store_flush_complete");
        Ok(())
    }

    /// Unconditional final flush. Call on every exit path after `initialize`.
    pub async fn shutdown(&mut self) -> Result<(), StoreError> {
        match self.flush().await {
            Ok(()) => {
                info!(members = self.members.len(), "store_final_state_saved");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, unflushed = self.unflushed, "store_final_save_failed");
                Err(e)
            }
        }
    }

    /// Drop ids marked before `cutoff`. Ids without a recorded time are kept.
    ///
    /// Maintenance only; never called while items are being processed.
    pub fn prune(&mut self, cutoff: DateTime<Utc>) -> usize {
        let stale: HashSet<String> = self
            .processed_at
            .iter()
            .filter(|(_, at)| **at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        if stale.is_empty() {
            return 0;
        }

        self.members.retain(|id| !stale.contains(id));
        for id in &stale {
            self.index.remove(id);
            self.processed_at.remove(id);
        }
        self.unflushed += stale.len();

        info!(removed = stale.len(), remaining = self.members.len(), "store_pruned");
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    fn insert(&mut self, id: String, at: DateTime<Utc>) -> bool {
        if !self.index.insert(id.clone()) {
            return false;
        }
        self.processed_at.insert(id.clone(), at);
        self.members.push(id);
        true
    }

    /// Union a loaded document into the in-memory set.
    fn absorb(&mut self, doc: ProcessedDocument) {
        for id in doc.processed_posts {
            if self.index.insert(id.clone()) {
                if let Some(at) = doc.processed_at.get(&id) {
                    self.processed_at.insert(id.clone(), *at);
                }
                self.members.push(id);
            }
        }
        self.created = self.created.or(doc.created);
        self.last_updated = match (self.last_updated, doc.last_updated) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }

    /// Strictly increasing `lastUpdated` even if the clock stalls or steps back.
    fn next_version(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_updated {
            Some(previous) if now <= previous => previous + Duration::milliseconds(1),
            _ => now,
        }
    }
}
