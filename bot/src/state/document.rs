//! Persisted format of the processed set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Format version written into every document.
pub const DOCUMENT_VERSION: &str = "1.0.0";

/// The remote JSON document backing the processed set.
///
/// `processedPosts` is required; a document without it is treated as corrupt
/// rather than silently reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,

    /// Item ids in insertion order
    pub processed_posts: Vec<String>,

    /// When each id was marked, for age-based pruning
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub processed_at: BTreeMap<String, DateTime<Utc>>,

    #[serde(default)]
    pub stats: DocumentStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    #[serde(default)]
    pub total_processed: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl ProcessedDocument {
    /// A fresh document with no members.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            version: default_version(),
            created: Some(now),
            last_updated: None,
            processed_posts: Vec::new(),
            processed_at: BTreeMap::new(),
            stats: DocumentStats::default(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}
