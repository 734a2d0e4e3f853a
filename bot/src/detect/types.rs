//! Type definitions for link detection.

use serde::{Deserialize, Serialize};

/// A single video reference found in free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// The matched text exactly as it appeared in the input
    pub original_text: String,
    /// Platform-assigned video identifier
    pub canonical_id: String,
    /// The matched link with an explicit `https://` scheme
    pub source_url: String,
}

impl LinkRecord {
    /// Create a record, normalizing the source URL from the matched text.
    pub fn new(original_text: String, canonical_id: String) -> Self {
        let source_url = normalize_url(&original_text);
        Self {
            original_text,
            canonical_id,
            source_url,
        }
    }
}

fn normalize_url(matched: &str) -> String {
    let lower = matched.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        matched.to_string()
    } else {
        format!("https://{}", matched)
    }
}
