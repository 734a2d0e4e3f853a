//! Processed-set state module.
//!
//! This module provides:
//! - The JSON document format persisted remotely
//! - The `DocumentStore` seam and its GitHub gist implementation
//! - `ProcessedSetStore`, the in-memory mirror that gates side effects
//!
//! ## Lifecycle
//!
//! ```text
//! initialize (load or create) → contains / mark_processed (batched flush) → shutdown (final flush)
//! ```

pub mod document;
pub mod gist;
pub mod store;

pub use document::{DocumentStats, ProcessedDocument, DOCUMENT_VERSION};
pub use gist::{GistStore, STATE_FILE_NAME};
pub use store::{DocumentStore, FlushPolicy, ProcessedSetStore};
