//! YewTuBot - privacy mirror links for YouTube videos posted on Stacker News.
//!
//! One run of the `yewtubot` binary:
//! - Fetches recent Stacker News items
//! - Finds YouTube links in each new item
//! - Replies with mirror links and announces the reply on Nostr relays
//! - Records every handled item in a GitHub gist so it is never handled twice
//!
//! ## Architecture
//!
//! ```text
//! Stacker News → Pipeline → LinkExtractor → reply → FanoutPublisher → relays
//!                    ↕
//!            ProcessedSetStore ↔ gist
//! ```

pub mod compose;
pub mod config;
pub mod detect;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod relay;
pub mod state;
pub mod util;

// Re-export commonly used types
pub use config::Config;
pub use detect::{LinkExtractor, LinkRecord};
pub use error::{ConfigError, FeedError, KeyError, RelayError, StoreError};
pub use feed::{FeedItem, FeedSource, ReplySink, StackerNewsClient};
pub use pipeline::{ItemOutcome, ItemState, Pipeline, RunStats};
pub use relay::{FanoutPublisher, NostrKeys, PublishResult, SignedEvent, WebSocketTransport};
pub use state::{DocumentStore, FlushPolicy, GistStore, ProcessedSetStore};
