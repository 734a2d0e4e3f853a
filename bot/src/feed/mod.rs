//! Feed module: reading recent items and replying to them.
//!
//! The pipeline only sees the [`FeedSource`] and [`ReplySink`] traits; the
//! Stacker News GraphQL client implements both.

pub mod client;
pub mod types;

pub use client::StackerNewsClient;
pub use types::{filter_recent, FeedItem, FeedSource, ReplySink};
