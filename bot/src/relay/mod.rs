//! Relay module for announcing detections on Nostr.
//!
//! This module provides:
//! - Key handling and event signing
//! - A WebSocket transport that sends one event to one relay
//! - A fan-out publisher that sends one event to every relay at once
//!
//! ## Flow
//!
//! ```text
//! note text → NostrKeys::sign_text_note → SignedEvent → FanoutPublisher → N relays
//! ```

pub mod event;
pub mod publisher;
pub mod transport;
pub mod types;

pub use event::{NostrKeys, SignedEvent, DEFAULT_TAGS, KIND_TEXT_NOTE};
pub use publisher::FanoutPublisher;
pub use transport::{RelayTransport, WebSocketTransport};
pub use types::{PublishOutcome, PublishResult, PublishStatus, RelayAck};
