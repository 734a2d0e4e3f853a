//! Error types shared across the bot.
//!
//! Startup errors (`ConfigError`, `KeyError`, `StoreError::Corrupt`) are fatal.
//! Everything that can go wrong while handling a single feed item is logged
//! and absorbed by the pipeline instead.

use thiserror::Error;

/// Missing or invalid process environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("no usable relay endpoints configured")]
    NoRelays,
}

/// Failures talking to the upstream feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("feed returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("feed returned GraphQL errors: {0}")]
    GraphQl(String),

    #[error("feed response could not be decoded: {0}")]
    Decode(String),
}

/// Failures of the remote document store backing the processed set.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("processed-set document is malformed: {0}")]
    Corrupt(String),

    #[error("processed-set document has no location to write to")]
    MissingLocator,
}

/// Failures of a single relay attempt. Never escapes the fan-out publisher.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("unexpected relay frame: {0}")]
    Protocol(String),

    #[error("relay closed the connection before acknowledging")]
    Closed,
}

/// Malformed or mismatched signing keys.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key is not valid bech32 or hex: {0}")]
    Encoding(String),

    #[error("expected a {expected} key, got prefix {found}")]
    WrongPrefix { expected: &'static str, found: String },

    #[error("key bytes are not a valid secp256k1 key")]
    InvalidKey,

    #[error("secret key does not match the configured public key")]
    Mismatch,

    #[error("signing failed")]
    Signing,
}
