//! Configuration module for environment variable parsing.
//!
//! All configuration comes from the process environment. Credentials for the
//! signing key and the state store are required; everything else has a default.

use std::env;

use chrono::{TimeDelta, Utc};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;

/// Relays used when `NOSTR_RELAYS` is not set.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.snort.social",
    "wss://nostr.wine",
    "wss://relay.nostr.band",
];

pub const DEFAULT_FEED_URL: &str = "https://stacker.news/api/graphql";

pub const DEFAULT_MIRROR_HOST: &str = "yewtu.be";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Nostr secret key, `nsec1...` or hex
    pub nostr_secret: String,

    /// Optional expected public key, `npub1...` or hex
    pub nostr_public: Option<String>,

    /// GitHub token for the gist holding the processed set
    pub github_token: String,

    /// Gist id of the processed-set document; created when absent
    pub gist_id: Option<String>,

    /// Stacker News API token; replies are disabled without it
    pub stacker_news_token: Option<String>,

    /// Stacker News GraphQL endpoint
    pub feed_url: String,

    /// Relay endpoints the note is fanned out to
    pub relays: Vec<String>,

    /// Per-relay publish timeout in milliseconds
    pub relay_timeout_ms: u64,

    /// Items requested by the primary feed query
    pub feed_limit: usize,

    /// Items kept from the fallback feed query
    pub feed_fallback_limit: usize,

    /// Only items newer than this many minutes are processed
    pub feed_window_minutes: i64,

    /// `feed_window_minutes` as a span
    pub feed_window: TimeDelta,

    /// Mirror front-end links are rewritten to
    pub mirror_host: String,

    /// Flush on every insertion while the set holds at most this many ids
    pub flush_eager_threshold: usize,

    /// After the eager phase, flush every Nth insertion
    pub flush_interval: usize,

    /// Age cutoff for the startup prune, in days
    pub prune_after_days: Option<i64>,

    /// `prune_after_days` as a span
    pub prune_after: Option<TimeDelta>,

    /// Timeout for feed and store HTTP requests in milliseconds
    pub http_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let relays = match parse_csv("NOSTR_RELAYS") {
            Some(raw) => validate_relays(&raw)?,
            None => DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
        };

        let feed_window_minutes = parse_number("FEED_WINDOW_MINUTES", 30);
        let feed_window = time_span("FEED_WINDOW_MINUTES", feed_window_minutes, TimeDelta::try_minutes)?;

        let prune_after_days = optional("PRUNE_AFTER_DAYS").and_then(|raw| match raw.parse() {
            Ok(days) => Some(days),
            Err(_) => {
                warn!(env_var = "PRUNE_AFTER_DAYS", value = %raw, "Invalid number, pruning disabled");
                None
            }
        });
        let prune_after = prune_after_days
            .map(|days| time_span("PRUNE_AFTER_DAYS", days, TimeDelta::try_days))
            .transpose()?;

        Ok(Config {
            nostr_secret: required("NOSTR_NSEC")?,

            nostr_public: optional("NOSTR_NPUB"),

            github_token: required("GITHUB_TOKEN")?,

            gist_id: optional("GIST_ID"),

            stacker_news_token: optional("STACKER_NEWS_TOKEN"),

            feed_url: optional("STACKER_NEWS_API_URL")
                .unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),

            relays,

            relay_timeout_ms: parse_number("RELAY_TIMEOUT_MS", 10_000),

            feed_limit: parse_number("FEED_LIMIT", 50),

            feed_fallback_limit: parse_number("FEED_FALLBACK_LIMIT", 20),

            feed_window_minutes,

            feed_window,

            mirror_host: optional("MIRROR_HOST")
                .unwrap_or_else(|| DEFAULT_MIRROR_HOST.to_string()),

            flush_eager_threshold: parse_number("FLUSH_EAGER_THRESHOLD", 10),

            flush_interval: parse_number("FLUSH_INTERVAL", 10).max(1),

            prune_after_days,

            prune_after,

            http_timeout_ms: parse_number("HTTP_TIMEOUT_MS", 15_000),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Read a variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a numeric variable, falling back to `default` on absence or garbage.
fn parse_number<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// A positive span small enough to subtract from the current time.
fn time_span(
    name: &'static str,
    amount: i64,
    span: fn(i64) -> Option<TimeDelta>,
) -> Result<TimeDelta, ConfigError> {
    if amount <= 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: format!("{} must be positive", amount),
        });
    }

    span(amount)
        .filter(|delta| Utc::now().checked_sub_signed(*delta).is_some())
        .ok_or_else(|| ConfigError::Invalid {
            name,
            reason: format!("{} is out of range", amount),
        })
}

/// Keep only `ws`/`wss` URLs; an empty result is a configuration error.
fn validate_relays(raw: &[String]) -> Result<Vec<String>, ConfigError> {
    let relays: Vec<String> = raw
        .iter()
        .filter(|candidate| match Url::parse(candidate) {
            Ok(url) if matches!(url.scheme(), "ws" | "wss") => true,
            _ => {
                warn!(relay = %candidate, "Ignoring relay with invalid websocket URL");
                false
            }
        })
        .cloned()
        .collect();

    if relays.is_empty() {
        return Err(ConfigError::NoRelays);
    }
    Ok(relays)
}
