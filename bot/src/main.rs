//! YewTuBot - one scheduled run over the Stacker News feed.
//!
//! Startup problems (configuration, keys, a corrupt state document) and a
//! feed that cannot be read exit non-zero. Failures on individual items are
//! logged and the run still completes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use yewtubot::{
    Config, FanoutPublisher, FlushPolicy, GistStore, LinkExtractor, NostrKeys, Pipeline,
    ProcessedSetStore, StackerNewsClient, WebSocketTransport,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| {
            std::env::var("LOG_LEVEL")
                .ok()
                .and_then(|level| EnvFilter::try_new(level).ok())
        })
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "bot_starting");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        gist_id_set = config.gist_id.is_some(),
        replies_enabled = config.stacker_news_token.is_some(),
        relay_count = config.relays.len(),
        feed_limit = config.feed_limit,
        window_minutes = config.feed_window_minutes,
        mirror_host = %config.mirror_host,
        "config_loaded"
    );

    let keys = NostrKeys::from_secret(&config.nostr_secret).context("Invalid NOSTR_NSEC")?;
    if let Some(expected) = &config.nostr_public {
        keys.verify_public(expected)
            .context("NOSTR_NPUB does not match NOSTR_NSEC")?;
    }
    info!(pubkey = keys.public_key_hex(), "nostr_keys_loaded");

    let client = yewtubot::util::build_client(Duration::from_millis(config.http_timeout_ms))
        .context("Failed to build HTTP client")?;

    let gist = Arc::new(GistStore::new(client.clone(), &config.github_token));
    let policy = FlushPolicy {
        eager_threshold: config.flush_eager_threshold,
        interval: config.flush_interval,
    };
    let mut store = ProcessedSetStore::new(gist, config.gist_id.clone(), policy);
    store
        .initialize()
        .await
        .context("Failed to load processed posts")?;

    if let Some(span) = config.prune_after {
        let cutoff = Utc::now()
            .checked_sub_signed(span)
            .context("PRUNE_AFTER_DAYS is out of range")?;
        let removed = store.prune(cutoff);
        info!(removed = removed, days = span.num_days(), "startup_prune_complete");
    }

    let feed = Arc::new(StackerNewsClient::new(
        client,
        config.feed_url.clone(),
        config.stacker_news_token.clone(),
        config.feed_window,
        config.feed_fallback_limit,
    ));
    if !feed.replies_enabled() {
        warn!("stacker_news_token_missing_replies_disabled");
    }

    let publisher = FanoutPublisher::new(
        config.relays.clone(),
        Arc::new(WebSocketTransport::new()),
        Duration::from_millis(config.relay_timeout_ms),
    )?;

    let mut pipeline = Pipeline::new(
        LinkExtractor::new(config.mirror_host.clone()),
        store,
        feed.clone(),
        publisher,
        keys,
    );

    let stats = pipeline
        .run(&*feed, config.feed_limit)
        .await
        .context("Failed to fetch feed")?;

    info!(
        items_seen = stats.items_seen,
        items_skipped = stats.items_skipped,
        items_with_links = stats.items_with_links,
        links_detected = stats.links_detected,
        comments_posted = stats.comments_posted,
        publishes_succeeded = stats.publishes_succeeded,
        item_errors = stats.item_errors,
        processed_total = pipeline.store().len(),
        "run_summary"
    );

    Ok(())
}
