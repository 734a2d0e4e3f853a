//! Fan-out publisher for delivering one event to many relays.
//!
//! Every configured relay gets its own task. All tasks run at once, each
//! bounded by the same timeout, and the publish call returns only after
//! every task has produced a terminal outcome.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, warn};

use super::event::SignedEvent;
use super::transport::RelayTransport;
use super::types::{PublishOutcome, PublishResult, PublishStatus, RelayAck};
use crate::error::ConfigError;

/// Publishes events to a fixed set of relays with a quorum of one.
#[derive(Clone)]
pub struct FanoutPublisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    endpoints: Vec<String>,
    transport: Arc<dyn RelayTransport>,
    timeout: Duration,
}

impl FanoutPublisher {
    /// Create a publisher; at least one endpoint is required.
    pub fn new(
        endpoints: Vec<String>,
        transport: Arc<dyn RelayTransport>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::NoRelays);
        }

        Ok(Self {
            inner: Arc::new(PublisherInner {
                endpoints,
                transport,
                timeout,
            }),
        })
    }

    /// Send `event` to every endpoint concurrently and collect all outcomes.
    ///
    /// There is no retry and no early return; the result reports every
    /// endpoint in configuration order.
    pub async fn publish(&self, event: &SignedEvent) -> PublishResult {
        let event = Arc::new(event.clone());

        info!(
            event_id = %event.id,
            relay_count = self.inner.endpoints.len(),
            timeout_ms = self.inner.timeout.as_millis() as u64,
            "relay_publish_starting"
        );

        let handles: Vec<_> = self
            .inner
            .endpoints
            .iter()
            .map(|endpoint| {
                let endpoint = endpoint.clone();
                let transport = Arc::clone(&self.inner.transport);
                let event = Arc::clone(&event);
                let limit = self.inner.timeout;
                tokio::spawn(async move { attempt(transport, endpoint, event, limit).await })
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        let outcomes: Vec<PublishOutcome> = joined
            .into_iter()
            .zip(self.inner.endpoints.iter())
            .map(|(joined, endpoint)| match joined {
                Ok(outcome) => outcome,
                Err(e) => PublishOutcome::new(
                    endpoint.clone(),
                    PublishStatus::Error,
                    Some(format!("task failed: {}", e)),
                ),
            })
            .collect();

        let result = PublishResult::from_outcomes(outcomes);

        for outcome in result.outcomes.iter().filter(|o| !o.is_ok()) {
            warn!(
                relay = %outcome.endpoint,
                status = ?outcome.status,
                detail = outcome.detail.as_deref().unwrap_or(""),
                "relay_publish_outcome"
            );
        }

        if result.succeeded {
            info!(
                event_id = %event.id,
                accepted = result.accepted_count(),
                relay_count = result.outcomes.len(),
                "relay_publish_complete"
            );
        } else {
            error!(
                event_id = %event.id,
                relay_count = result.outcomes.len(),
                "relay_publish_failed_everywhere"
            );
        }

        result
    }
}

/// One bounded attempt against one relay, always resolving to an outcome.
async fn attempt(
    transport: Arc<dyn RelayTransport>,
    endpoint: String,
    event: Arc<SignedEvent>,
    limit: Duration,
) -> PublishOutcome {
    match timeout(limit, transport.send_with_ack(&endpoint, &event)).await {
        Ok(Ok(RelayAck::Accepted)) => PublishOutcome::new(endpoint, PublishStatus::Ok, None),
        Ok(Ok(RelayAck::Rejected(reason))) => {
            PublishOutcome::new(endpoint, PublishStatus::Failed, Some(reason))
        }
        Ok(Err(e)) => PublishOutcome::new(endpoint, PublishStatus::Error, Some(e.to_string())),
        Err(_) => PublishOutcome::new(
            endpoint,
            PublishStatus::Timeout,
            Some(format!("no acknowledgement within {}ms", limit.as_millis())),
        ),
    }
}
