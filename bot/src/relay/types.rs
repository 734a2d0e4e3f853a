//! Outcome types for relay publishing.

use serde::Serialize;

/// What a relay said about an event it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAck {
    /// The relay stored the event
    Accepted,
    /// The relay refused the event, with its reason
    Rejected(String),
}

/// Terminal state of one endpoint attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    Ok,
    Failed,
    Timeout,
    Error,
}

/// Result of publishing to a single endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub endpoint: String,
    pub status: PublishStatus,
    pub detail: Option<String>,
}

impl PublishOutcome {
    pub fn new(endpoint: impl Into<String>, status: PublishStatus, detail: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            status,
            detail,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == PublishStatus::Ok
    }
}

/// Aggregate of every endpoint attempt for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    pub outcomes: Vec<PublishOutcome>,
    /// True when at least one endpoint accepted the event
    pub succeeded: bool,
}

impl PublishResult {
    pub fn from_outcomes(outcomes: Vec<PublishOutcome>) -> Self {
        let succeeded = outcomes.iter().any(PublishOutcome::is_ok);
        Self { outcomes, succeeded }
    }

    pub fn accepted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }
}
