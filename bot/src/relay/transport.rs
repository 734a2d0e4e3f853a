//! WebSocket transport for delivering one event to one relay.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use super::event::SignedEvent;
use super::types::RelayAck;
use crate::error::RelayError;

/// Sends a signed event to a relay and waits for its acknowledgement.
///
/// Implementations do not time out on their own; the caller bounds each
/// attempt.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn send_with_ack(&self, endpoint: &str, event: &SignedEvent) -> Result<RelayAck, RelayError>;
}

/// NIP-01 transport: one short-lived WebSocket connection per attempt.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RelayTransport for WebSocketTransport {
    async fn send_with_ack(&self, endpoint: &str, event: &SignedEvent) -> Result<RelayAck, RelayError> {
        let (mut ws, _) = connect_async(endpoint)
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))?;

        debug!(relay = endpoint, event_id = %event.id, "relay_connected");

        let frame = serde_json::json!(["EVENT", event]).to_string();
        ws.send(Message::text(frame))
            .await
            .map_err(|e| RelayError::Send(e.to_string()))?;

        let ack = loop {
            let Some(message) = ws.next().await else {
                break Err(RelayError::Closed);
            };

            match message.map_err(|e| RelayError::Protocol(e.to_string()))? {
                Message::Text(text) => {
                    if let Some(ack) = parse_relay_frame(text.as_str(), &event.id, endpoint) {
                        break Ok(ack);
                    }
                }
                Message::Close(_) => break Err(RelayError::Closed),
                _ => {}
            }
        };

        if let Err(e) = ws.close(None).await {
            debug!(relay = endpoint, error = %e, "relay_close_error");
        }

        ack
    }
}

/// Interpret a relay frame. Only an `OK` frame for our event id yields an ack.
fn parse_relay_frame(text: &str, event_id: &str, endpoint: &str) -> Option<RelayAck> {
    let frame: Vec<Value> = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(_) => {
            debug!(relay = endpoint, frame = text, "relay_frame_unparsable");
            return None;
        }
    };

    match frame.first().and_then(Value::as_str) {
        Some("OK") if frame.get(1).and_then(Value::as_str) == Some(event_id) => {
            let accepted = frame.get(2).and_then(Value::as_bool).unwrap_or(false);
            let message = frame
                .get(3)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            Some(if accepted {
                RelayAck::Accepted
            } else {
                RelayAck::Rejected(message)
            })
        }
        Some("NOTICE") => {
            let notice = frame.get(1).and_then(Value::as_str).unwrap_or_default();
            debug!(relay = endpoint, notice = notice, "relay_notice");
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_accepted() {
        let frame = r#"["OK","abc",true,""]"#;
        assert_eq!(parse_relay_frame(frame, "abc", "wss://r"), Some(RelayAck::Accepted));
    }

    #[test]
    fn test_parse_ok_rejected_with_reason() {
        let frame = r#"["OK","abc",false,"blocked: spam"]"#;
        assert_eq!(
            parse_relay_frame(frame, "abc", "wss://r"),
            Some(RelayAck::Rejected("blocked: spam".to_string()))
        );
    }

    #[test]
    fn test_parse_ok_for_other_event_is_ignored() {
        let frame = r#"["OK","other",true,""]"#;
        assert_eq!(parse_relay_frame(frame, "abc", "wss://r"), None);
    }

    #[test]
    fn test_parse_notice_and_garbage_are_ignored() {
        assert_eq!(parse_relay_frame(r#"["NOTICE","slow down"]"#, "abc", "wss://r"), None);
        assert_eq!(parse_relay_frame("not json", "abc", "wss://r"), None);
        assert_eq!(parse_relay_frame(r#"{"OK":true}"#, "abc", "wss://r"), None);
    }
}
