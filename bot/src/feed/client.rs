//! Stacker News GraphQL client.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{de, Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::types::{filter_recent, FeedItem, FeedSource, ReplySink};
use crate::error::FeedError;
use crate::util::{apply_headers, build_headers};

const RECENT_ITEMS_QUERY: &str = r#"
query RecentPosts($sort: String!, $when: String!, $limit: Int!) {
  items(sort: $sort, when: $when, limit: $limit) {
    items {
      id
      title
      text
      url
      createdAt
      user { name }
      sub { name }
    }
  }
}
"#;

const RECENT_ITEMS_SIMPLE_QUERY: &str = r#"
query {
  items(sort: "recent") {
    items {
      id
      title
      text
      url
      createdAt
      user { name }
    }
  }
}
"#;

const CREATE_COMMENT_MUTATION: &str = r#"
mutation CreateComment($text: String!, $parentId: ID!) {
  upsertComment(text: $text, parentId: $parentId) {
    id
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(deserialize_with = "id_as_string")]
    id: String,
    title: Option<String>,
    text: Option<String>,
    url: Option<String>,
    created_at: DateTime<Utc>,
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    name: Option<String>,
}

impl From<RawItem> for FeedItem {
    fn from(raw: RawItem) -> Self {
        FeedItem {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            body: raw.text,
            url: raw.url,
            author: raw.user.and_then(|u| u.name),
            created_at: raw.created_at,
        }
    }
}

/// GraphQL `ID`s arrive as strings but older deployments send numbers.
fn id_as_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!("unexpected item id: {}", other))),
    }
}

/// Extract `items.items` from a GraphQL `data` payload.
fn parse_items(data: Value) -> Result<Vec<FeedItem>, FeedError> {
    let items = data
        .get("items")
        .and_then(|v| v.get("items"))
        .cloned()
        .unwrap_or(Value::Array(Vec::new()));

    let raw: Vec<RawItem> =
        serde_json::from_value(items).map_err(|e| FeedError::Decode(e.to_string()))?;
    Ok(raw.into_iter().map(FeedItem::from).collect())
}

/// Client for reading the Stacker News feed and posting comments.
#[derive(Clone)]
pub struct StackerNewsClient {
    client: Client,
    api_url: String,
    token: Option<String>,
    window: Duration,
    fallback_limit: usize,
}

impl StackerNewsClient {
    pub fn new(
        client: Client,
        api_url: String,
        token: Option<String>,
        window: Duration,
        fallback_limit: usize,
    ) -> Self {
        Self {
            client,
            api_url,
            token,
            window,
            fallback_limit,
        }
    }

    /// Whether replies can be posted.
    pub fn replies_enabled(&self) -> bool {
        self.token.is_some()
    }

    async fn graphql_request(&self, query: &str, variables: Value) -> Result<Value, FeedError> {
        let headers = build_headers("application/json", self.token.as_deref());

        let response = apply_headers(self.client.post(&self.api_url), &headers)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "graphql_response_received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))?;

        if !payload.errors.is_empty() {
            return Err(FeedError::GraphQl(Value::Array(payload.errors).to_string()));
        }

        payload
            .data
            .ok_or_else(|| FeedError::Decode("response has no data".to_string()))
    }
}

#[async_trait]
impl FeedSource for StackerNewsClient {
    async fn fetch_recent_items(&self, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
        let data = self
            .graphql_request(
                RECENT_ITEMS_QUERY,
                json!({ "sort": "recent", "when": "day", "limit": limit }),
            )
            .await?;

        let items = parse_items(data)?;
        let fetched = items.len();
        let recent = filter_recent(items, Utc::now(), self.window);

        info!(
            fetched = fetched,
            recent = recent.len(),
            window_minutes = self.window.num_minutes(),
            "feed_items_fetched"
        );
        Ok(recent)
    }

    async fn fetch_recent_items_fallback(&self, limit: usize) -> Result<Vec<FeedItem>, FeedError> {
        let data = self
            .graphql_request(RECENT_ITEMS_SIMPLE_QUERY, json!({}))
            .await?;

        let items = parse_items(data)?;
        let fetched = items.len();
        let mut recent = filter_recent(items, Utc::now(), self.window);
        recent.truncate(limit.min(self.fallback_limit));

        info!(
            fetched = fetched,
            recent = recent.len(),
            "feed_items_fetched_fallback"
        );
        Ok(recent)
    }
}

#[async_trait]
impl ReplySink for StackerNewsClient {
    async fn post_reply(&self, item_id: &str, text: &str) -> bool {
        if self.token.is_none() {
            warn!(item_id = item_id, "reply_disabled_no_token");
            return false;
        }

        let variables = json!({ "text": text, "parentId": item_id });
        match self.graphql_request(CREATE_COMMENT_MUTATION, variables).await {
            Ok(data) => match data.get("upsertComment").and_then(|c| c.get("id")) {
                Some(comment_id) => {
                    info!(item_id = item_id, comment_id = %comment_id, "reply_posted");
                    true
                }
                None => {
                    warn!(item_id = item_id, "reply_returned_no_data");
                    false
                }
            },
            Err(e) => {
                error!(item_id = item_id, error = %e, "reply_failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items() {
        let data = json!({
            "items": {
                "items": [
                    {
                        "id": "123",
                        "title": "A video",
                        "text": "https://youtu.be/dQw4w9WgXcQ",
                        "url": null,
                        "createdAt": "2024-05-01T10:00:00.000Z",
                        "user": {"name": "alice"},
                        "sub": {"name": "bitcoin"}
                    },
                    {
                        "id": 124,
                        "title": null,
                        "text": null,
                        "url": "https://example.com",
                        "createdAt": "2024-05-01T10:05:00.000Z",
                        "user": null
                    }
                ]
            }
        });

        let items = parse_items(data).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "123");
        assert_eq!(items[0].author.as_deref(), Some("alice"));
        assert_eq!(items[1].id, "124");
        assert_eq!(items[1].title, "");
        assert_eq!(items[1].author, None);
    }

    #[test]
    fn test_parse_items_missing_is_empty() {
        assert!(parse_items(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_parse_items_bad_shape_is_decode_error() {
        let data = json!({"items": {"items": [{"id": true}]}});
        assert!(matches!(parse_items(data), Err(FeedError::Decode(_))));
    }

    #[test]
    fn test_graphql_error_payload() {
        let payload: GraphQlResponse =
            serde_json::from_str(r#"{"data":null,"errors":[{"message":"bad"}]}"#).unwrap();
        assert_eq!(payload.errors.len(), 1);
        assert!(payload.data.is_none());
    }

    #[tokio::test]
    async fn test_reply_without_token_is_disabled() {
        let client = StackerNewsClient::new(
            Client::new(),
            "http://127.0.0.1:9/graphql".to_string(),
            None,
            Duration::minutes(30),
            20,
        );
        assert!(!client.replies_enabled());
        assert!(!client.post_reply("1", "hello").await);
    }
}
