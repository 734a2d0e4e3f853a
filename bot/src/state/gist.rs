//! GitHub gist implementation of the document store.
//!
//! The locator is a gist id; the document lives in a single named file
//! inside the gist.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::store::DocumentStore;
use crate::error::StoreError;
use crate::util::{apply_headers, build_headers};

pub const GITHUB_API_URL: &str = "https://api.github.com";

/// File inside the gist that holds the processed-set document.
pub const STATE_FILE_NAME: &str = "yewtubot-processed-posts.json";

const GIST_DESCRIPTION: &str = "YewTuBot - Processed posts tracking";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct GistResponse {
    id: String,
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Debug, Deserialize)]
struct GistFile {
    content: Option<String>,
    #[serde(default)]
    truncated: bool,
    raw_url: Option<String>,
}

/// Where the file content can be found in a gist response.
#[derive(Debug, PartialEq)]
enum FileLookup {
    Missing,
    Inline(String),
    Raw(String),
}

fn locate_file(gist: GistResponse, file_name: &str) -> FileLookup {
    let Some(file) = gist.files.into_iter().find_map(|(name, f)| (name == file_name).then_some(f)) else {
        return FileLookup::Missing;
    };

    match (file.truncated, file.raw_url, file.content) {
        (true, Some(raw_url), _) => FileLookup::Raw(raw_url),
        (_, _, Some(content)) => FileLookup::Inline(content),
        (_, Some(raw_url), None) => FileLookup::Raw(raw_url),
        (_, None, None) => FileLookup::Missing,
    }
}

/// Document store backed by a private GitHub gist.
#[derive(Clone)]
pub struct GistStore {
    client: Client,
    api_url: String,
    file_name: String,
    headers: Vec<(String, String)>,
}

impl GistStore {
    pub fn new(client: Client, token: &str) -> Self {
        Self {
            client,
            api_url: GITHUB_API_URL.to_string(),
            file_name: STATE_FILE_NAME.to_string(),
            headers: build_headers(GITHUB_ACCEPT, Some(token)),
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status { status, body })
    }
}

#[async_trait]
impl DocumentStore for GistStore {
    async fn read(&self, locator: &str) -> Result<Option<String>, StoreError> {
        let url = format!("{}/gists/{}", self.api_url, locator);
        debug!(gist_id = locator, "gist_read_starting");

        let response = apply_headers(self.client.get(&url), &self.headers)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let gist: GistResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Corrupt(format!("gist response: {}", e)))?;

        match locate_file(gist, &self.file_name) {
            FileLookup::Missing => Ok(None),
            FileLookup::Inline(content) => Ok(Some(content)),
            FileLookup::Raw(raw_url) => {
                debug!(gist_id = locator, "gist_file_truncated_fetching_raw");
                let response = apply_headers(self.client.get(&raw_url), &self.headers)
                    .send()
                    .await?;
                Ok(Some(Self::check(response).await?.text().await?))
            }
        }
    }

    async fn write(&self, locator: &str, contents: &str) -> Result<(), StoreError> {
        let url = format!("{}/gists/{}", self.api_url, locator);
        let body = json!({ "files": { self.file_name.clone(): { "content": contents } } });

        let response = apply_headers(self.client.patch(&url), &self.headers)
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        debug!(gist_id = locator, bytes = contents.len(), "gist_write_complete");
        Ok(())
    }

    async fn create(&self, contents: &str) -> Result<String, StoreError> {
        let url = format!("{}/gists", self.api_url);
        let body = json!({
            "description": GIST_DESCRIPTION,
            "public": false,
            "files": { self.file_name.clone(): { "content": contents } },
        });

        let response = apply_headers(self.client.post(&url), &self.headers)
            .json(&body)
            .send()
            .await?;

        let gist: GistResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Corrupt(format!("gist response: {}", e)))?;

        info!(gist_id = %gist.id, "gist_created");
        Ok(gist.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> GistResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_locate_inline_file() {
        let gist = parse(
            r#"{"id":"g1","files":{"yewtubot-processed-posts.json":{"content":"{}","truncated":false,"raw_url":"https://raw"}}}"#,
        );
        assert_eq!(
            locate_file(gist, STATE_FILE_NAME),
            FileLookup::Inline("{}".to_string())
        );
    }

    #[test]
    fn test_locate_truncated_file_uses_raw_url() {
        let gist = parse(
            r#"{"id":"g1","files":{"yewtubot-processed-posts.json":{"content":"{\"partial","truncated":true,"raw_url":"https://raw/full"}}}"#,
        );
        assert_eq!(
            locate_file(gist, STATE_FILE_NAME),
            FileLookup::Raw("https://raw/full".to_string())
        );
    }

    #[test]
    fn test_locate_missing_file() {
        let gist = parse(r#"{"id":"g1","files":{"other.txt":{"content":"x"}}}"#);
        assert_eq!(locate_file(gist, STATE_FILE_NAME), FileLookup::Missing);
    }

    #[test]
    fn test_new_sets_bearer_header() {
        let store = GistStore::new(Client::new(), "tok");
        assert!(store
            .headers
            .iter()
            .any(|(k, v)| k == "Authorization" && v == "Bearer tok"));
    }
}
