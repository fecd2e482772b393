//! Client for the hosted backend that owns every durable byte of this app:
//! the `storage` bucket and the `Profile` table.
//!
//! Handlers only see the [`ObjectStore`] and [`RowStore`] traits, so the
//! upload pipeline can run against an in-memory double in tests.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

mod rest;
mod storage;

#[cfg(test)]
pub mod memory;

/// Failure reported by the provider. `message` is shown to users verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ProviderError {
    pub status: Option<u16>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: String,
    /// When false the provider rejects the write if the path is taken.
    pub overwrite: bool,
    pub cache_control_secs: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ObjectEntry {
    pub name: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Vec<u8>, options: &PutOptions) -> ProviderResult<()>;

    /// Objects directly under `prefix` whose name contains `search`.
    async fn list(&self, prefix: &str, search: &str) -> ProviderResult<Vec<ObjectEntry>>;

    async fn remove(&self, paths: &[String]) -> ProviderResult<()>;
}

#[async_trait]
pub trait RowStore: Send + Sync {
    /// Insert `row`, or merge it into the row that shares its `on_conflict` column.
    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> ProviderResult<()>;

    async fn select_all(&self, table: &str) -> ProviderResult<Vec<Value>>;
}

/// One handle per process, built from [`crate::config::SupabaseConfig`].
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    bucket: String,
}

impl SupabaseClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        bucket: &str,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ProviderError::new(format!("invalid service URL {}: {}", base_url, e)))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_owned(),
            bucket: bucket.to_owned(),
        })
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> ProviderResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::new("service URL cannot carry a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    msg: Option<String>,
}

/// Pass successful responses through; turn the rest into a [`ProviderError`]
/// carrying the provider's own message when the body has one.
async fn check(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message.or(b.error).or(b.msg))
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_owned()))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_owned()
        });

    Err(ProviderError {
        status: Some(status.as_u16()),
        message,
    })
}
