//! Meilisearch settings API client

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use std::time::Duration;

use super::{AttributeKind, SearchIndex};
use crate::error::{Error, Result};

/// Attribute settings client for a Meilisearch instance.
///
/// Settings updates are asynchronous on the Meilisearch side: a 2xx response
/// means the task was enqueued, which is treated as success.
pub struct MeilisearchIndex {
    client: Client,
    url: String,
    base: Url,
    api_key: Option<String>,
}

impl MeilisearchIndex {
    pub fn new(url: &str, api_key: Option<&str>) -> Result<Self> {
        Self::with_timeout(url, api_key, None)
    }

    /// Create a client whose requests fail with `ExternalSync` after `timeout`
    pub fn with_timeout(url: &str, api_key: Option<&str>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        let url = url.trim_end_matches('/').to_string();
        let base = Url::parse(&url)
            .map_err(|e| Error::Config(format!("invalid Meilisearch URL '{}': {}", url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("invalid Meilisearch URL '{}'", url)));
        }

        Ok(Self {
            client,
            url,
            base,
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The index uid is percent-encoded as a single path segment
    fn settings_url(&self, index: &str, kind: AttributeKind) -> Result<Url> {
        let setting = format!("{}-attributes", kind.as_str());
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("invalid Meilisearch URL '{}'", self.url)))?
            .pop_if_empty()
            .extend(["indexes", index, "settings", setting.as_str()]);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn put_attributes(
        &self,
        index: &str,
        kind: AttributeKind,
        attributes: &[String],
    ) -> Result<()> {
        let url = self.settings_url(index, kind)?;
        tracing::debug!(index = %index, kind = %kind, attributes = ?attributes, "Updating index attributes");

        let response = self
            .authorize(self.client.put(url.clone()))
            .json(attributes)
            .send()
            .await
            .map_err(|e| Error::ExternalSync(format!("PUT {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExternalSync(format!(
                "Meilisearch {} attributes update for '{}' failed ({}): {}",
                kind, index, status, body
            )));
        }

        Ok(())
    }

    async fn get_attributes(&self, index: &str, kind: AttributeKind) -> Result<Vec<String>> {
        let url = self.settings_url(index, kind)?;

        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|e| Error::ExternalSync(format!("GET {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExternalSync(format!(
                "Meilisearch {} attributes read for '{}' failed ({}): {}",
                kind, index, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::ExternalSync(format!("invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl SearchIndex for MeilisearchIndex {
    fn name(&self) -> &'static str {
        "meilisearch"
    }

    async fn update_sortable_attributes(&self, index: &str, attributes: &[String]) -> Result<()> {
        self.put_attributes(index, AttributeKind::Sortable, attributes)
            .await
    }

    async fn update_filterable_attributes(
        &self,
        index: &str,
        attributes: &[String],
    ) -> Result<()> {
        self.put_attributes(index, AttributeKind::Filterable, attributes)
            .await
    }

    async fn sortable_attributes(&self, index: &str) -> Result<Vec<String>> {
        self.get_attributes(index, AttributeKind::Sortable).await
    }

    async fn filterable_attributes(&self, index: &str) -> Result<Vec<String>> {
        self.get_attributes(index, AttributeKind::Filterable).await
    }
}
