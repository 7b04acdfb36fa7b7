//! Rerank provider for the Cohere-style `rerank` endpoint (also spoken by Jina
//! and most self-hosted cross-encoder servers).
//!
//! Body: `{ model, query, documents: [..], top_n }`
//! Response: `{ results: [{ index, relevance_score }] }`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use ragdb_core::config::RerankSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::RerankProvider;
use ragdb_core::types::RerankScore;

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankRow>,
}

#[derive(Debug, Deserialize)]
struct RerankRow {
    index: usize,
    relevance_score: f32,
}

pub struct HttpRerankProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl HttpRerankProvider {
    pub fn new(settings: &RerankSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::RerankProvider("rerank API key is not configured".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::RerankProvider(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, api_key, model: settings.model.clone(), base_url: settings.base_url.clone() })
    }
}

#[async_trait]
impl RerankProvider for HttpRerankProvider {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn rerank(&self, query: &str, documents: &[String], top_k: usize) -> Result<Vec<RerankScore>> {
        let body = RerankRequest { model: &self.model, query, documents, top_n: top_k.min(documents.len()) };
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::RerankProvider(format!("request to {} failed: {e}", self.base_url)))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::RerankProvider(format!("HTTP {}: {text}", status.as_u16())));
        }
        let parsed: RerankResponse = response
            .json()
            .await
            .map_err(|e| Error::RerankProvider(format!("failed to parse rerank response: {e}")))?;
        Ok(parsed.results.into_iter().map(|r| RerankScore { index: r.index, score: r.relevance_score }).collect())
    }
}
