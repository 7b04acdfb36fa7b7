//! OpenAI-compatible embedding provider.
//!
//! - Endpoint: `POST {base_url}` (default `https://api.openai.com/v1/embeddings`)
//! - Auth: `Authorization: Bearer {api_key}`
//! - Body: `{ model, input: ["text1", ...], dimensions? }`
//! - Response: `{ data: [{ embedding, index }], model, usage }`
//!
//! Works with any API speaking the same protocol (Azure OpenAI, vLLM, LiteLLM).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;

use crate::ensure_non_empty;

const BASE_BACKOFF: Duration = Duration::from_millis(200);

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Outcome of one HTTP attempt that did not produce embeddings.
#[derive(Debug)]
enum Failure {
    Transient(String),
    Fatal(String),
}

pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    dimension: usize,
    max_batch: usize,
    max_retries: u32,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::EmbeddingProvider(format!("failed to build HTTP client: {e}")))?;
        let api_key = settings.api_key.clone().filter(|k| !k.trim().is_empty());
        Ok(Self {
            client,
            api_key,
            model: settings.model.clone(),
            base_url: settings.base_url.clone(),
            dimension: settings.dimension,
            max_batch: settings.max_batch.max(1),
            max_retries: settings.max_retries,
            id: format!("openai:{}:d{}", settings.model, settings.dimension),
        })
    }

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        let mut body = serde_json::json!({ "model": self.model, "input": texts });
        // Only text-embedding-3 style models accept a reduced output size.
        if self.model.contains("text-embedding-3") {
            body["dimensions"] = serde_json::json!(self.dimension);
        }
        body
    }

    async fn post_once(&self, api_key: &str, body: &serde_json::Value) -> std::result::Result<EmbeddingResponse, Failure> {
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Failure::Transient(format!("request to {} failed: {e}", self.base_url)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| Failure::Transient(format!("failed to read response body: {e}")))?;
        if status == 200 {
            serde_json::from_str(&text).map_err(|e| Failure::Fatal(format!("failed to parse embedding response: {e}")))
        } else {
            Err(classify_http_error(status, &text))
        }
    }

    async fn post_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::EmbeddingProvider("embedding API key is not configured".to_string()))?;
        let body = self.request_body(texts);
        let mut attempt = 0u32;
        loop {
            match self.post_once(api_key, &body).await {
                Ok(response) => return extract_embeddings(response, texts.len(), self.dimension),
                Err(Failure::Fatal(message)) => return Err(Error::EmbeddingProvider(message)),
                Err(Failure::Transient(message)) if attempt < self.max_retries => {
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt);
                    tracing::warn!(attempt = attempt + 1, backoff_ms = backoff.as_millis() as u64, error = %message, "embedding request failed; retrying");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(Failure::Transient(message)) => return Err(Error::EmbeddingProvider(message)),
            }
        }
    }
}

fn classify_http_error(status: u16, body: &str) -> Failure {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .and_then(|d| d.message)
        .unwrap_or_else(|| body.to_string());
    match status {
        400 if message.contains("token") || message.contains("length") => {
            Failure::Fatal(format!("input exceeds the provider token limit: {message}"))
        }
        401 | 403 => Failure::Fatal(format!("authentication failed (HTTP {status}): {message}")),
        408 | 429 | 500..=599 => Failure::Transient(format!("HTTP {status}: {message}")),
        _ => Failure::Fatal(format!("HTTP {status}: {message}")),
    }
}

fn extract_embeddings(mut response: EmbeddingResponse, expected: usize, dimension: usize) -> Result<Vec<Vec<f32>>> {
    if response.data.len() != expected {
        return Err(Error::EmbeddingProvider(format!(
            "expected {expected} embeddings but provider returned {}",
            response.data.len()
        )));
    }
    response.data.sort_by_key(|d| d.index);
    // With the length checked, sorted indices must be exactly 0..expected.
    if let Some((position, bad)) = response.data.iter().enumerate().find(|(i, d)| d.index != *i) {
        return Err(Error::EmbeddingProvider(format!(
            "embedding index {} at position {position} is duplicated or out of range for {expected} inputs",
            bad.index
        )));
    }
    if let Some(bad) = response.data.iter().find(|d| d.embedding.len() != dimension) {
        return Err(Error::EmbeddingProvider(format!(
            "embedding {} has dimension {}, expected {dimension}",
            bad.index,
            bad.embedding.len()
        )));
    }
    Ok(response.data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        ensure_non_empty(texts)?;
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch) {
            out.extend(self.post_with_retry(batch).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, v: f32, dim: usize) -> EmbeddingData {
        EmbeddingData { embedding: vec![v; dim], index }
    }

    #[test]
    fn extract_restores_input_order() {
        let response = EmbeddingResponse { data: vec![row(2, 0.3, 4), row(0, 0.1, 4), row(1, 0.2, 4)] };
        let out = extract_embeddings(response, 3, 4).expect("extract");
        assert_eq!(out.iter().map(|v| v[0]).collect::<Vec<_>>(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn extract_rejects_duplicate_and_out_of_range_indices() {
        let duplicated = EmbeddingResponse { data: vec![row(0, 0.1, 4), row(0, 0.2, 4)] };
        assert!(matches!(extract_embeddings(duplicated, 2, 4), Err(Error::EmbeddingProvider(_))));
        let shifted = EmbeddingResponse { data: vec![row(1, 0.1, 4), row(2, 0.2, 4)] };
        assert!(matches!(extract_embeddings(shifted, 2, 4), Err(Error::EmbeddingProvider(_))));
    }

    #[test]
    fn extract_rejects_short_batches_and_wrong_dimension() {
        let short = EmbeddingResponse { data: vec![row(0, 0.1, 4)] };
        assert!(extract_embeddings(short, 2, 4).is_err());
        let wrong = EmbeddingResponse { data: vec![row(0, 0.1, 3)] };
        assert!(extract_embeddings(wrong, 1, 4).is_err());
    }

    #[test]
    fn token_limit_and_auth_errors_are_not_retried() {
        let body = r#"{"error":{"message":"This model's maximum context length is 8192 tokens"}}"#;
        assert!(matches!(classify_http_error(400, body), Failure::Fatal(m) if m.contains("token limit")));
        assert!(matches!(classify_http_error(401, "{}"), Failure::Fatal(_)));
        assert!(matches!(classify_http_error(429, "slow down"), Failure::Transient(_)));
        assert!(matches!(classify_http_error(503, ""), Failure::Transient(_)));
    }

    #[test]
    fn dimensions_sent_only_for_v3_models() {
        let mut settings = EmbeddingSettings::default();
        let e = OpenAiEmbedder::new(&settings).expect("client");
        assert_eq!(e.request_body(&["a".to_string()])["dimensions"], 1536);
        settings.model = "text-embedding-ada-002".to_string();
        let e = OpenAiEmbedder::new(&settings).expect("client");
        assert!(e.request_body(&["a".to_string()]).get("dimensions").is_none());
    }
}
