//! Second-pass relevance ordering through an external ranking model.
//!
//! Reranking never fails the caller. When it is disabled, uncredentialed,
//! erroring, slow or answers with nonsense, the first `top_k` inputs come back
//! in their original order.

mod http;

pub use http::HttpRerankProvider;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ragdb_core::config::RerankSettings;
use ragdb_core::error::Result;
use ragdb_core::traits::RerankProvider;
use ragdb_core::types::RerankScore;

/// Score given to passed-through documents that carry no original score.
pub const NEUTRAL_SCORE: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    /// Position in the input list.
    pub index: usize,
    pub text: String,
    /// Model relevance in [0, 1], or the pass-through score.
    pub score: f32,
    pub original_score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankOutcome {
    Reranked,
    PassThrough,
}

pub struct Reranker {
    provider: Option<Arc<dyn RerankProvider>>,
    enabled: bool,
    timeout: Duration,
}

impl Reranker {
    pub fn new(provider: Option<Arc<dyn RerankProvider>>, enabled: bool, timeout: Duration) -> Self {
        Self { provider, enabled, timeout }
    }

    pub fn disabled() -> Self {
        Self { provider: None, enabled: false, timeout: Duration::ZERO }
    }

    /// Builds the HTTP provider when an API key is configured.
    pub fn from_settings(settings: &RerankSettings) -> Result<Self> {
        let has_key = settings.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        let provider: Option<Arc<dyn RerankProvider>> =
            if has_key { Some(Arc::new(HttpRerankProvider::new(settings)?)) } else { None };
        if settings.enabled && provider.is_none() {
            tracing::warn!(model = %settings.model, "reranking enabled but no API key configured; results will pass through");
        }
        Ok(Self::new(provider, settings.enabled, settings.timeout()))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn rerank(&self, query: &str, documents: &[String], top_k: usize, original_scores: Option<&[f32]>) -> Vec<RerankResult> {
        self.rerank_with_outcome(query, documents, top_k, original_scores).await.0
    }

    pub async fn rerank_with_outcome(
        &self,
        query: &str,
        documents: &[String],
        top_k: usize,
        original_scores: Option<&[f32]>,
    ) -> (Vec<RerankResult>, RerankOutcome) {
        if documents.is_empty() || top_k == 0 {
            return (Vec::new(), RerankOutcome::PassThrough);
        }
        if !self.enabled {
            return (pass_through(documents, top_k, original_scores), RerankOutcome::PassThrough);
        }
        let Some(provider) = &self.provider else {
            tracing::warn!("rerank provider credential missing; passing candidates through");
            return (pass_through(documents, top_k, original_scores), RerankOutcome::PassThrough);
        };

        let answer = match tokio::time::timeout(self.timeout, provider.rerank(query, documents, top_k)).await {
            Ok(Ok(scores)) => scores,
            Ok(Err(e)) => {
                tracing::warn!(model = provider.model_id(), error = %e, "rerank failed; passing candidates through");
                return (pass_through(documents, top_k, original_scores), RerankOutcome::PassThrough);
            }
            Err(_) => {
                tracing::warn!(model = provider.model_id(), timeout_ms = self.timeout.as_millis() as u64, "rerank timed out; passing candidates through");
                return (pass_through(documents, top_k, original_scores), RerankOutcome::PassThrough);
            }
        };

        match apply_scores(answer, documents, top_k, original_scores) {
            Ok(results) => (results, RerankOutcome::Reranked),
            Err(reason) => {
                tracing::warn!(model = provider.model_id(), %reason, "unusable rerank answer; passing candidates through");
                (pass_through(documents, top_k, original_scores), RerankOutcome::PassThrough)
            }
        }
    }
}

fn original(original_scores: Option<&[f32]>, index: usize) -> Option<f32> {
    original_scores.and_then(|s| s.get(index).copied())
}

fn pass_through(documents: &[String], top_k: usize, original_scores: Option<&[f32]>) -> Vec<RerankResult> {
    documents
        .iter()
        .take(top_k)
        .enumerate()
        .map(|(index, text)| {
            let original_score = original(original_scores, index);
            RerankResult { index, text: text.clone(), score: original_score.unwrap_or(NEUTRAL_SCORE), original_score }
        })
        .collect()
}

fn apply_scores(
    mut answer: Vec<RerankScore>,
    documents: &[String],
    top_k: usize,
    original_scores: Option<&[f32]>,
) -> std::result::Result<Vec<RerankResult>, String> {
    if answer.is_empty() {
        return Err("provider returned no results".to_string());
    }
    let mut seen = HashSet::with_capacity(answer.len());
    for s in &answer {
        if s.index >= documents.len() {
            return Err(format!("index {} out of range for {} documents", s.index, documents.len()));
        }
        if !seen.insert(s.index) {
            return Err(format!("index {} returned twice", s.index));
        }
    }
    answer.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    Ok(answer
        .into_iter()
        .take(top_k)
        .map(|s| RerankResult {
            index: s.index,
            text: documents[s.index].clone(),
            score: if s.score.is_finite() { s.score.clamp(0.0, 1.0) } else { 0.0 },
            original_score: original(original_scores, s.index),
        })
        .collect())
}
