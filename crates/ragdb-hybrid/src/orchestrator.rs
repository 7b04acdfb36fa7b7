//! Hybrid search: embed, retrieve per signal concurrently, fuse, rerank.
//!
//! Degradation order when a stage fails:
//! hybrid -> vector-only -> full-text-only -> empty list.
//! Only caller input errors (and cancellation) reach the caller.

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use ragdb_core::config::Settings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{Embedder, VectorStore};
use ragdb_core::types::{FusionWeights, RankedResult, Scope, SearchRequest, Signal};
use ragdb_text::{FullTextSearcher, SparseSearcher};
use ragdb_vector::VectorSearcher;

use crate::fusion::{Fuser, RankedList, DEFAULT_RRF_K};
use crate::rerank::{RerankOutcome, Reranker};

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub hybrid_enabled: bool,
    /// Used when a request carries no weights.
    pub default_weights: FusionWeights,
    pub rrf_k: f32,
    pub over_fetch: usize,
    pub search_timeout: Duration,
    pub embed_timeout: Duration,
    /// Upper bound on fused candidates sent to the reranker (never below the limit).
    pub rerank_candidates: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            hybrid_enabled: true,
            default_weights: FusionWeights::default(),
            rrf_k: DEFAULT_RRF_K,
            over_fetch: 3,
            search_timeout: Duration::from_secs(5),
            embed_timeout: Duration::from_secs(10),
            rerank_candidates: 50,
        }
    }
}

impl SearchOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            hybrid_enabled: settings.hybrid.enabled,
            default_weights: settings.hybrid.weights,
            rrf_k: settings.hybrid.rrf_k,
            over_fetch: settings.hybrid.over_fetch,
            search_timeout: settings.hybrid.search_timeout(),
            embed_timeout: settings.embedding.timeout(),
            rerank_candidates: settings.rerank.max_candidates,
        }
    }
}

/// Which stage of the fallback chain produced the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    Hybrid,
    VectorOnly,
    FullTextOnly,
    Empty,
}

#[derive(Debug, Clone)]
pub struct SearchReport {
    pub results: Vec<RankedResult>,
    pub path: SearchPath,
    pub reranked: bool,
    pub elapsed: Duration,
}

pub struct HybridSearchOrchestrator {
    embedder: Arc<dyn Embedder>,
    vector: VectorSearcher,
    full_text: FullTextSearcher,
    sparse: SparseSearcher,
    fuser: Fuser,
    reranker: Reranker,
    options: SearchOptions,
}

async fn bounded<T>(operation: &'static str, limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout { operation, timeout_ms: limit.as_millis() as u64 }),
    }
}

fn ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

impl HybridSearchOrchestrator {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>, reranker: Reranker, options: SearchOptions) -> Self {
        Self {
            embedder,
            vector: VectorSearcher::new(store.clone()),
            full_text: FullTextSearcher::new(store.clone()),
            sparse: SparseSearcher::new(store),
            fuser: Fuser::new(options.rrf_k),
            reranker,
            options,
        }
    }

    pub fn from_settings(settings: &Settings, embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Result<Self> {
        let reranker = Reranker::from_settings(&settings.rerank)?;
        Ok(Self::new(embedder, store, reranker, SearchOptions::from_settings(settings)))
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<RankedResult>> {
        Ok(self.search_with_report(request).await?.results)
    }

    /// Like [`search`](Self::search), but abandons every in-flight call once `cancel` fires.
    pub async fn search_cancellable(&self, request: &SearchRequest, cancel: &CancellationToken) -> Result<Vec<RankedResult>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(tenant = %request.tenant_id, namespace = %request.namespace, "search cancelled");
                Err(Error::Cancelled)
            }
            report = self.search_with_report(request) => report.map(|r| r.results),
        }
    }

    pub async fn search_with_report(&self, request: &SearchRequest) -> Result<SearchReport> {
        let started = Instant::now();
        let (scope, weights) = self.validate(request)?;
        let limit = request.limit;
        let query = request.query.as_str();

        if query.trim().is_empty() {
            return Ok(SearchReport { results: Vec::new(), path: SearchPath::Empty, reranked: false, elapsed: started.elapsed() });
        }

        let query_vector = match bounded("embedding", self.options.embed_timeout, self.embedder.embed(query)).await {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(tenant = scope.tenant(), namespace = scope.namespace(), error = %e, "query embedding failed; dense retrieval unavailable");
                None
            }
        };

        let report = |results: Vec<RankedResult>, path: SearchPath, reranked: bool| {
            let elapsed = started.elapsed();
            tracing::info!(tenant = scope.tenant(), namespace = scope.namespace(), limit, results = results.len(), ?path, reranked, elapsed_ms = ms(elapsed), "search complete");
            SearchReport { results, path, reranked, elapsed }
        };

        if let Some(v) = query_vector.as_deref() {
            if self.options.hybrid_enabled {
                match self.hybrid(&scope, query, v, limit, weights).await {
                    Ok((results, reranked)) => return Ok(report(results, SearchPath::Hybrid, reranked)),
                    Err(e) => {
                        tracing::error!(tenant = scope.tenant(), namespace = scope.namespace(), error = %e, elapsed_ms = ms(started.elapsed()), "hybrid search failed; falling back to vector-only");
                    }
                }
            }
            match bounded("vector search", self.options.search_timeout, self.vector.search(&scope, v, limit)).await {
                Ok(results) => return Ok(report(results, SearchPath::VectorOnly, false)),
                Err(e) => {
                    tracing::warn!(tenant = scope.tenant(), namespace = scope.namespace(), error = %e, elapsed_ms = ms(started.elapsed()), "vector-only search failed; falling back to full-text only");
                }
            }
        }

        match bounded("full-text search", self.options.search_timeout, self.full_text.search(&scope, query, limit)).await {
            Ok(results) => Ok(report(results, SearchPath::FullTextOnly, false)),
            Err(e) => {
                tracing::error!(tenant = scope.tenant(), namespace = scope.namespace(), error = %e, elapsed_ms = ms(started.elapsed()), "every retrieval signal failed; returning no results");
                Ok(report(Vec::new(), SearchPath::Empty, false))
            }
        }
    }

    /// Weights first, then limit, then scope.
    fn validate(&self, request: &SearchRequest) -> Result<(Scope, FusionWeights)> {
        let weights = request.weights.unwrap_or(self.options.default_weights);
        weights.validate()?;
        if request.limit == 0 {
            return Err(Error::InvalidLimit);
        }
        Ok((request.scope()?, weights))
    }

    async fn hybrid(&self, scope: &Scope, query: &str, query_vector: &[f32], limit: usize, weights: FusionWeights) -> Result<(Vec<RankedResult>, bool)> {
        let fetch = limit.saturating_mul(self.options.over_fetch.max(1));
        let timeout = self.options.search_timeout;
        let retrieval_started = Instant::now();

        let vector = async {
            if weights.weight(Signal::Vector) > 0.0 {
                bounded("vector search", timeout, self.vector.search(scope, query_vector, fetch)).await
            } else {
                Ok(Vec::new())
            }
        };
        let full_text = async {
            if weights.weight(Signal::FullText) > 0.0 {
                bounded("full-text search", timeout, self.full_text.search(scope, query, fetch)).await
            } else {
                Ok(Vec::new())
            }
        };
        let sparse = async {
            if weights.weight(Signal::Sparse) > 0.0 {
                bounded("sparse search", timeout, self.sparse.search(scope, query, fetch)).await
            } else {
                Ok(Vec::new())
            }
        };
        let (vector, full_text, sparse) = tokio::join!(vector, full_text, sparse);
        let (vector, full_text, sparse) = (vector?, full_text?, sparse?);
        tracing::debug!(
            fetch,
            vector = vector.len(),
            full_text = full_text.len(),
            sparse = sparse.len(),
            elapsed_ms = ms(retrieval_started.elapsed()),
            "candidates retrieved"
        );

        let lists = [
            RankedList::new(Signal::Vector, weights.weight(Signal::Vector), vector),
            RankedList::new(Signal::FullText, weights.weight(Signal::FullText), full_text),
            RankedList::new(Signal::Sparse, weights.weight(Signal::Sparse), sparse),
        ];
        let fused = self.fuser.fuse(&lists, usize::MAX);

        if !self.reranker.is_enabled() || fused.len() <= limit {
            return Ok((fused.into_iter().take(limit).collect(), false));
        }
        let pool: Vec<RankedResult> = fused.into_iter().take(self.options.rerank_candidates.max(limit)).collect();
        let documents: Vec<String> = pool.iter().map(|r| r.text.clone()).collect();
        let original_scores: Vec<f32> = pool.iter().map(|r| r.scores.combined).collect();
        let rerank_started = Instant::now();
        let (reranked, outcome) = self.reranker.rerank_with_outcome(query, &documents, limit, Some(&original_scores)).await;
        tracing::debug!(candidates = pool.len(), ?outcome, elapsed_ms = ms(rerank_started.elapsed()), "rerank");

        let results = reranked
            .into_iter()
            .filter_map(|r| {
                pool.get(r.index).cloned().map(|mut result| {
                    result.scores.combined = r.score;
                    result
                })
            })
            .collect();
        Ok((results, outcome == RerankOutcome::Reranked))
    }
}
