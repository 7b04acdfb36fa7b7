use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::types::{Chunk, RankedChunk, RerankScore, Scope, SimilarChunk};

/// Turns text into fixed-length dense vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier of the provider and model, e.g. `openai:text-embedding-3-small:d1536`.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Output order matches input order; any failure fails the whole batch.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::EmbeddingProvider("provider returned no embedding".to_string()))
    }
}

/// Read side of the chunk store. Every call is scoped at the storage boundary.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn search_similar(&self, scope: &Scope, query_vector: &[f32], limit: usize) -> Result<Vec<SimilarChunk>>;

    /// Fails with [`Error::FullTextUnavailable`] when no lexical index is provisioned.
    async fn full_text_search(&self, scope: &Scope, query: &str, limit: usize) -> Result<Vec<RankedChunk>>;

    /// Stores without a sparse index return no rows.
    async fn sparse_search(&self, _scope: &Scope, _query: &str, _limit: usize) -> Result<Vec<RankedChunk>> {
        Ok(Vec::new())
    }
}

/// Write side of the chunk store, used by ingestion and re-indexing.
#[async_trait]
pub trait ChunkWriter: Send + Sync {
    /// Insert chunks, replacing any stored chunk with the same id.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()>;
    /// Remove every chunk owned by `scope`.
    async fn delete_scope(&self, scope: &Scope) -> Result<()>;
}

/// Blocking lexical index that a store can attach for full-text search.
pub trait TextIndexer: Send + Sync {
    fn index(&self, chunks: &[Chunk]) -> Result<()>;
    fn search(&self, scope: &Scope, query: &str, k: usize) -> Result<Vec<RankedChunk>>;
    fn delete_scope(&self, scope: &Scope) -> Result<()>;
}

/// External cross-encoder style ranking model.
#[async_trait]
pub trait RerankProvider: Send + Sync {
    fn model_id(&self) -> &str;
    async fn rerank(&self, query: &str, documents: &[String], top_k: usize) -> Result<Vec<RerankScore>>;
}
