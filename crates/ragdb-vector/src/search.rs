use std::cmp::Ordering;
use std::sync::Arc;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::VectorStore;
use ragdb_core::types::{RankedResult, Scope, Signal};

/// Dense retrieval adapter over a [`VectorStore`].
///
/// The query vector is supplied by the caller; this type never embeds text.
#[derive(Clone)]
pub struct VectorSearcher {
	store: Arc<dyn VectorStore>,
}

impl VectorSearcher {
	pub fn new(store: Arc<dyn VectorStore>) -> Self {
		Self { store }
	}

	/// Top `limit` chunks of `scope` by cosine similarity, best first.
	pub async fn search(&self, scope: &Scope, query_vector: &[f32], limit: usize) -> Result<Vec<RankedResult>> {
		if limit == 0 {
			return Err(Error::InvalidLimit);
		}
		let rows = self.store.search_similar(scope, query_vector, limit).await?;
		let mut results: Vec<RankedResult> = Vec::with_capacity(rows.len());
		for row in rows {
			if !row.chunk.belongs_to(scope) {
				tracing::error!(%scope, chunk = %row.chunk.id, owner_tenant = %row.chunk.tenant_id, owner_namespace = %row.chunk.namespace, "vector store returned a chunk outside the requested scope; dropping it");
				continue;
			}
			let similarity = if row.similarity.is_finite() { row.similarity.clamp(0.0, 1.0) } else { 0.0 };
			results.push(RankedResult::from_chunk(row.chunk, Signal::Vector, similarity));
		}
		// Stable: stores that already order their rows keep that order on ties.
		results.sort_by(|a, b| b.scores.combined.partial_cmp(&a.scores.combined).unwrap_or(Ordering::Equal));
		results.truncate(limit);
		tracing::debug!(%scope, limit, hits = results.len(), "vector search");
		Ok(results)
	}
}
