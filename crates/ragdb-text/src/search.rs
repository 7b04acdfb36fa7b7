use std::cmp::Ordering;
use std::sync::Arc;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::VectorStore;
use ragdb_core::types::{RankedChunk, RankedResult, Scope, Signal};

/// Lexical retrieval adapter. A store without a full-text index yields no
/// rows instead of an error.
#[derive(Clone)]
pub struct FullTextSearcher {
	store: Arc<dyn VectorStore>,
}

impl FullTextSearcher {
	pub fn new(store: Arc<dyn VectorStore>) -> Self {
		Self { store }
	}

	pub async fn search(&self, scope: &Scope, query: &str, limit: usize) -> Result<Vec<RankedResult>> {
		if limit == 0 {
			return Err(Error::InvalidLimit);
		}
		if query.trim().is_empty() {
			return Ok(Vec::new());
		}
		match self.store.full_text_search(scope, query, limit).await {
			Ok(rows) => Ok(normalize(scope, rows, Signal::FullText, limit)),
			Err(Error::FullTextUnavailable(reason)) => {
				tracing::warn!(%scope, %reason, "full-text search unavailable; treating as zero results");
				Ok(Vec::new())
			}
			Err(e) => Err(e),
		}
	}
}

/// Sparse-vector retrieval adapter; stores without a sparse index return nothing.
#[derive(Clone)]
pub struct SparseSearcher {
	store: Arc<dyn VectorStore>,
}

impl SparseSearcher {
	pub fn new(store: Arc<dyn VectorStore>) -> Self {
		Self { store }
	}

	pub async fn search(&self, scope: &Scope, query: &str, limit: usize) -> Result<Vec<RankedResult>> {
		if limit == 0 {
			return Err(Error::InvalidLimit);
		}
		if query.trim().is_empty() {
			return Ok(Vec::new());
		}
		let rows = self.store.sparse_search(scope, query, limit).await?;
		Ok(normalize(scope, rows, Signal::Sparse, limit))
	}
}

/// Scales engine ranks into [0, 1] by the best rank in the list, keeping
/// only rows owned by `scope`.
fn normalize(scope: &Scope, rows: Vec<RankedChunk>, signal: Signal, limit: usize) -> Vec<RankedResult> {
	let rows: Vec<RankedChunk> = rows
		.into_iter()
		.filter(|row| {
			let owned = row.chunk.belongs_to(scope);
			if !owned {
				tracing::error!(%scope, %signal, chunk = %row.chunk.id, "store returned a chunk outside the requested scope; dropping it");
			}
			owned
		})
		.collect();
	let max = rows.iter().map(|r| r.rank).filter(|r| r.is_finite()).fold(0.0f32, f32::max);
	let mut results: Vec<RankedResult> = rows
		.into_iter()
		.map(|row| {
			let score = if max > 0.0 && row.rank.is_finite() { (row.rank / max).clamp(0.0, 1.0) } else { 0.0 };
			RankedResult::from_chunk(row.chunk, signal, score)
		})
		.collect();
	results.sort_by(|a, b| b.scores.combined.partial_cmp(&a.scores.combined).unwrap_or(Ordering::Equal));
	results.truncate(limit);
	results
}
