//! Brute-force in-process store for tests, demos and small tenants.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::RwLock;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{ChunkWriter, VectorStore};
use ragdb_core::types::{Chunk, RankedChunk, Scope, SimilarChunk};

pub struct MemoryStore {
	chunks: RwLock<Vec<Chunk>>,
	full_text: bool,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryStore {
	pub fn new() -> Self {
		Self { chunks: RwLock::new(Vec::new()), full_text: true }
	}

	/// A store whose full-text search always reports `FullTextUnavailable`.
	pub fn without_full_text() -> Self {
		Self { chunks: RwLock::new(Vec::new()), full_text: false }
	}

	pub fn len(&self) -> usize {
		self.chunks.read().map(|c| c.len()).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn scoped(&self, scope: &Scope) -> Result<Vec<Chunk>> {
		let chunks = self.chunks.read().map_err(|_| Error::Store("memory store lock poisoned".to_string()))?;
		Ok(chunks.iter().filter(|c| c.belongs_to(scope)).cloned().collect())
	}
}

pub(crate) fn tokens(text: &str) -> Vec<String> {
	text.split(|c: char| !c.is_alphanumeric())
		.filter(|t| !t.is_empty())
		.map(str::to_lowercase)
		.collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if na == 0.0 || nb == 0.0 {
		return 0.0;
	}
	dot / (na * nb)
}

fn top_ranked(mut rows: Vec<RankedChunk>, limit: usize) -> Vec<RankedChunk> {
	rows.sort_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(Ordering::Equal));
	rows.truncate(limit);
	rows
}

#[async_trait]
impl VectorStore for MemoryStore {
	async fn search_similar(&self, scope: &Scope, query_vector: &[f32], limit: usize) -> Result<Vec<SimilarChunk>> {
		let mut hits: Vec<SimilarChunk> = self
			.scoped(scope)?
			.into_iter()
			.map(|chunk| {
				let similarity = cosine(query_vector, &chunk.embedding).clamp(0.0, 1.0);
				SimilarChunk { chunk, similarity }
			})
			.collect();
		hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));
		hits.truncate(limit);
		Ok(hits)
	}

	/// Rank is the number of query-term occurrences in the chunk.
	async fn full_text_search(&self, scope: &Scope, query: &str, limit: usize) -> Result<Vec<RankedChunk>> {
		if !self.full_text {
			return Err(Error::FullTextUnavailable("memory store built without full-text support".to_string()));
		}
		let terms: HashSet<String> = tokens(query).into_iter().collect();
		let rows = self
			.scoped(scope)?
			.into_iter()
			.filter_map(|chunk| {
				let hits = tokens(&chunk.text).iter().filter(|t| terms.contains(*t)).count();
				(hits > 0).then(|| RankedChunk { chunk, rank: hits as f32 })
			})
			.collect();
		Ok(top_ranked(rows, limit))
	}

	/// Rank is the fraction of distinct query terms present in the chunk.
	async fn sparse_search(&self, scope: &Scope, query: &str, limit: usize) -> Result<Vec<RankedChunk>> {
		let terms: HashSet<String> = tokens(query).into_iter().collect();
		if terms.is_empty() {
			return Ok(Vec::new());
		}
		let rows = self
			.scoped(scope)?
			.into_iter()
			.filter_map(|chunk| {
				let present: HashSet<String> = tokens(&chunk.text).into_iter().collect();
				let covered = terms.iter().filter(|t| present.contains(*t)).count();
				(covered > 0).then(|| RankedChunk { chunk, rank: covered as f32 / terms.len() as f32 })
			})
			.collect();
		Ok(top_ranked(rows, limit))
	}
}

#[async_trait]
impl ChunkWriter for MemoryStore {
	async fn upsert(&self, incoming: &[Chunk]) -> Result<()> {
		let mut chunks = self.chunks.write().map_err(|_| Error::Store("memory store lock poisoned".to_string()))?;
		for chunk in incoming {
			match chunks.iter_mut().find(|c| c.id == chunk.id && c.tenant_id == chunk.tenant_id && c.namespace == chunk.namespace) {
				Some(existing) => *existing = chunk.clone(),
				None => chunks.push(chunk.clone()),
			}
		}
		Ok(())
	}

	async fn delete_scope(&self, scope: &Scope) -> Result<()> {
		let mut chunks = self.chunks.write().map_err(|_| Error::Store("memory store lock poisoned".to_string()))?;
		chunks.retain(|c| !c.belongs_to(scope));
		Ok(())
	}
}
