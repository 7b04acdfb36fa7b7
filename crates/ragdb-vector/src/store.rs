//! LanceDB-backed chunk store.
//!
//! One table holds every tenant's chunks; reads always carry a
//! `tenant_id`/`namespace` prefilter. Full-text search is delegated to an
//! attached [`TextIndexer`] and reports `FullTextUnavailable` without one.

use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::Path;
use std::sync::Arc;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{ChunkWriter, TextIndexer, VectorStore};
use ragdb_core::types::{Chunk, Meta, RankedChunk, Scope, SimilarChunk, SourceType};

use crate::schema::{build_arrow_schema, scope_filter};

pub struct LanceStore {
	db: Connection,
	table_name: String,
	dim: i32,
	text: Option<Arc<dyn TextIndexer>>,
}

impl LanceStore {
	pub async fn new(db_path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		let dim = i32::try_from(dim).map_err(|_| Error::InvalidConfig(format!("embedding dimension {dim} is too large")))?;
		let db = connect(db_path.to_string_lossy().as_ref()).execute().await.map_err(Error::store)?;
		Ok(Self { db, table_name: table_name.to_string(), dim, text: None })
	}

	#[must_use]
	pub fn with_text_index(mut self, text: Arc<dyn TextIndexer>) -> Self {
		self.text = Some(text);
		self
	}

	/// `None` until the first chunk is written.
	async fn open_table(&self) -> Result<Option<Table>> {
		let names = self.db.table_names().execute().await.map_err(Error::store)?;
		if !names.contains(&self.table_name) {
			return Ok(None);
		}
		let table = self.db.open_table(&self.table_name).execute().await.map_err(Error::store)?;
		Ok(Some(table))
	}

	fn chunks_to_record_batch(&self, chunks: &[Chunk]) -> Result<RecordBatch> {
		let schema = build_arrow_schema(self.dim);
		let mut ids = Vec::with_capacity(chunks.len());
		let mut tenants = Vec::with_capacity(chunks.len());
		let mut namespaces = Vec::with_capacity(chunks.len());
		let mut source_types = Vec::with_capacity(chunks.len());
		let mut contents = Vec::with_capacity(chunks.len());
		let mut metadata = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for c in chunks {
			if c.embedding.len() != self.dim as usize {
				return Err(Error::Store(format!("chunk '{}' has embedding dimension {}, table expects {}", c.id, c.embedding.len(), self.dim)));
			}
			ids.push(c.id.as_str());
			tenants.push(c.tenant_id.as_str());
			namespaces.push(c.namespace.as_str());
			source_types.push(c.source_type.as_str());
			contents.push(c.text.as_str());
			metadata.push(serde_json::to_string(&c.metadata).map_err(Error::store)?);
			vectors.push(Some(c.embedding.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(tenants)),
			Arc::new(StringArray::from(namespaces)),
			Arc::new(StringArray::from(source_types)),
			Arc::new(StringArray::from(contents)),
			Arc::new(StringArray::from(metadata)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), self.dim)),
		]).map_err(Error::store)?;
		Ok(record_batch)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::Store(format!("column '{name}' missing from lance result")))
}

fn rows_to_hits(batch: &RecordBatch) -> Result<Vec<SimilarChunk>> {
	let ids = string_column(batch, "id")?;
	let tenants = string_column(batch, "tenant_id")?;
	let namespaces = string_column(batch, "namespace")?;
	let source_types = string_column(batch, "source_type")?;
	let contents = string_column(batch, "content")?;
	let metadata = string_column(batch, "metadata")?;
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| Error::Store("column '_distance' missing from lance result".to_string()))?;

	let mut hits = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let chunk = Chunk {
			id: ids.value(i).to_string(),
			text: contents.value(i).to_string(),
			tenant_id: tenants.value(i).to_string(),
			namespace: namespaces.value(i).to_string(),
			source_type: source_types.value(i).parse::<SourceType>()?,
			metadata: parse_metadata(ids.value(i), metadata.value(i)),
			embedding: Vec::new(),
		};
		// Cosine distance lies in [0, 2]; similarity is reported in [0, 1].
		let distance = if distances.is_null(i) { 1.0 } else { distances.value(i) };
		hits.push(SimilarChunk { chunk, similarity: (1.0 - distance).clamp(0.0, 1.0) });
	}
	Ok(hits)
}

fn parse_metadata(id: &str, raw: &str) -> Meta {
	serde_json::from_str(raw).unwrap_or_else(|e| {
		tracing::warn!(chunk = id, error = %e, "unreadable stored metadata; dropping it");
		Default::default()
	})
}

async fn blocking<T, F>(f: F) -> Result<T>
where
	F: FnOnce() -> Result<T> + Send + 'static,
	T: Send + 'static,
{
	tokio::task::spawn_blocking(f).await.map_err(|e| Error::Store(format!("blocking task failed: {e}")))?
}

#[async_trait]
impl VectorStore for LanceStore {
	async fn search_similar(&self, scope: &Scope, query_vector: &[f32], limit: usize) -> Result<Vec<SimilarChunk>> {
		let Some(table) = self.open_table().await? else { return Ok(Vec::new()) };
		let mut stream = table
			.vector_search(query_vector.to_vec())
			.map_err(Error::store)?
			.distance_type(DistanceType::Cosine)
			.only_if(scope_filter(scope))
			.limit(limit)
			.execute()
			.await
			.map_err(Error::store)?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
			hits.extend(rows_to_hits(&batch)?);
		}
		Ok(hits)
	}

	async fn full_text_search(&self, scope: &Scope, query: &str, limit: usize) -> Result<Vec<RankedChunk>> {
		let Some(text) = self.text.clone() else {
			return Err(Error::FullTextUnavailable(format!("no full-text index attached to table '{}'", self.table_name)));
		};
		let scope = scope.clone();
		let query = query.to_string();
		blocking(move || text.search(&scope, &query, limit)).await
	}
}

#[async_trait]
impl ChunkWriter for LanceStore {
	async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
		if chunks.is_empty() {
			return Ok(());
		}
		let record_batch = self.chunks_to_record_batch(chunks)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		match self.open_table().await? {
			Some(table) => {
				let mut mi = table.merge_insert(&["tenant_id", "namespace", "id"]);
				mi.when_matched_update_all(None).when_not_matched_insert_all();
				mi.execute(reader).await.map_err(Error::store)?;
			}
			None => {
				self.db.create_table(&self.table_name, reader).execute().await.map_err(Error::store)?;
			}
		}
		if let Some(text) = self.text.clone() {
			let owned = chunks.to_vec();
			blocking(move || text.index(&owned)).await?;
		}
		tracing::info!(chunks = chunks.len(), table = %self.table_name, "upserted chunks");
		Ok(())
	}

	async fn delete_scope(&self, scope: &Scope) -> Result<()> {
		if let Some(table) = self.open_table().await? {
			table.delete(&scope_filter(scope)).await.map_err(Error::store)?;
		}
		if let Some(text) = self.text.clone() {
			let scope = scope.clone();
			blocking(move || text.delete_scope(&scope)).await?;
		}
		tracing::info!(%scope, table = %self.table_name, "deleted scope");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn corrupt_metadata_reads_as_empty() {
		assert!(parse_metadata("c1", "{not json").is_empty());
		assert_eq!(parse_metadata("c1", r#"{"url":"https://example.test"}"#).get("url").map(String::as_str), Some("https://example.test"));
	}
}
