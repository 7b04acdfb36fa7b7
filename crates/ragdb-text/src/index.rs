use std::fmt::Display;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::TextIndexer;
use ragdb_core::types::{Chunk, RankedChunk, Scope};

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

fn text_error(err: impl Display) -> Error {
	Error::Store(format!("tantivy: {err}"))
}

/// Scoped BM25 index over chunk text.
///
/// Writes go through a single `IndexWriter`; the reader is reloaded after
/// every commit so searches see their own writes.
pub struct TantivyIndexer {
	index: Index,
	reader: IndexReader,
	writer: Mutex<IndexWriter>,
	fields: ChunkFields,
}

impl TantivyIndexer {
	pub fn create_in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	/// Opens the index under `index_dir`, creating the directory and an empty index when absent.
	pub fn open_or_create(index_dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(index_dir).map_err(text_error)?;
		let directory = MmapDirectory::open(index_dir).map_err(text_error)?;
		let index = Index::open_or_create(directory, build_schema()).map_err(text_error)?;
		Self::from_index(index)
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let fields = ChunkFields::from_schema(&index.schema()).map_err(text_error)?;
		let writer: IndexWriter = index.writer(WRITER_HEAP_BYTES).map_err(text_error)?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(text_error)?;
		Ok(Self { index, reader, writer: Mutex::new(writer), fields })
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	fn lock_writer(&self) -> Result<MutexGuard<'_, IndexWriter>> {
		self.writer.lock().map_err(|_| Error::Store("tantivy writer lock poisoned".to_string()))
	}

	fn scope_clauses(&self, tenant_id: &str, namespace: &str) -> Vec<(Occur, Box<dyn Query>)> {
		let tenant = Term::from_field_text(self.fields.tenant_id, tenant_id);
		let namespace = Term::from_field_text(self.fields.namespace, namespace);
		vec![
			(Occur::Must, Box::new(TermQuery::new(tenant, IndexRecordOption::Basic))),
			(Occur::Must, Box::new(TermQuery::new(namespace, IndexRecordOption::Basic))),
		]
	}

	/// Matches the one document holding `chunk` in its own scope.
	fn chunk_key(&self, chunk: &Chunk) -> BooleanQuery {
		let id = Term::from_field_text(self.fields.id, &chunk.id);
		let mut clauses = self.scope_clauses(&chunk.tenant_id, &chunk.namespace);
		clauses.push((Occur::Must, Box::new(TermQuery::new(id, IndexRecordOption::Basic))));
		BooleanQuery::new(clauses)
	}

	fn commit(&self, writer: &mut IndexWriter) -> Result<()> {
		writer.commit().map_err(text_error)?;
		self.reader.reload().map_err(text_error)
	}

	fn chunk_from_doc(&self, doc: &TantivyDocument) -> Result<Chunk> {
		let field = |f| doc.get_first(f).and_then(|v| v.as_str()).unwrap_or_default().to_string();
		let id = field(self.fields.id);
		let metadata = serde_json::from_str(&field(self.fields.metadata)).unwrap_or_else(|e| {
			tracing::warn!(chunk = %id, error = %e, "unreadable stored metadata; dropping it");
			Default::default()
		});
		Ok(Chunk {
			id,
			text: field(self.fields.text),
			tenant_id: field(self.fields.tenant_id),
			namespace: field(self.fields.namespace),
			source_type: field(self.fields.source_type).parse()?,
			metadata,
			embedding: Vec::new(),
		})
	}
}

impl TextIndexer for TantivyIndexer {
	fn index(&self, chunks: &[Chunk]) -> Result<()> {
		if chunks.is_empty() {
			return Ok(());
		}
		let mut writer = self.lock_writer()?;
		for c in chunks {
			let metadata = serde_json::to_string(&c.metadata).map_err(text_error)?;
			writer.delete_query(Box::new(self.chunk_key(c))).map_err(text_error)?;
			writer
				.add_document(doc!(
					self.fields.id => c.id.clone(),
					self.fields.tenant_id => c.tenant_id.clone(),
					self.fields.namespace => c.namespace.clone(),
					self.fields.source_type => c.source_type.as_str(),
					self.fields.metadata => metadata,
					self.fields.text => c.text.clone(),
				))
				.map_err(text_error)?;
		}
		self.commit(&mut writer)?;
		tracing::debug!(chunks = chunks.len(), "tantivy indexed");
		Ok(())
	}

	fn search(&self, scope: &Scope, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
		if k == 0 || query.trim().is_empty() {
			return Ok(Vec::new());
		}
		let searcher = self.reader.searcher();
		let qp = QueryParser::for_index(&self.index, vec![self.fields.text]);
		// Lenient: stray quotes or operators in user text must not fail the search.
		let (user_query, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() {
			tracing::debug!(errors = errors.len(), "full-text query parsed leniently");
		}
		let mut clauses = vec![(Occur::Must, user_query)];
		clauses.extend(self.scope_clauses(scope.tenant(), scope.namespace()));
		let q = BooleanQuery::new(clauses);

		let top_docs = searcher.search(&q, &TopDocs::with_limit(k)).map_err(text_error)?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr).map_err(text_error)?;
			hits.push(RankedChunk { chunk: self.chunk_from_doc(&doc)?, rank: score });
		}
		Ok(hits)
	}

	fn delete_scope(&self, scope: &Scope) -> Result<()> {
		let mut writer = self.lock_writer()?;
		let in_scope = BooleanQuery::new(self.scope_clauses(scope.tenant(), scope.namespace()));
		writer.delete_query(Box::new(in_scope)).map_err(text_error)?;
		self.commit(&mut writer)
	}
}
