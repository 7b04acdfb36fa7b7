use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::{ChunkWriter, VectorStore};
use ragdb_core::types::{Chunk, RankedChunk, Scope, SimilarChunk, SourceType};
use ragdb_embed::FakeEmbedder;
use ragdb_vector::{LanceStore, MemoryStore, VectorSearcher};

const DIM: usize = 64;

fn chunk(embedder: &FakeEmbedder, id: &str, tenant: &str, namespace: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        tenant_id: tenant.to_string(),
        namespace: namespace.to_string(),
        source_type: SourceType::Context,
        metadata: HashMap::from([("url".to_string(), format!("https://example.test/{id}"))]),
        embedding: embedder.embed_text(text),
    }
}

fn corpus(embedder: &FakeEmbedder) -> Vec<Chunk> {
    vec![
        chunk(embedder, "t1-a", "t1", "brand", "wood stove fire safety checklist"),
        chunk(embedder, "t1-b", "t1", "brand", "rainwater harvesting barrels"),
        chunk(embedder, "t1-c", "t1", "other", "fire starting with flint"),
        chunk(embedder, "t2-a", "t2", "brand", "fire extinguisher maintenance"),
        chunk(embedder, "t2-b", "t2", "brand", "fire pit building guide"),
    ]
}

#[tokio::test]
async fn memory_store_never_leaks_across_tenants() {
    let embedder = FakeEmbedder::new(DIM);
    let store = Arc::new(MemoryStore::new());
    store.upsert(&corpus(&embedder)).await.expect("upsert");
    let searcher = VectorSearcher::new(store.clone());

    let scope = Scope::new("t1", "brand").expect("scope");
    let results = searcher.search(&scope, &embedder.embed_text("fire"), 10).await.expect("search");
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.id.starts_with("t1-")), "got {:?}", results.iter().map(|r| &r.id).collect::<Vec<_>>());
    assert!(results.iter().all(|r| r.id != "t1-c"), "other namespace must not appear");
    for pair in results.windows(2) {
        assert!(pair[0].scores.vector >= pair[1].scores.vector);
    }
    assert!(results.iter().all(|r| (0.0..=1.0).contains(&r.scores.vector)));
}

#[tokio::test]
async fn empty_namespace_and_zero_limit() {
    let embedder = FakeEmbedder::new(DIM);
    let searcher = VectorSearcher::new(Arc::new(MemoryStore::new()));
    let scope = Scope::new("t9", "nothing-here").expect("scope");
    let q = embedder.embed_text("anything");
    assert!(searcher.search(&scope, &q, 5).await.expect("search").is_empty());
    assert!(matches!(searcher.search(&scope, &q, 0).await, Err(Error::InvalidLimit)));
}

/// A misbehaving store that ignores the scope it is given.
struct LeakyStore(Vec<Chunk>);

#[async_trait]
impl VectorStore for LeakyStore {
    async fn search_similar(&self, _scope: &Scope, _v: &[f32], limit: usize) -> Result<Vec<SimilarChunk>> {
        Ok(self.0.iter().take(limit).map(|c| SimilarChunk { chunk: c.clone(), similarity: 1.5 }).collect())
    }
    async fn full_text_search(&self, _scope: &Scope, _q: &str, _limit: usize) -> Result<Vec<RankedChunk>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn searcher_drops_rows_outside_scope_and_clamps() {
    let embedder = FakeEmbedder::new(DIM);
    let searcher = VectorSearcher::new(Arc::new(LeakyStore(corpus(&embedder))));
    let scope = Scope::new("t2", "brand").expect("scope");
    let results = searcher.search(&scope, &embedder.embed_text("fire"), 10).await.expect("search");
    assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["t2-a", "t2-b"]);
    assert!(results.iter().all(|r| r.scores.vector == 1.0));
}

#[tokio::test]
async fn memory_store_lexical_signals() {
    let embedder = FakeEmbedder::new(DIM);
    let store = MemoryStore::new();
    store.upsert(&corpus(&embedder)).await.expect("upsert");
    let scope = Scope::new("t2", "brand").expect("scope");

    let ft = store.full_text_search(&scope, "fire pit", 10).await.expect("full text");
    assert_eq!(ft[0].chunk.id, "t2-b");
    assert_eq!(ft[0].rank, 2.0);

    let sparse = store.sparse_search(&scope, "fire pit", 10).await.expect("sparse");
    assert_eq!(sparse[0].rank, 1.0);
    assert_eq!(sparse[1].rank, 0.5);

    let unprovisioned = MemoryStore::without_full_text();
    assert!(matches!(unprovisioned.full_text_search(&scope, "fire", 3).await, Err(Error::FullTextUnavailable(_))));
}

#[tokio::test]
async fn memory_store_upsert_replaces_and_delete_scope() {
    let embedder = FakeEmbedder::new(DIM);
    let store = MemoryStore::new();
    store.upsert(&corpus(&embedder)).await.expect("upsert");
    store.upsert(&[chunk(&embedder, "t1-a", "t1", "brand", "replacement text")]).await.expect("replace");
    assert_eq!(store.len(), 5);

    store.delete_scope(&Scope::new("t1", "brand").expect("scope")).await.expect("delete");
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn lance_store_full_flow() {
    let embedder = FakeEmbedder::new(DIM);
    let tmp = TempDir::new().expect("tmp");
    let store = Arc::new(LanceStore::new(tmp.path(), "chunks_test", DIM).await.expect("store"));
    let scope = Scope::new("t1", "brand").expect("scope");
    let searcher = VectorSearcher::new(store.clone());

    // No table yet: an empty namespace, not an error.
    assert!(searcher.search(&scope, &embedder.embed_text("fire"), 5).await.expect("search").is_empty());

    store.upsert(&corpus(&embedder)).await.expect("upsert");
    let results = searcher.search(&scope, &embedder.embed_text("wood stove fire"), 5).await.expect("search");
    eprintln!("Lance: 'wood stove fire' -> {:?}", results.iter().map(|r| (&r.id, r.scores.vector)).collect::<Vec<_>>());
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id, "t1-a");
    assert!(results[0].scores.vector >= results[1].scores.vector);
    assert_eq!(results[0].metadata.get("url").map(String::as_str), Some("https://example.test/t1-a"));

    // Re-upserting an id replaces the row instead of duplicating it.
    store.upsert(&[chunk(&embedder, "t1-b", "t1", "brand", "wood stove fire safety checklist")]).await.expect("replace");
    let results = searcher.search(&scope, &embedder.embed_text("wood stove fire"), 5).await.expect("search");
    assert_eq!(results.len(), 2);

    assert!(matches!(store.full_text_search(&scope, "fire", 5).await, Err(Error::FullTextUnavailable(_))));

    store.delete_scope(&scope).await.expect("delete");
    assert!(searcher.search(&scope, &embedder.embed_text("fire"), 5).await.expect("search").is_empty());
    let other = Scope::new("t2", "brand").expect("scope");
    assert_eq!(searcher.search(&other, &embedder.embed_text("fire"), 5).await.expect("search").len(), 2);
}

#[tokio::test]
async fn memory_store_same_id_in_two_tenants_keeps_both() {
    let embedder = FakeEmbedder::new(DIM);
    let store = MemoryStore::new();
    store.upsert(&[chunk(&embedder, "intro", "t1", "brand", "fire starter kit")]).await.expect("upsert t1");
    store.upsert(&[chunk(&embedder, "intro", "t2", "brand", "fire insurance quotes")]).await.expect("upsert t2");
    assert_eq!(store.len(), 2);

    let t1 = store.full_text_search(&Scope::new("t1", "brand").expect("scope"), "fire", 5).await.expect("search");
    assert_eq!(t1.len(), 1);
    assert_eq!(t1[0].chunk.text, "fire starter kit");
}

#[tokio::test]
async fn lance_store_same_id_in_two_tenants_keeps_both() {
    let embedder = FakeEmbedder::new(DIM);
    let tmp = TempDir::new().expect("tmp");
    let store = Arc::new(LanceStore::new(tmp.path(), "chunks_test", DIM).await.expect("store"));
    let searcher = VectorSearcher::new(store.clone());
    store.upsert(&[chunk(&embedder, "intro", "t1", "brand", "fire starter kit")]).await.expect("upsert t1");
    store.upsert(&[chunk(&embedder, "intro", "t2", "brand", "fire insurance quotes")]).await.expect("upsert t2");

    let query = embedder.embed_text("fire");
    let t1 = searcher.search(&Scope::new("t1", "brand").expect("scope"), &query, 5).await.expect("search");
    let t2 = searcher.search(&Scope::new("t2", "brand").expect("scope"), &query, 5).await.expect("search");
    assert_eq!(t1.len(), 1);
    assert_eq!(t1[0].text, "fire starter kit");
    assert_eq!(t2.len(), 1);
    assert_eq!(t2[0].text, "fire insurance quotes");
}

#[tokio::test]
async fn lance_store_rejects_wrong_dimension() {
    let embedder = FakeEmbedder::new(DIM / 2);
    let tmp = TempDir::new().expect("tmp");
    let store = LanceStore::new(tmp.path(), "chunks_test", DIM).await.expect("store");
    let err = store.upsert(&[chunk(&embedder, "x", "t1", "brand", "short vector")]).await.expect_err("dim mismatch");
    assert!(matches!(err, Error::Store(_)));
}
