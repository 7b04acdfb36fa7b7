use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use ragdb_core::error::Error;
use ragdb_core::traits::{ChunkWriter, TextIndexer};
use ragdb_core::types::{Chunk, Scope, SourceType};
use ragdb_embed::FakeEmbedder;
use ragdb_text::{FullTextSearcher, SparseSearcher, TantivyIndexer};
use ragdb_vector::{LanceStore, MemoryStore};

const DIM: usize = 32;

fn chunk(id: &str, tenant: &str, namespace: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        tenant_id: tenant.to_string(),
        namespace: namespace.to_string(),
        source_type: SourceType::Profile,
        metadata: HashMap::from([("type".to_string(), "note".to_string())]),
        embedding: FakeEmbedder::new(DIM).embed_text(text),
    }
}

fn corpus() -> Vec<Chunk> {
    vec![
        chunk("a", "t1", "brand", "firecraft basics: building a fire in the rain"),
        chunk("b", "t1", "brand", "solar panels for an off-grid cabin"),
        chunk("c", "t1", "blog", "fire safety around wood stoves"),
        chunk("d", "t2", "brand", "fire fire fire everywhere"),
    ]
}

#[test]
fn tantivy_search_is_scoped() {
    let indexer = TantivyIndexer::create_in_ram().expect("indexer");
    indexer.index(&corpus()).expect("index");
    assert_eq!(indexer.num_docs(), 4);

    let scope = Scope::new("t1", "brand").expect("scope");
    let hits = indexer.search(&scope, "fire", 10).expect("search");
    eprintln!("Tantivy: 'fire' in t1/brand -> {:?}", hits.iter().map(|h| (&h.chunk.id, h.rank)).collect::<Vec<_>>());
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.id, "a");
    assert_eq!(hits[0].chunk.metadata.get("type").map(String::as_str), Some("note"));
    assert!(hits[0].rank > 0.0);

    assert!(indexer.search(&Scope::new("t3", "brand").expect("scope"), "fire", 10).expect("search").is_empty());
}

#[test]
fn tantivy_same_id_in_two_tenants_keeps_both() {
    let indexer = TantivyIndexer::create_in_ram().expect("indexer");
    indexer.index(&[chunk("intro", "t1", "brand", "fire starter kit")]).expect("index t1");
    indexer.index(&[chunk("intro", "t2", "brand", "fire insurance quotes")]).expect("index t2");
    assert_eq!(indexer.num_docs(), 2);

    let t1 = indexer.search(&Scope::new("t1", "brand").expect("scope"), "fire", 10).expect("search");
    let t2 = indexer.search(&Scope::new("t2", "brand").expect("scope"), "fire", 10).expect("search");
    assert_eq!(t1.len(), 1);
    assert_eq!(t1[0].chunk.text, "fire starter kit");
    assert_eq!(t2.len(), 1);
    assert_eq!(t2[0].chunk.text, "fire insurance quotes");
}

#[test]
fn tantivy_reindex_replaces_and_delete_scope_removes() {
    let indexer = TantivyIndexer::create_in_ram().expect("indexer");
    indexer.index(&corpus()).expect("index");
    indexer.index(&[chunk("b", "t1", "brand", "fire pit for an off-grid cabin")]).expect("reindex");
    assert_eq!(indexer.num_docs(), 4);

    let scope = Scope::new("t1", "brand").expect("scope");
    assert_eq!(indexer.search(&scope, "fire", 10).expect("search").len(), 2);

    indexer.delete_scope(&scope).expect("delete");
    assert!(indexer.search(&scope, "fire", 10).expect("search").is_empty());
    assert_eq!(indexer.num_docs(), 2);
}

#[test]
fn malformed_query_is_parsed_leniently() {
    let indexer = TantivyIndexer::create_in_ram().expect("indexer");
    indexer.index(&corpus()).expect("index");
    let scope = Scope::new("t1", "brand").expect("scope");
    let hits = indexer.search(&scope, "\"solar AND (", 10).expect("lenient");
    assert!(hits.iter().all(|h| h.chunk.belongs_to(&scope)));
    assert!(indexer.search(&scope, "   ", 10).expect("blank").is_empty());
}

#[test]
fn on_disk_index_survives_reopen() {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("tantivy");
    {
        let indexer = TantivyIndexer::open_or_create(&dir).expect("create");
        indexer.index(&corpus()).expect("index");
    }
    let reopened = TantivyIndexer::open_or_create(&dir).expect("reopen");
    assert_eq!(reopened.num_docs(), 4);
}

#[tokio::test]
async fn full_text_searcher_over_lance_with_attached_index() {
    let tmp = TempDir::new().expect("tmp");
    let store = LanceStore::new(&tmp.path().join("lancedb"), "chunks", DIM)
        .await
        .expect("store")
        .with_text_index(Arc::new(TantivyIndexer::create_in_ram().expect("indexer")));
    store.upsert(&corpus()).await.expect("upsert");

    let searcher = FullTextSearcher::new(Arc::new(store));
    let scope = Scope::new("t1", "blog").expect("scope");
    let results = searcher.search(&scope, "wood stoves", 5).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "c");
    assert_eq!(results[0].scores.full_text, 1.0);
    assert_eq!(results[0].scores.combined, 1.0);
}

#[tokio::test]
async fn unavailable_full_text_is_zero_results() {
    let store = MemoryStore::without_full_text();
    store.upsert(&corpus()).await.expect("upsert");
    let searcher = FullTextSearcher::new(Arc::new(store));
    let scope = Scope::new("t1", "brand").expect("scope");
    assert!(searcher.search(&scope, "fire", 5).await.expect("degraded").is_empty());
    assert!(matches!(searcher.search(&scope, "fire", 0).await, Err(Error::InvalidLimit)));
}

#[tokio::test]
async fn sparse_searcher_normalizes_coverage() {
    let store = MemoryStore::new();
    store.upsert(&corpus()).await.expect("upsert");
    let searcher = SparseSearcher::new(Arc::new(store));
    let scope = Scope::new("t1", "brand").expect("scope");
    let results = searcher.search(&scope, "fire cabin rain", 5).await.expect("sparse");
    // "a" covers fire+rain, "b" covers cabin.
    assert_eq!(results.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(results[0].scores.sparse, 1.0);
    assert!((results[1].scores.sparse - 0.5).abs() < 1e-6);
}
