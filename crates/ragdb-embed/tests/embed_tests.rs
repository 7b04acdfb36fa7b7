use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;
use ragdb_embed::{get_default_embedder, CachedEmbedder, FakeEmbedder, OpenAiEmbedder};

/// Counts how many texts reach the wrapped embedder.
struct Counting {
    inner: FakeEmbedder,
    texts_seen: AtomicUsize,
}

#[async_trait]
impl Embedder for Counting {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
    fn dim(&self) -> usize {
        self.inner.dim()
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.texts_seen.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts).await
    }
}

#[tokio::test]
async fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { use_fake: true, cache_capacity: 0, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let v1 = embedder.embed("hello world").await.expect("embed");
    let v2 = embedder.embed("hello world").await.expect("embed");

    assert_eq!(v1.len(), 1536, "embedding dim is 1536");
    assert_eq!(v1.len(), v2.len());
    assert_eq!(v1[0], v2[0], "same leading value");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[tokio::test]
async fn empty_text_fails_fast() {
    let embedder = FakeEmbedder::new(8);
    assert!(matches!(embedder.embed("").await, Err(Error::EmbeddingProvider(_))));
    assert!(matches!(embedder.embed("   \n").await, Err(Error::EmbeddingProvider(_))));
    let batch = vec!["fine".to_string(), String::new()];
    assert!(embedder.embed_batch(&batch).await.is_err(), "one empty element fails the batch");
}

#[tokio::test]
async fn batch_preserves_input_order() {
    let embedder = FakeEmbedder::new(32);
    let texts = vec!["alpha".to_string(), "bravo charlie".to_string(), "delta".to_string()];
    let batch = embedder.embed_batch(&texts).await.expect("batch");
    assert_eq!(batch.len(), 3);
    for (text, vector) in texts.iter().zip(&batch) {
        assert_eq!(&embedder.embed(text).await.expect("single"), vector);
    }
}

#[tokio::test]
async fn cache_only_forwards_misses() {
    let counting = Arc::new(Counting { inner: FakeEmbedder::new(16), texts_seen: AtomicUsize::new(0) });
    let cached = CachedEmbedder::new(counting.clone(), 10).expect("capacity > 0");

    let first = cached.embed_batch(&["a b".to_string(), "c d".to_string()]).await.expect("first");
    assert_eq!(counting.texts_seen.load(Ordering::SeqCst), 2);

    let second = cached.embed_batch(&["c d".to_string(), "e f".to_string(), "a b".to_string()]).await.expect("second");
    assert_eq!(counting.texts_seen.load(Ordering::SeqCst), 3, "only 'e f' was a miss");
    assert_eq!(second[0], first[1]);
    assert_eq!(second[2], first[0]);
    assert_eq!(cached.len(), 3);
}

#[test]
fn zero_capacity_disables_cache() {
    assert!(CachedEmbedder::new(Arc::new(FakeEmbedder::new(4)), 0).is_none());
}

#[tokio::test]
async fn http_embedder_without_key_fails_without_network() {
    let embedder = OpenAiEmbedder::new(&EmbeddingSettings::default()).expect("client");
    let err = embedder.embed("query").await.expect_err("no key");
    assert!(matches!(err, Error::EmbeddingProvider(m) if m.contains("API key")));
}

#[tokio::test]
async fn http_embedder_unreachable_endpoint_is_provider_error() {
    let settings = EmbeddingSettings {
        api_key: Some("sk-test".to_string()),
        base_url: "http://127.0.0.1:9/v1/embeddings".to_string(),
        max_retries: 1,
        timeout_ms: 500,
        ..EmbeddingSettings::default()
    };
    let embedder = OpenAiEmbedder::new(&settings).expect("client");
    let err = embedder.embed_batch(&["one".to_string(), "two".to_string()]).await.expect_err("unreachable");
    assert!(matches!(err, Error::EmbeddingProvider(_)), "got {err:?}");
}
