//! In-process embedding cache keyed by `blake3(model_id, text)`.
//!
//! The cache is consulted prior to calling the provider and written through on
//! misses. Misses of one call are sent to the provider as a single batch; a
//! failed batch caches nothing.

use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;

use crate::ensure_non_empty;

pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl CachedEmbedder {
    /// Returns `None` when `capacity` is zero.
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self { inner, cache: Mutex::new(LruCache::new(capacity)) })
    }

    fn key(&self, text: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.inner.model_id().as_bytes());
        hasher.update(&[0]);
        hasher.update(text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, Vec<f32>>>> {
        self.cache.lock().map_err(|_| Error::EmbeddingProvider("embedding cache lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dim(&self) -> usize {
        self.inner.dim()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        ensure_non_empty(texts)?;
        let keys: Vec<String> = texts.iter().map(|t| self.key(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = {
            let mut cache = self.lock()?;
            keys.iter().map(|k| cache.get(k).cloned()).collect()
        };

        let missing: Vec<usize> = out.iter().enumerate().filter(|(_, v)| v.is_none()).map(|(i, _)| i).collect();
        if !missing.is_empty() {
            let miss_texts: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed_batch(&miss_texts).await?;
            if fresh.len() != miss_texts.len() {
                return Err(Error::EmbeddingProvider(format!(
                    "expected {} embeddings, provider returned {}",
                    miss_texts.len(),
                    fresh.len()
                )));
            }
            let mut cache = self.lock()?;
            for (&i, vector) in missing.iter().zip(fresh) {
                cache.put(keys[i].clone(), vector.clone());
                out[i] = Some(vector);
            }
            tracing::debug!(hits = texts.len() - missing.len(), misses = missing.len(), "embedding cache");
        }

        out.into_iter()
            .map(|v| v.ok_or_else(|| Error::EmbeddingProvider("embedding missing after cache fill".to_string())))
            .collect()
    }
}
