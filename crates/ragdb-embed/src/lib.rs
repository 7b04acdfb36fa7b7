//! ragdb-embed
//!
//! Embedder implementations: an OpenAI-compatible HTTP provider, a
//! deterministic fake for tests and offline development, and an LRU cache
//! wrapper. `get_default_embedder` picks one from configuration.
//!
//! Empty or whitespace-only text is rejected by every embedder here before any
//! provider call is made.

#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod cache;
pub mod fake;
pub mod http;

use std::sync::Arc;

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;

pub use cache::CachedEmbedder;
pub use fake::FakeEmbedder;
pub use http::OpenAiEmbedder;

/// Reject empty input up front; providers disagree on what it means.
pub fn ensure_non_empty(texts: &[String]) -> Result<()> {
    if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
        return Err(Error::EmbeddingProvider(format!("cannot embed empty text (batch position {pos})")));
    }
    Ok(())
}

/// Build the configured embedder, wrapped in a cache when `cache_capacity > 0`.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` (or `embedding.use_fake`) selects [`FakeEmbedder`].
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = settings.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS")
            .ok()
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    let inner: Arc<dyn Embedder> = if use_fake {
        tracing::info!(dim = settings.dimension, "using fake embedder");
        Arc::new(FakeEmbedder::new(settings.dimension))
    } else {
        Arc::new(OpenAiEmbedder::new(settings)?)
    };
    Ok(match CachedEmbedder::new(Arc::clone(&inner), settings.cache_capacity) {
        Some(cached) => Arc::new(cached),
        None => inner,
    })
}
