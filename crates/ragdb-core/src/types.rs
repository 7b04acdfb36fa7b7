//! Domain types used by the embedding, storage and fusion layers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Allowed distance of a weight sum from 1.0.
pub const WEIGHT_SUM_EPSILON: f64 = 0.01;

/// Where a chunk's text originally came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Profile,
    Context,
    Pdf,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Context => "context",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "profile" => Ok(Self::Profile),
            "context" => Ok(Self::Context),
            "pdf" => Ok(Self::Pdf),
            other => Err(Error::UnknownSourceType(other.to_string())),
        }
    }
}

/// An immutable unit of retrievable text.
///
/// - `id`: stable chunk identifier, unique within its scope
/// - `tenant_id`/`namespace`: the owning scope; every read is filtered on both
/// - `metadata`: free-form provenance such as an originating URL
/// - `embedding`: dense vector, empty when the store does not return it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub tenant_id: String,
    pub namespace: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub metadata: Meta,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn belongs_to(&self, scope: &Scope) -> bool {
        self.tenant_id == scope.tenant() && self.namespace == scope.namespace()
    }
}

/// A validated (tenant, namespace) pair. Cannot be built with empty parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Scope {
    tenant: String,
    namespace: String,
}

impl Scope {
    pub fn new(tenant: impl Into<String>, namespace: impl Into<String>) -> Result<Self> {
        let tenant = tenant.into();
        let namespace = namespace.into();
        if tenant.trim().is_empty() {
            return Err(Error::MissingScope("tenant"));
        }
        if namespace.trim().is_empty() {
            return Err(Error::MissingScope("namespace"));
        }
        Ok(Self { tenant, namespace })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.namespace)
    }
}

/// A retrieval signal that can contribute to a fused ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Vector,
    Sparse,
    FullText,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vector => f.write_str("vector"),
            Self::Sparse => f.write_str("sparse"),
            Self::FullText => f.write_str("full_text"),
        }
    }
}

/// Independently tracked sub-scores of one result.
///
/// `vector`, `sparse` and `full_text` lie in [0, 1] and are 0 when that signal
/// did not find the chunk. `combined` is the fusion or rerank output and is only
/// comparable within a single response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub vector: f32,
    pub sparse: f32,
    pub full_text: f32,
    pub combined: f32,
}

impl Scores {
    pub fn set_signal(&mut self, signal: Signal, value: f32) {
        match signal {
            Signal::Vector => self.vector = value,
            Signal::Sparse => self.sparse = value,
            Signal::FullText => self.full_text = value,
        }
    }

    /// Keep the strongest observation per signal. `combined` is left alone.
    pub fn merge_max(&mut self, other: &Scores) {
        self.vector = self.vector.max(other.vector);
        self.sparse = self.sparse.max(other.sparse);
        self.full_text = self.full_text.max(other.full_text);
    }

    /// Strongest individual signal score.
    pub fn best_signal(&self) -> f32 {
        self.vector.max(self.sparse).max(self.full_text)
    }
}

/// One entry of a per-query ranked list. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: ChunkId,
    pub text: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub metadata: Meta,
    pub scores: Scores,
}

impl RankedResult {
    /// Build a single-signal result; `combined` starts out equal to that signal's score.
    pub fn from_chunk(chunk: Chunk, signal: Signal, score: f32) -> Self {
        let mut scores = Scores::default();
        scores.set_signal(signal, score);
        scores.combined = score;
        Self { id: chunk.id, text: chunk.text, source_type: chunk.source_type, metadata: chunk.metadata, scores }
    }
}

/// Relative importance of each signal during fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    pub vector: f32,
    pub sparse: f32,
    pub full_text: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { vector: 0.7, sparse: 0.0, full_text: 0.3 }
    }
}

impl FusionWeights {
    pub fn new(vector: f32, sparse: f32, full_text: f32) -> Self {
        Self { vector, sparse, full_text }
    }

    pub fn sum(&self) -> f64 {
        f64::from(self.vector) + f64::from(self.sparse) + f64::from(self.full_text)
    }

    pub fn weight(&self, signal: Signal) -> f32 {
        match signal {
            Signal::Vector => self.vector,
            Signal::Sparse => self.sparse,
            Signal::FullText => self.full_text,
        }
    }

    /// Weights must be finite, non-negative and sum to 1.0 ± [`WEIGHT_SUM_EPSILON`].
    /// Violations are never normalised away.
    pub fn validate(&self) -> Result<()> {
        let parts = [self.vector, self.sparse, self.full_text];
        let sum = self.sum();
        if parts.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(Error::InvalidWeights { sum });
        }
        // f32 inputs such as 1.01 land a hair above the bound once widened.
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON + 1e-6 {
            return Err(Error::InvalidWeights { sum });
        }
        Ok(())
    }
}

/// A caller's search. `weights: None` means the configured defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub tenant_id: String,
    pub namespace: String,
    pub query: String,
    pub limit: usize,
    #[serde(default)]
    pub weights: Option<FusionWeights>,
}

impl SearchRequest {
    pub fn new(tenant_id: impl Into<String>, namespace: impl Into<String>, query: impl Into<String>, limit: usize) -> Self {
        Self { tenant_id: tenant_id.into(), namespace: namespace.into(), query: query.into(), limit, weights: None }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn scope(&self) -> Result<Scope> {
        Scope::new(self.tenant_id.clone(), self.namespace.clone())
    }
}

/// Row returned by a dense similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarChunk {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Row returned by a lexical (full-text or sparse) search; `rank` is engine specific.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub rank: f32,
}

/// Provider answer for one reranked document: its input position and relevance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankScore {
    pub index: usize,
    pub score: f32,
}
