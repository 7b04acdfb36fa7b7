#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod context;
pub mod fusion;
pub mod orchestrator;
pub mod rerank;

pub use context::{format_context, generate_context, ContextOptions};
pub use fusion::{Fuser, RankedList, DEFAULT_RRF_K};
pub use orchestrator::{HybridSearchOrchestrator, SearchOptions, SearchPath, SearchReport};
pub use rerank::{HttpRerankProvider, RerankOutcome, RerankResult, Reranker};
