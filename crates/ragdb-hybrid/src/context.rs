use ragdb_core::error::Result;
use ragdb_core::types::{FusionWeights, RankedResult, SearchRequest};

use crate::orchestrator::HybridSearchOrchestrator;

#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub limit: usize,
    /// Results whose strongest signal score is below this are left out.
    pub min_relevance: f32,
    /// Whole blocks are dropped once the text would exceed this many characters.
    pub max_chars: Option<usize>,
    pub weights: Option<FusionWeights>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self { limit: 5, min_relevance: 0.5, max_chars: None, weights: None }
    }
}

/// Search and render the survivors as a prompt block. Returns an empty string
/// when nothing relevant is found.
pub async fn generate_context(
    orchestrator: &HybridSearchOrchestrator,
    tenant_id: &str,
    namespace: &str,
    query: &str,
    options: &ContextOptions,
) -> Result<String> {
    let mut request = SearchRequest::new(tenant_id, namespace, query, options.limit);
    request.weights = options.weights;
    let results = orchestrator.search(&request).await?;
    Ok(format_context(&results, options))
}

/// `[Context N - <source type>]` followed by the chunk text, blocks separated by a blank line.
pub fn format_context(results: &[RankedResult], options: &ContextOptions) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    let mut n = 0usize;
    for result in results.iter().filter(|r| r.scores.best_signal() >= options.min_relevance) {
        let block = format!("[Context {} - {}]\n{}", n + 1, result.source_type, result.text);
        let separator = if n == 0 { 0 } else { 2 };
        let cost = block.chars().count() + separator;
        if options.max_chars.is_some_and(|max| used + cost > max) {
            break;
        }
        if n > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&block);
        used += cost;
        n += 1;
    }
    out
}
