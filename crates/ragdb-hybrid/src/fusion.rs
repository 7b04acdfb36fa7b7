//! Weighted reciprocal rank fusion.
//!
//! Each list contributes `weight / (k + rank + 1)` per document (zero-based
//! rank). Contributions are summed into `combined`; per-signal sub-scores of a
//! document seen by several lists keep their maximum.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use ragdb_core::types::{ChunkId, RankedResult, Signal};

pub const DEFAULT_RRF_K: f32 = 60.0;

/// One signal's ranked candidates, best first.
#[derive(Debug, Clone)]
pub struct RankedList {
    pub signal: Signal,
    pub weight: f32,
    pub results: Vec<RankedResult>,
}

impl RankedList {
    pub fn new(signal: Signal, weight: f32, results: Vec<RankedResult>) -> Self {
        Self { signal, weight, results }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fuser {
    k: f32,
}

impl Default for Fuser {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

impl Fuser {
    pub fn new(k: f32) -> Self {
        Self { k }
    }

    /// Fuse `lists` into at most `limit` results ordered by descending RRF score.
    ///
    /// Ties keep first-appearance order. Lists with a zero (or non-finite)
    /// weight contribute nothing, and only the first occurrence of an id within
    /// one list is counted.
    pub fn fuse(&self, lists: &[RankedList], limit: usize) -> Vec<RankedResult> {
        let mut fused: Vec<RankedResult> = Vec::new();
        let mut position: HashMap<ChunkId, usize> = HashMap::new();

        for list in lists {
            if !(list.weight.is_finite() && list.weight > 0.0) {
                continue;
            }
            let mut seen: HashSet<&str> = HashSet::with_capacity(list.results.len());
            for (rank, result) in list.results.iter().enumerate() {
                if !seen.insert(result.id.as_str()) {
                    continue;
                }
                let contribution = list.weight / (self.k + rank as f32 + 1.0);
                match position.get(&result.id) {
                    Some(&i) => {
                        let entry = &mut fused[i];
                        entry.scores.merge_max(&result.scores);
                        entry.scores.combined += contribution;
                    }
                    None => {
                        let mut entry = result.clone();
                        entry.scores.combined = contribution;
                        position.insert(result.id.clone(), fused.len());
                        fused.push(entry);
                    }
                }
            }
        }

        fused.sort_by(|a, b| b.scores.combined.partial_cmp(&a.scores.combined).unwrap_or(Ordering::Equal));
        fused.truncate(limit);
        fused
    }
}
