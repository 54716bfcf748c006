use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide configuration surface. No file or environment parsing —
/// this is a plain struct constructed by the embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Depth cap for the multi-hop reasoner.
    pub max_depth: usize,
    /// Max expansions per layer per entity.
    pub width: usize,
    /// Minimum score for an entity to be kept as a seed.
    pub entity_threshold: f32,
    /// Minimum score for a relation to be traversed.
    pub relation_threshold: f32,
    /// Cap on distinct entities visited per question.
    pub max_entities: usize,
    /// Cap on retained candidate paths.
    pub max_paths: usize,
    /// Deadline for one `reason` call.
    pub wall_clock_budget: Duration,
    /// Forwarded to the LLM client.
    pub temperature: f32,
    /// Forwarded to the LLM client.
    pub max_tokens: usize,
    /// Main pool size; I/O pool = max(2, size / 2).
    pub thread_pool_size: usize,
    /// Bound on the embedding cache's entry count.
    pub embedding_cache_size: usize,
    /// Enables per-query strategy memoization.
    pub strategy_cache_enabled: bool,
    /// Minimum number of high-confidence evidence items for the
    /// "enough evidence" stop condition.
    pub sufficient_evidence_count: usize,
    /// Score threshold an evidence item must clear to count toward
    /// `sufficient_evidence_count`.
    pub sufficient_evidence_score: f32,
    /// Best-path score threshold for the "enough evidence" stop condition.
    pub sufficiency_path_score: f32,
    /// Evidence budget forwarded into the answer-synthesis prompt.
    pub evidence_budget: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            width: 4,
            entity_threshold: 0.4,
            relation_threshold: 0.2,
            max_entities: 100,
            max_paths: 50,
            wall_clock_budget: Duration::from_secs(30),
            temperature: 0.0,
            max_tokens: 512,
            thread_pool_size: num_cpus::get(),
            embedding_cache_size: 10_000,
            strategy_cache_enabled: true,
            sufficient_evidence_count: 3,
            sufficient_evidence_score: 0.6,
            sufficiency_path_score: 0.7,
            evidence_budget: 10,
        }
    }
}

impl ReasoningConfig {
    pub fn io_pool_size(&self) -> usize {
        (self.thread_pool_size / 2).max(2)
    }
}
