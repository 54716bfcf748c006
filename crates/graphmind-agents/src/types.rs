use graphmind_core::Entity;
use serde::{Deserialize, Serialize};

/// An entity paired with the score a search strategy assigned it. The wire
/// shape agents pass through `AgentResult.value`, since the scheduler's
/// job boundary is `serde_json::Value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub entity: Entity,
    pub score: f32,
}

/// Structured request for `AgentTaskType::PathFinding`, JSON-encoded into
/// the `description` string.
#[derive(Debug, Clone, Deserialize)]
pub struct PathFindingRequest {
    pub source_id: String,
    pub target_id: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

/// Structured request for `AgentTaskType::ConnectionDiscovery` and
/// `AgentTaskType::RelationSummary`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDiscoveryRequest {
    pub entity_id: String,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    2
}

/// Count of relations sharing a `relation_type`, as reported by
/// connection discovery / relation summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationCluster {
    pub relation_type: String,
    pub count: u64,
}
