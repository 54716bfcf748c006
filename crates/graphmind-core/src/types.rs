use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A scalar property value. Kept as a small closed enum (rather than
/// `serde_json::Value`) so the core crate stays dependency-light while still
/// covering the "heterogeneous scalar/string" properties the data model
/// calls for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl PropertyValue {
    /// Stringified representation used when building textual
    /// representations for semantic scoring.
    pub fn as_display_string(&self) -> String {
        match self {
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Number(n) => n.to_string(),
            PropertyValue::Bool(b) => b.to_string(),
            PropertyValue::Null => String::new(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display_string())
    }
}

/// A node in the property graph.
///
/// Invariant: identifier uniquely determines equality — two `Entity` values
/// with equal `id` must refer to the same graph node. `PartialEq`/`Eq`/
/// `Hash` are therefore keyed on `id` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub properties: HashMap<String, PropertyValue>,
}

impl Entity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            entity_type: entity_type.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Textual representation used by the semantic search engine: name,
    /// type, then each non-identifier-like property name followed by its
    /// stringified value, in insertion order for determinism.
    pub fn textual_representation(&self) -> String {
        let mut parts = vec![self.name.clone(), self.entity_type.clone()];
        let mut keys: Vec<&String> = self.properties.keys().collect();
        keys.sort();
        for key in keys {
            if is_identifier_like(key) {
                continue;
            }
            if let Some(value) = self.properties.get(key) {
                parts.push(key.clone());
                parts.push(value.as_display_string());
            }
        }
        parts.join(" ")
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Entity {}
impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

fn is_identifier_like(key: &str) -> bool {
    let lower = key.to_lowercase();
    lower == "id" || lower.ends_with("_id") || lower == "identifier"
}

/// Direction of a relation relative to a traversal's focal entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// An edge in the property graph.
///
/// Invariant: `source_id`/`target_id` must reference nodes known to the
/// graph store at the time of retrieval (enforced by the adapter, not this
/// type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub relation_type: String,
    pub source_id: String,
    pub target_id: String,
    pub direction: Direction,
    pub properties: HashMap<String, PropertyValue>,
    /// Relevance score assigned during scoring; 0.0 when unscored.
    pub score: f32,
}

impl Relation {
    pub fn new(
        relation_type: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            relation_type: relation_type.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            direction,
            properties: HashMap::new(),
            score: 0.0,
        }
    }

    /// (type, source, target): stable across graph-store restarts that reuse
    /// opaque identifiers in a way an identifier-only key would not be.
    pub fn dedup_key(&self) -> (String, String, String) {
        (
            self.relation_type.clone(),
            self.source_id.clone(),
            self.target_id.clone(),
        )
    }

    /// The "other side" identifier of this relation from the perspective of
    /// the entity the traversal expanded from.
    pub fn other_id(&self) -> &str {
        match self.direction {
            Direction::Outgoing => &self.target_id,
            Direction::Incoming => &self.source_id,
        }
    }
}

/// One step of a `Path`: an entity, and (except for the first step) the
/// relation that was traversed to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathStep {
    pub entity: Entity,
    pub relation: Option<Relation>,
}

/// An ordered sequence of alternating entities and relations, starting and
/// ending in entities. Length = number of relations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Path {
    pub steps: Vec<PathStep>,
}

impl Path {
    pub fn seed(entity: Entity) -> Self {
        Self {
            steps: vec![PathStep {
                entity,
                relation: None,
            }],
        }
    }

    pub fn length(&self) -> usize {
        self.steps.iter().filter(|s| s.relation.is_some()).count()
    }

    pub fn extend(&self, relation: Relation, entity: Entity) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep {
            entity,
            relation: Some(relation),
        });
        Self { steps }
    }

    pub fn last_entity(&self) -> &Entity {
        &self.steps.last().expect("path always has >= 1 step").entity
    }

    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.steps.iter().any(|s| s.entity.id == entity_id)
    }

    /// Product of per-step relation scores (aggregate score is a product,
    /// not an average, so a single weak hop drags down the whole path).
    pub fn aggregate_score(&self) -> f32 {
        self.steps
            .iter()
            .filter_map(|s| s.relation.as_ref().map(|r| r.score))
            .product()
    }
}

// ---------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTypeDescriptor {
    pub name: String,
    pub count: u64,
    pub property_frequency: HashMap<String, u64>,
    pub sample_values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionPattern {
    pub source_type: String,
    pub target_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipTypeDescriptor {
    pub name: String,
    pub count: u64,
    pub connection_patterns: Vec<ConnectionPattern>,
    pub property_frequency: HashMap<String, u64>,
}

/// Schema discovered from the graph store. Created on first call to the
/// analyzer, cached for the engine's lifetime until an explicit reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub node_types: HashMap<String, NodeTypeDescriptor>,
    pub relationship_types: HashMap<String, RelationshipTypeDescriptor>,
}

impl Schema {
    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty() && self.relationship_types.is_empty()
    }
}

/// Recommended property to search on for a given node type, ranked by
/// `(name similarity to query) * (frequency weight)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyRecommendation {
    pub property: String,
    pub weight: f32,
}

/// Mapping from node/relationship type to relevance weight, plus
/// per-type recommended search properties, produced per distinct
/// question-or-normalized-query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStrategy {
    pub node_type_weights: HashMap<String, f32>,
    pub relationship_type_weights: HashMap<String, f32>,
    pub recommended_properties: HashMap<String, Vec<PropertyRecommendation>>,
    pub confidence: f32,
}

// ---------------------------------------------------------------------
// Reasoning plan
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    EntityIdentification,
    RelationExploration,
    SimilarityCalculation,
    EvidenceCollection,
    AnswerGeneration,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    Sequential,
    Adaptive,
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: String,
    pub step_type: StepType,
    pub dependencies: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningPlan {
    pub steps: Vec<PlanStep>,
    pub strategy: ExecutionStrategy,
}

impl ReasoningPlan {
    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Validates that the dependency graph is acyclic, every dependency
    /// identifier refers to an earlier step, and every step type is in the
    /// closed tag set (guaranteed here by the `enum` itself, so only the DAG
    /// shape needs checking).
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
        for step in &self.steps {
            for dep in &step.dependencies {
                if !seen.contains(dep.as_str()) {
                    return Err(format!(
                        "step '{}' depends on '{}' which has not appeared earlier in the plan",
                        step.id, dep
                    ));
                }
            }
            seen.insert(step.id.as_str());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Evidence, reasoning context, and results
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub description: String,
    pub score: f32,
    pub depth: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Per-question mutable accumulator. Owned by the reasoner task that
/// coordinates a single question; mutated only through its methods, which
/// makes it a single-writer reducer rather than a shared mutable map.
#[derive(Debug, Default)]
pub struct ReasoningContext {
    pub entities_by_depth: HashMap<usize, Vec<Entity>>,
    pub visited_relations: std::collections::HashSet<(String, String, String)>,
    pub evidence: Vec<Evidence>,
    pub warnings: Vec<String>,
    pub entities_explored: usize,
    pub relations_visited: usize,
    pub start: Option<std::time::Instant>,
}

impl ReasoningContext {
    pub fn new() -> Self {
        Self {
            start: Some(std::time::Instant::now()),
            ..Default::default()
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn record_entity(&mut self, depth: usize, entity: Entity) {
        self.entities_by_depth.entry(depth).or_default().push(entity);
        self.entities_explored += 1;
    }

    /// Returns `true` if this is the first time this (type, source, target)
    /// tuple has been visited.
    pub fn mark_relation_visited(&mut self, relation: &Relation) -> bool {
        let inserted = self.visited_relations.insert(relation.dedup_key());
        if inserted {
            self.relations_visited += 1;
        }
        inserted
    }

    pub fn push_evidence(&mut self, evidence: Evidence) {
        self.evidence.push(evidence);
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn total_entities_explored(&self) -> usize {
        self.entities_explored
    }
}

/// Diagnostic trace attached to a `ReasoningResult`: which planner steps
/// ran, how long each took, and which stop condition ended the traversal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticTrace {
    pub step_timings_ms: Vec<(String, u64)>,
    pub stop_condition: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub question: String,
    pub answer: String,
    pub evidence: Vec<Evidence>,
    pub paths: Vec<Path>,
    pub confidence: f32,
    pub elapsed: std::time::Duration,
    pub warnings: Vec<String>,
    pub trace: DiagnosticTrace,
}

// ---------------------------------------------------------------------
// Scheduler task types
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    EntityIdentification,
    GraphQuery,
    Embedding,
    Traversal,
    PathScoring,
    ResultAggregation,
    LlmGeneration,
}

impl TaskType {
    /// GRAPH_QUERY and EMBEDDING dispatch to the I/O pool; everything else
    /// dispatches to the main pool.
    pub fn is_io_bound(self) -> bool {
        matches!(self, TaskType::GraphQuery | TaskType::Embedding)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::EntityIdentification => "entity_identification",
            TaskType::GraphQuery => "graph_query",
            TaskType::Embedding => "embedding",
            TaskType::Traversal => "traversal",
            TaskType::PathScoring => "path_scoring",
            TaskType::ResultAggregation => "result_aggregation",
            TaskType::LlmGeneration => "llm_generation",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Submitted,
    WaitingOnDependencies,
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
}

/// Result of a single agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub value: Option<serde_json::Value>,
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub elapsed: std::time::Duration,
}

impl AgentResult {
    pub fn ok(value: serde_json::Value, elapsed: std::time::Duration) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
            metadata: HashMap::new(),
            elapsed,
        }
    }

    pub fn failure(error: impl Into<String>, elapsed: std::time::Duration) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.into()),
            metadata: HashMap::new(),
            elapsed,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
