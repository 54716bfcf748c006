use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use graphmind_core::{AgentResult, GraphAdapter, GraphMindError, Result, TaskType};
use graphmind_scheduler::TaskJob;

use crate::agent::{Agent, AgentContext, AgentStatusCell, AgentTaskType};
use crate::types::{ConnectionDiscoveryRequest, PathFindingRequest, RelationCluster};

async fn find_paths<G: GraphAdapter>(
    graph: Arc<G>,
    request: PathFindingRequest,
) -> Result<serde_json::Value> {
    let paths = graph
        .find_paths(&request.source_id, &request.target_id, request.max_depth)
        .await?;
    serde_json::to_value(paths).map_err(|e| GraphMindError::Internal(e.to_string()))
}

/// Bounded breadth-first traversal that collects every relation crossed
/// within `max_depth` hops of `entity_id`, then clusters them by type.
async fn discover_connections<G: GraphAdapter>(
    graph: Arc<G>,
    request: ConnectionDiscoveryRequest,
) -> Result<Vec<RelationCluster>> {
    let mut visited_entities: HashSet<String> = HashSet::new();
    visited_entities.insert(request.entity_id.clone());
    let mut visited_relations: HashSet<(String, String, String)> = HashSet::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((request.entity_id.clone(), 0));
    let mut counts: HashMap<String, u64> = HashMap::new();

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= request.max_depth {
            continue;
        }
        let mut relations = graph.outgoing_relations(&current).await?;
        relations.extend(graph.incoming_relations(&current).await?);
        for relation in relations {
            if visited_relations.insert(relation.dedup_key()) {
                *counts.entry(relation.relation_type.clone()).or_insert(0) += 1;
            }
            let other = relation.other_id().to_string();
            if visited_entities.insert(other.clone()) {
                queue.push_back((other, depth + 1));
            }
        }
    }

    let mut clusters: Vec<RelationCluster> = counts
        .into_iter()
        .map(|(relation_type, count)| RelationCluster { relation_type, count })
        .collect();
    clusters.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.relation_type.cmp(&b.relation_type)));
    Ok(clusters)
}

/// Relationship-analysis agent: bounded BFS path finding, plus relation-type
/// clustering for connection discovery and relation summaries (a summary is
/// a connection-discovery pass scoped to one hop).
pub struct RelationshipAnalysisAgent<G> {
    graph: Arc<G>,
    status: AgentStatusCell,
    task_types: Vec<AgentTaskType>,
}

impl<G> RelationshipAnalysisAgent<G>
where
    G: GraphAdapter + 'static,
{
    pub fn new(graph: Arc<G>) -> Self {
        Self {
            graph,
            status: AgentStatusCell::default(),
            task_types: vec![
                AgentTaskType::RelationshipAnalysis,
                AgentTaskType::PathFinding,
                AgentTaskType::ConnectionDiscovery,
                AgentTaskType::RelationSummary,
            ],
        }
    }
}

#[async_trait]
impl<G> Agent for RelationshipAnalysisAgent<G>
where
    G: GraphAdapter + 'static,
{
    fn id(&self) -> &str {
        "relationship-analysis-agent"
    }

    fn display_name(&self) -> &str {
        "Relationship Analysis Agent"
    }

    fn supported_task_types(&self) -> &[AgentTaskType] {
        &self.task_types
    }

    fn status_cell(&self) -> &AgentStatusCell {
        &self.status
    }

    async fn execute(
        &self,
        task_type: AgentTaskType,
        description: &str,
        context: &AgentContext,
    ) -> Result<AgentResult> {
        let start = std::time::Instant::now();
        match task_type {
            AgentTaskType::PathFinding => {
                let request: PathFindingRequest = serde_json::from_str(description)
                    .map_err(|e| GraphMindError::InvalidInput(format!("malformed path_finding request: {e}")))?;
                let job = TaskJob::Io(Box::pin(find_paths(self.graph.clone(), request)));
                context.scheduler.submit(TaskType::GraphQuery, job).await
            }
            AgentTaskType::ConnectionDiscovery | AgentTaskType::RelationshipAnalysis => {
                let mut request: ConnectionDiscoveryRequest = serde_json::from_str(description).map_err(|e| {
                    GraphMindError::InvalidInput(format!("malformed connection discovery request: {e}"))
                })?;
                if task_type == AgentTaskType::RelationshipAnalysis {
                    request.max_depth = request.max_depth.max(2);
                }
                let clusters = discover_connections(self.graph.clone(), request).await?;
                let value = serde_json::to_value(&clusters).map_err(|e| GraphMindError::Internal(e.to_string()))?;
                Ok(AgentResult::ok(value, start.elapsed())
                    .with_metadata("cluster_count", serde_json::json!(clusters.len())))
            }
            AgentTaskType::RelationSummary => {
                let mut request: ConnectionDiscoveryRequest = serde_json::from_str(description)
                    .map_err(|e| GraphMindError::InvalidInput(format!("malformed relation summary request: {e}")))?;
                request.max_depth = 1;
                let clusters = discover_connections(self.graph.clone(), request).await?;
                let value = serde_json::to_value(&clusters).map_err(|e| GraphMindError::Internal(e.to_string()))?;
                Ok(AgentResult::ok(value, start.elapsed()))
            }
            other => Err(GraphMindError::NoAgent(vec![other.as_str().to_string()])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_core::{Direction, Entity, Relation};
    use graphmind_graph::InMemoryGraphAdapter;
    use graphmind_scheduler::TaskScheduler;

    fn fixture() -> Arc<InMemoryGraphAdapter> {
        let graph = InMemoryGraphAdapter::new();
        graph.add_entity(Entity::new("einstein", "Albert Einstein", "Person"));
        graph.add_entity(Entity::new("relativity", "Theory of Relativity", "Concept"));
        graph.add_entity(Entity::new("nobel", "Nobel Prize in Physics", "Award"));
        graph.add_relation(Relation::new("DEVELOPED", "einstein", "relativity", Direction::Outgoing));
        graph.add_relation(Relation::new("WON", "einstein", "nobel", Direction::Outgoing));
        Arc::new(graph)
    }

    fn context() -> AgentContext {
        struct NoopDispatch;
        #[async_trait]
        impl crate::agent::AgentDispatch for NoopDispatch {
            async fn dispatch(
                &self,
                _task_type: AgentTaskType,
                _description: &str,
                _context: &AgentContext,
            ) -> Result<AgentResult> {
                unreachable!("relationship analysis agent never dispatches sub-tasks")
            }
        }
        AgentContext {
            scheduler: TaskScheduler::new(&graphmind_core::ReasoningConfig::default()).unwrap(),
            dispatch: Arc::new(NoopDispatch),
        }
    }

    #[tokio::test]
    async fn path_finding_locates_one_hop_path() {
        let agent = RelationshipAnalysisAgent::new(fixture());
        let description = serde_json::json!({"source_id": "einstein", "target_id": "relativity", "max_depth": 2}).to_string();
        let result = agent
            .execute(AgentTaskType::PathFinding, &description, &context())
            .await
            .unwrap();
        assert!(result.success);
        let paths: Vec<graphmind_core::Path> = serde_json::from_value(result.value.unwrap()).unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[tokio::test]
    async fn connection_discovery_clusters_by_relation_type() {
        let agent = RelationshipAnalysisAgent::new(fixture());
        let description = serde_json::json!({"entity_id": "einstein", "max_depth": 1}).to_string();
        let result = agent
            .execute(AgentTaskType::ConnectionDiscovery, &description, &context())
            .await
            .unwrap();
        let clusters: Vec<RelationCluster> = serde_json::from_value(result.value.unwrap()).unwrap();
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.count == 1));
    }

    #[tokio::test]
    async fn malformed_request_is_invalid_input() {
        let agent = RelationshipAnalysisAgent::new(fixture());
        let err = agent
            .execute(AgentTaskType::PathFinding, "not json", &context())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "INVALID_INPUT");
    }
}
