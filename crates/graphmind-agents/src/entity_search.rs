use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graphmind_core::{AgentResult, EmbeddingClient, GraphAdapter, GraphMindError, Result, TaskType};
use graphmind_scheduler::TaskJob;
use graphmind_search::SemanticSearchEngine;

use crate::agent::{Agent, AgentContext, AgentStatusCell, AgentTaskType};
use crate::types::ScoredEntity;

const PARTIAL_MATCH_DISCOUNT: f32 = 0.75;
const SINGLE_CHAR_SCORE: f32 = 0.5;
const STRATEGY_FETCH_LIMIT: usize = 20;

async fn exact_match_strategy<G: GraphAdapter>(graph: Arc<G>, query: String) -> Result<serde_json::Value> {
    let needle = query.trim().to_lowercase();
    let hits = graph.search_entities_by_name(&query, STRATEGY_FETCH_LIMIT).await?;
    let scored: Vec<ScoredEntity> = hits
        .into_iter()
        .filter(|e| e.name.to_lowercase() == needle)
        .map(|entity| ScoredEntity { entity, score: 1.0 })
        .collect();
    serde_json::to_value(scored).map_err(|e| GraphMindError::Internal(e.to_string()))
}

async fn partial_match_strategy<G: GraphAdapter>(graph: Arc<G>, query: String) -> Result<serde_json::Value> {
    let needle = query.trim().to_lowercase();
    let hits = graph.search_entities_by_name(&query, STRATEGY_FETCH_LIMIT).await?;
    let scored: Vec<ScoredEntity> = hits
        .into_iter()
        .filter(|e| e.name.to_lowercase() != needle && e.name.to_lowercase().contains(&needle))
        .map(|entity| ScoredEntity {
            entity,
            score: PARTIAL_MATCH_DISCOUNT,
        })
        .collect();
    serde_json::to_value(scored).map_err(|e| GraphMindError::Internal(e.to_string()))
}

/// Matches on a single character, the case ideographic scripts (CJK) need:
/// a one-character query is meaningful there in a way it rarely is for
/// space-delimited languages.
async fn single_char_strategy<G: GraphAdapter>(graph: Arc<G>, query: String) -> Result<serde_json::Value> {
    if query.trim().chars().count() != 1 {
        return Ok(serde_json::to_value(Vec::<ScoredEntity>::new()).unwrap());
    }
    let hits = graph.search_entities_by_name(&query, STRATEGY_FETCH_LIMIT).await?;
    let scored: Vec<ScoredEntity> = hits
        .into_iter()
        .map(|entity| ScoredEntity {
            entity,
            score: SINGLE_CHAR_SCORE,
        })
        .collect();
    serde_json::to_value(scored).map_err(|e| GraphMindError::Internal(e.to_string()))
}

async fn vector_similarity_strategy<G: GraphAdapter, E: EmbeddingClient>(
    search: Arc<SemanticSearchEngine<G, E>>,
    query: String,
) -> Result<serde_json::Value> {
    let hits = search.search_entities(&query, None, STRATEGY_FETCH_LIMIT).await?;
    let mut resolved = Vec::with_capacity(hits.len());
    for entity in hits {
        let score = search
            .calculate_similarity(&query, &entity.textual_representation())
            .await
            .max(0.0);
        resolved.push(ScoredEntity { entity, score });
    }
    serde_json::to_value(resolved).map_err(|e| GraphMindError::Internal(e.to_string()))
}

/// Entity-search agent: runs exact-match, partial-match,
/// single-character, and vector-similarity strategies concurrently through
/// the scheduler's I/O pool and merges hits by entity id, keeping the
/// maximum score any strategy assigned.
pub struct EntitySearchAgent<G, E> {
    graph: Arc<G>,
    search: Arc<SemanticSearchEngine<G, E>>,
    status: AgentStatusCell,
    task_types: Vec<AgentTaskType>,
}

impl<G, E> EntitySearchAgent<G, E>
where
    G: GraphAdapter + 'static,
    E: EmbeddingClient + 'static,
{
    pub fn new(graph: Arc<G>, search: Arc<SemanticSearchEngine<G, E>>) -> Self {
        Self {
            graph,
            search,
            status: AgentStatusCell::default(),
            task_types: vec![
                AgentTaskType::EntitySearch,
                AgentTaskType::EntityIdentification,
                AgentTaskType::SemanticSearch,
            ],
        }
    }
}

#[async_trait]
impl<G, E> Agent for EntitySearchAgent<G, E>
where
    G: GraphAdapter + 'static,
    E: EmbeddingClient + 'static,
{
    fn id(&self) -> &str {
        "entity-search-agent"
    }

    fn display_name(&self) -> &str {
        "Entity Search Agent"
    }

    fn supported_task_types(&self) -> &[AgentTaskType] {
        &self.task_types
    }

    fn status_cell(&self) -> &AgentStatusCell {
        &self.status
    }

    async fn execute(
        &self,
        _task_type: AgentTaskType,
        description: &str,
        context: &AgentContext,
    ) -> Result<AgentResult> {
        let start = std::time::Instant::now();
        let query = description.to_string();
        let jobs: Vec<(TaskType, TaskJob)> = vec![
            (
                TaskType::GraphQuery,
                TaskJob::Io(Box::pin(exact_match_strategy(self.graph.clone(), query.clone()))),
            ),
            (
                TaskType::GraphQuery,
                TaskJob::Io(Box::pin(partial_match_strategy(self.graph.clone(), query.clone()))),
            ),
            (
                TaskType::GraphQuery,
                TaskJob::Io(Box::pin(single_char_strategy(self.graph.clone(), query.clone()))),
            ),
            (
                TaskType::Embedding,
                TaskJob::Io(Box::pin(vector_similarity_strategy(self.search.clone(), query))),
            ),
        ];

        let results = context.scheduler.submit_batch(jobs).await;
        let mut merged: HashMap<String, ScoredEntity> = HashMap::new();
        for result in results {
            let value = match result {
                Ok(agent_result) if agent_result.success => agent_result.value,
                _ => continue,
            };
            let Some(value) = value else { continue };
            let Ok(hits) = serde_json::from_value::<Vec<ScoredEntity>>(value) else {
                continue;
            };
            for hit in hits {
                merged
                    .entry(hit.entity.id.clone())
                    .and_modify(|existing| {
                        if hit.score > existing.score {
                            existing.score = hit.score;
                        }
                    })
                    .or_insert(hit);
            }
        }

        let mut ranked: Vec<ScoredEntity> = merged.into_values().collect();
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let value = serde_json::to_value(&ranked).map_err(|e| GraphMindError::Internal(e.to_string()))?;
        Ok(AgentResult::ok(value, start.elapsed())
            .with_metadata("strategy_count", serde_json::json!(4))
            .with_metadata("match_count", serde_json::json!(ranked.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_core::Entity;
    use graphmind_graph::InMemoryGraphAdapter;
    use graphmind_scheduler::TaskScheduler;
    use graphmind_search::HashEmbeddingClient;

    fn fixture() -> Arc<InMemoryGraphAdapter> {
        let graph = InMemoryGraphAdapter::new();
        graph.add_entity(Entity::new("einstein", "Albert Einstein", "Person"));
        graph.add_entity(Entity::new("curie", "Marie Curie", "Person"));
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
                unreachable!("entity search agent never dispatches sub-tasks")
            }
        }
        AgentContext {
            scheduler: TaskScheduler::new(&graphmind_core::ReasoningConfig::default()).unwrap(),
            dispatch: Arc::new(NoopDispatch),
        }
    }

    #[tokio::test]
    async fn exact_match_wins_over_partial_match() {
        let graph = fixture();
        let search = Arc::new(SemanticSearchEngine::new(graph.clone(), Arc::new(HashEmbeddingClient::new(32)), 16));
        let agent = EntitySearchAgent::new(graph, search);
        agent.initialize().await.unwrap();
        let result = agent
            .execute(AgentTaskType::EntitySearch, "Albert Einstein", &context())
            .await
            .unwrap();
        assert!(result.success);
        let hits: Vec<ScoredEntity> = serde_json::from_value(result.value.unwrap()).unwrap();
        assert_eq!(hits[0].entity.id, "einstein");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn can_handle_rejects_unsupported_task_type() {
        let graph = fixture();
        let search = Arc::new(SemanticSearchEngine::new(graph.clone(), Arc::new(HashEmbeddingClient::new(32)), 16));
        let agent = EntitySearchAgent::new(graph, search);
        assert!(!agent.can_handle(AgentTaskType::PathFinding, "x"));
    }
}
