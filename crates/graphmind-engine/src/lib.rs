use std::sync::Arc;

use futures::future::join_all;
use graphmind_agents::{
    Agent, AgentCoordinator, AgentTaskType, EntitySearchAgent, ReasoningCoordinatorAgent,
    RelationshipAnalysisAgent,
};
use graphmind_core::{
    EmbeddingClient, Entity, GraphAdapter, LlmClient, ReasoningConfig, ReasoningResult, Result,
    Schema, SearchStrategy,
};
use graphmind_reasoner::MultiHopReasoner;
use graphmind_schema::SchemaAnalyzer;
use graphmind_scheduler::{SchedulerLoad, TaskScheduler};
use graphmind_search::{CacheStats, SemanticSearchEngine};
use tracing::info;

/// Snapshot of the engine's runtime health: scheduler load and embedding
/// cache occupancy, enough to answer "is this instance keeping up".
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub scheduler_load: SchedulerLoad,
    pub embedding_cache: CacheStats,
}

/// Orchestration façade: owns one graph adapter, one embedding client, and
/// one LLM client, and wires them through a schema analyzer, search engine,
/// scheduler, multi-hop reasoner, and agent coordinator. This is the single
/// entry point an embedder constructs and calls `reason` on.
pub struct ReasoningEngine<G, E, L> {
    graph: Arc<G>,
    search: Arc<SemanticSearchEngine<G, E>>,
    schema: Arc<SchemaAnalyzer<G>>,
    scheduler: Arc<TaskScheduler>,
    reasoner: MultiHopReasoner<G, E, L>,
    coordinator: Arc<AgentCoordinator>,
    config: ReasoningConfig,
}

impl<G, E, L> ReasoningEngine<G, E, L>
where
    G: GraphAdapter + 'static,
    E: EmbeddingClient + 'static,
    L: LlmClient + 'static,
{
    /// Builds the engine and registers + initializes the three built-in
    /// agents. Returns before any question is answered, so initialization
    /// failures surface immediately rather than on the first `reason` call.
    pub async fn new(graph: Arc<G>, embedder: Arc<E>, llm: Arc<L>, config: ReasoningConfig) -> Result<Arc<Self>> {
        let search = Arc::new(SemanticSearchEngine::new(
            graph.clone(),
            embedder,
            config.embedding_cache_size,
        ));
        let schema = Arc::new(SchemaAnalyzer::new(graph.clone()));
        let scheduler = TaskScheduler::new(&config)?;
        let reasoner = MultiHopReasoner::new(graph.clone(), search.clone(), llm.clone(), scheduler.clone());
        let coordinator = AgentCoordinator::new(scheduler.clone());

        coordinator.register_agent(Arc::new(EntitySearchAgent::new(graph.clone(), search.clone())) as Arc<dyn Agent>);
        coordinator.register_agent(Arc::new(RelationshipAnalysisAgent::new(graph.clone())) as Arc<dyn Agent>);
        coordinator.register_agent(Arc::new(ReasoningCoordinatorAgent::new(llm)) as Arc<dyn Agent>);
        coordinator.initialize_all().await?;

        info!("reasoning engine initialized");

        Ok(Arc::new(Self {
            graph,
            search,
            schema,
            scheduler,
            reasoner,
            coordinator,
            config,
        }))
    }

    /// Answers a question using the engine's default configuration.
    pub async fn reason(&self, question: &str) -> Result<ReasoningResult> {
        self.reason_with_config(question, &self.config).await
    }

    /// Answers a question with a per-call configuration override, leaving
    /// the engine's own default config untouched for subsequent calls.
    pub async fn reason_with_config(&self, question: &str, config: &ReasoningConfig) -> Result<ReasoningResult> {
        self.reasoner.reason(question, config).await
    }

    /// Answers a question after discovering the graph's schema and
    /// recommending a search strategy for it, so entity search can also
    /// weigh schema-recommended properties rather than name matches alone.
    pub async fn reason_schema_aware(&self, question: &str) -> Result<ReasoningResult> {
        let schema = self.schema.analyze().await?;
        let strategy = self.schema.recommend_strategy(question).await?;
        self.reasoner
            .reason_with_schema(question, &self.config, Some((schema.as_ref(), strategy.as_ref())))
            .await
    }

    /// Answers a batch of questions concurrently, one reasoning pass per
    /// question. A failure on one question does not cancel the others; the
    /// result at index `i` corresponds to `questions[i]`.
    pub async fn reason_batch(&self, questions: &[String]) -> Vec<Result<ReasoningResult>> {
        join_all(questions.iter().map(|q| self.reason(q))).await
    }

    /// Routes a question through the multi-agent coordinator instead of the
    /// direct reasoner, for callers that want the plan-then-dispatch
    /// execution path (and its richer per-agent diagnostic metadata).
    pub async fn reason_via_agents(&self, question: &str) -> Result<graphmind_core::AgentResult> {
        self.coordinator
            .execute_task(AgentTaskType::ComplexReasoning, question)
            .await
    }

    /// Direct entity search without a full reasoning pass, useful for
    /// autocomplete-style lookups or inspecting what a question's seed
    /// entities would resolve to.
    pub async fn search_entities(&self, query: &str, top_k: usize) -> Result<Vec<Entity>> {
        self.search.search_entities(query, None, top_k).await
    }

    /// The graph's discovered schema, analyzing and caching it on first call.
    pub async fn schema(&self) -> Result<Arc<Schema>> {
        self.schema.analyze().await
    }

    /// The recommended search strategy for a query, derived from the
    /// cached schema.
    pub async fn recommend_strategy(&self, query: &str) -> Result<Arc<SearchStrategy>> {
        self.schema.recommend_strategy(query).await
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            scheduler_load: self.scheduler.load(),
            embedding_cache: self.search.cache_stats(),
        }
    }

    /// Shuts down every built-in agent and drains the scheduler, waiting
    /// up to `grace` for in-flight tasks before returning anyway.
    pub async fn close(&self, grace: std::time::Duration) {
        self.coordinator.shutdown_all().await;
        self.scheduler.shutdown(grace).await;
    }
}
