use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use graphmind_core::{AgentResult, GraphMindError, Result};
use graphmind_scheduler::TaskScheduler;
use tracing::debug;

use crate::agent::{Agent, AgentContext, AgentDispatch, AgentStatus, AgentTaskType};

/// Registry, lifecycle manager, and dispatcher for the built-in agents.
/// Selection policy for task types more than one READY agent can handle:
/// least-recently-used, tracked with a monotonic tick counter rather than
/// wall-clock time since only relative order matters.
pub struct AgentCoordinator {
    agents: DashMap<String, Arc<dyn Agent>>,
    last_used: DashMap<String, u64>,
    use_counter: AtomicU64,
    scheduler: Arc<TaskScheduler>,
}

impl AgentCoordinator {
    pub fn new(scheduler: Arc<TaskScheduler>) -> Arc<Self> {
        Arc::new(Self {
            agents: DashMap::new(),
            last_used: DashMap::new(),
            use_counter: AtomicU64::new(0),
            scheduler,
        })
    }

    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.id().to_string(), agent);
    }

    pub async fn initialize_all(&self) -> Result<()> {
        for entry in self.agents.iter() {
            entry.value().initialize().await?;
        }
        Ok(())
    }

    pub async fn shutdown_all(&self) {
        for entry in self.agents.iter() {
            if let Err(e) = entry.value().shutdown().await {
                debug!(agent = entry.key().as_str(), error = %e, "agent shutdown returned an error");
            }
        }
    }

    /// Entry point for callers outside the agent graph (the reasoning
    /// engine façade). Builds a fresh dispatch-capable context rooted at
    /// this coordinator.
    pub async fn execute_task(self: &Arc<Self>, task_type: AgentTaskType, description: &str) -> Result<AgentResult> {
        let dispatch: Arc<dyn AgentDispatch> = self.clone();
        let context = AgentContext {
            scheduler: self.scheduler.clone(),
            dispatch,
        };
        self.dispatch_inner(task_type, description, &context).await
    }

    async fn dispatch_inner(
        &self,
        task_type: AgentTaskType,
        description: &str,
        context: &AgentContext,
    ) -> Result<AgentResult> {
        let agent = self
            .select_agent(task_type, description)
            .ok_or_else(|| GraphMindError::NoAgent(vec![task_type.as_str().to_string()]))?;

        if !agent.status_cell().try_claim() {
            return Err(GraphMindError::NoAgent(vec![task_type.as_str().to_string()]));
        }

        let result = agent.execute(task_type, description, context).await;
        agent.status_cell().release();
        self.mark_used(agent.id());

        result.map(|r| r.with_metadata("agent_id", serde_json::json!(agent.id())))
    }

    fn select_agent(&self, task_type: AgentTaskType, description: &str) -> Option<Arc<dyn Agent>> {
        let mut best: Option<(Arc<dyn Agent>, u64)> = None;
        for entry in self.agents.iter() {
            let agent = entry.value();
            if agent.status() != AgentStatus::Ready {
                continue;
            }
            if !agent.can_handle(task_type, description) {
                continue;
            }
            let tick = self.last_used.get(agent.id()).map(|v| *v).unwrap_or(0);
            let is_better = match &best {
                Some((_, best_tick)) => tick < *best_tick,
                None => true,
            };
            if is_better {
                best = Some((agent.clone(), tick));
            }
        }
        best.map(|(agent, _)| agent)
    }

    fn mark_used(&self, id: &str) {
        let tick = self.use_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.last_used.insert(id.to_string(), tick);
    }
}

#[async_trait]
impl AgentDispatch for AgentCoordinator {
    async fn dispatch(
        &self,
        task_type: AgentTaskType,
        description: &str,
        context: &AgentContext,
    ) -> Result<AgentResult> {
        self.dispatch_inner(task_type, description, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_core::ReasoningConfig;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingAgent {
        name: &'static str,
        task_types: Vec<AgentTaskType>,
        status: crate::agent::AgentStatusCell,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Agent for CountingAgent {
        fn id(&self) -> &str {
            self.name
        }
        fn display_name(&self) -> &str {
            self.name
        }
        fn supported_task_types(&self) -> &[AgentTaskType] {
            &self.task_types
        }
        fn status_cell(&self) -> &crate::agent::AgentStatusCell {
            &self.status
        }
        async fn execute(
            &self,
            _task_type: AgentTaskType,
            _description: &str,
            _context: &AgentContext,
        ) -> Result<AgentResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AgentResult::ok(serde_json::json!({}), Duration::default()))
        }
    }

    fn scheduler() -> Arc<TaskScheduler> {
        TaskScheduler::new(&ReasoningConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn unregistered_task_type_returns_no_agent() {
        let coordinator = AgentCoordinator::new(scheduler());
        let err = coordinator
            .execute_task(AgentTaskType::EntitySearch, "query")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NO_AGENT");
    }

    #[tokio::test]
    async fn least_recently_used_agent_is_preferred_among_candidates() {
        let coordinator = AgentCoordinator::new(scheduler());
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));
        let agent_a = Arc::new(CountingAgent {
            name: "agent-a",
            task_types: vec![AgentTaskType::EntitySearch],
            status: crate::agent::AgentStatusCell::default(),
            calls: calls_a.clone(),
        });
        let agent_b = Arc::new(CountingAgent {
            name: "agent-b",
            task_types: vec![AgentTaskType::EntitySearch],
            status: crate::agent::AgentStatusCell::default(),
            calls: calls_b.clone(),
        });
        agent_a.status_cell().initialize();
        agent_b.status_cell().initialize();
        coordinator.register_agent(agent_a);
        coordinator.register_agent(agent_b);

        coordinator.execute_task(AgentTaskType::EntitySearch, "q").await.unwrap();
        coordinator.execute_task(AgentTaskType::EntitySearch, "q").await.unwrap();

        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shutdown_agent_is_invisible_to_dispatch() {
        let coordinator = AgentCoordinator::new(scheduler());
        let calls = Arc::new(AtomicUsize::new(0));
        let agent = Arc::new(CountingAgent {
            name: "agent-a",
            task_types: vec![AgentTaskType::EntitySearch],
            status: crate::agent::AgentStatusCell::default(),
            calls,
        });
        agent.status_cell().initialize();
        agent.status_cell().shutdown();
        coordinator.register_agent(agent);

        let err = coordinator
            .execute_task(AgentTaskType::EntitySearch, "q")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "NO_AGENT");
    }
}
