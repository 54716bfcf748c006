use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use graphmind_core::{AgentResult, Result};
use graphmind_scheduler::TaskScheduler;

/// The closed set of task kinds an agent can declare support for. Distinct
/// from `graphmind_core::TaskType`, which tags CPU/IO pool dispatch rather
/// than agent capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentTaskType {
    EntitySearch,
    EntityIdentification,
    SemanticSearch,
    RelationshipAnalysis,
    PathFinding,
    ConnectionDiscovery,
    RelationSummary,
    ComplexReasoning,
    MultiAgentCoordination,
    QuestionAnalysis,
}

impl AgentTaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentTaskType::EntitySearch => "entity_search",
            AgentTaskType::EntityIdentification => "entity_identification",
            AgentTaskType::SemanticSearch => "semantic_search",
            AgentTaskType::RelationshipAnalysis => "relationship_analysis",
            AgentTaskType::PathFinding => "path_finding",
            AgentTaskType::ConnectionDiscovery => "connection_discovery",
            AgentTaskType::RelationSummary => "relation_summary",
            AgentTaskType::ComplexReasoning => "complex_reasoning",
            AgentTaskType::MultiAgentCoordination => "multi_agent_coordination",
            AgentTaskType::QuestionAnalysis => "question_analysis",
        }
    }
}

impl AgentTaskType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "entity_search" => AgentTaskType::EntitySearch,
            "entity_identification" => AgentTaskType::EntityIdentification,
            "semantic_search" => AgentTaskType::SemanticSearch,
            "relationship_analysis" => AgentTaskType::RelationshipAnalysis,
            "path_finding" => AgentTaskType::PathFinding,
            "connection_discovery" => AgentTaskType::ConnectionDiscovery,
            "relation_summary" => AgentTaskType::RelationSummary,
            "complex_reasoning" => AgentTaskType::ComplexReasoning,
            "multi_agent_coordination" => AgentTaskType::MultiAgentCoordination,
            "question_analysis" => AgentTaskType::QuestionAnalysis,
            _ => return None,
        })
    }
}

impl fmt::Display for AgentTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Initializing,
    Ready,
    Busy,
    Shutdown,
}

impl AgentStatus {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => AgentStatus::Initializing,
            1 => AgentStatus::Ready,
            2 => AgentStatus::Busy,
            _ => AgentStatus::Shutdown,
        }
    }

    fn tag(self) -> u8 {
        match self {
            AgentStatus::Initializing => 0,
            AgentStatus::Ready => 1,
            AgentStatus::Busy => 2,
            AgentStatus::Shutdown => 3,
        }
    }
}

/// Atomic status cell every built-in agent embeds. Implements the
/// READY→BUSY claim/release cycle the coordinator relies on to keep busy
/// agents invisible to dispatch without locking the whole registry.
#[derive(Debug)]
pub struct AgentStatusCell(AtomicU8);

impl Default for AgentStatusCell {
    fn default() -> Self {
        Self(AtomicU8::new(AgentStatus::Initializing.tag()))
    }
}

impl AgentStatusCell {
    pub fn get(&self) -> AgentStatus {
        AgentStatus::from_tag(self.0.load(Ordering::Acquire))
    }

    /// Idempotent: initializing an already-ready agent is a no-op.
    pub fn initialize(&self) {
        let _ = self.0.compare_exchange(
            AgentStatus::Initializing.tag(),
            AgentStatus::Ready.tag(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Idempotent: shutting down twice is a no-op the second time.
    pub fn shutdown(&self) {
        self.0.store(AgentStatus::Shutdown.tag(), Ordering::Release);
    }

    /// Atomically claims the agent for a single `execute` call. Fails if
    /// another caller already claimed it or it is not READY.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(
                AgentStatus::Ready.tag(),
                AgentStatus::Busy.tag(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Returns the agent to READY after `execute` completes. A no-op if the
    /// agent was shut down mid-call.
    pub fn release(&self) {
        let _ = self.0.compare_exchange(
            AgentStatus::Busy.tag(),
            AgentStatus::Ready.tag(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Capability the reasoning-coordinator agent uses to dispatch sub-steps
/// without holding a back-reference to the whole `AgentCoordinator`.
#[async_trait]
pub trait AgentDispatch: Send + Sync {
    async fn dispatch(
        &self,
        task_type: AgentTaskType,
        description: &str,
        context: &AgentContext,
    ) -> Result<AgentResult>;
}

/// Execution context passed to every `Agent::execute` call: the scheduler
/// agents must route concurrency through, and a dispatch handle for agents
/// (namely the reasoning coordinator) that need to invoke other agents.
#[derive(Clone)]
pub struct AgentContext {
    pub scheduler: Arc<TaskScheduler>,
    pub dispatch: Arc<dyn AgentDispatch>,
}

/// A typed, specialized participant in multi-agent question answering.
/// Implementors embed an `AgentStatusCell` and expose it via
/// `status_cell` so the default trait methods can manage the READY/BUSY
/// lifecycle uniformly.
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn supported_task_types(&self) -> &[AgentTaskType];
    fn status_cell(&self) -> &AgentStatusCell;

    fn can_handle(&self, task_type: AgentTaskType, _description: &str) -> bool {
        self.supported_task_types().contains(&task_type)
    }

    fn status(&self) -> AgentStatus {
        self.status_cell().get()
    }

    async fn initialize(&self) -> Result<()> {
        self.status_cell().initialize();
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.status_cell().shutdown();
        Ok(())
    }

    async fn execute(
        &self,
        task_type: AgentTaskType,
        description: &str,
        context: &AgentContext,
    ) -> Result<AgentResult>;
}
