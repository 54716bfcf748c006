pub mod agent;
pub mod coordinator;
pub mod entity_search;
pub mod relationship_analysis;
pub mod reasoning_coordinator;
pub mod types;

pub use agent::{Agent, AgentContext, AgentDispatch, AgentStatus, AgentStatusCell, AgentTaskType};
pub use coordinator::AgentCoordinator;
pub use entity_search::EntitySearchAgent;
pub use reasoning_coordinator::ReasoningCoordinatorAgent;
pub use relationship_analysis::RelationshipAnalysisAgent;
