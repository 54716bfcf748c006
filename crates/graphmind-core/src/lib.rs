pub mod config;
pub mod error;
pub mod similarity;
pub mod traits;
pub mod types;

pub use config::ReasoningConfig;
pub use error::{GraphMindError, Result};
pub use traits::{EmbeddingClient, GraphAdapter, LlmClient};
pub use types::{
    AgentResult, ConnectionPattern, Direction, DiagnosticTrace, Entity, Evidence,
    ExecutionStrategy, NodeTypeDescriptor, Path, PathStep, PlanStep, PropertyRecommendation,
    PropertyValue, Relation, RelationshipTypeDescriptor, ReasoningContext, ReasoningPlan,
    ReasoningResult, Schema, SearchStrategy, StepType, TaskStatus, TaskType,
};
