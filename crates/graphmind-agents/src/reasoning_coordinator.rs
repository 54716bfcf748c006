use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use graphmind_core::{AgentResult, GraphMindError, LlmClient, Result};
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentContext, AgentStatusCell, AgentTaskType};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanStepRequest {
    task_type: String,
    description: String,
}

const PLANNER_PROMPT_PREFIX: &str = "Produce a JSON array of steps to answer the question below. \
Each step is an object with \"task_type\" (one of entity_search, relationship_analysis, \
path_finding, connection_discovery) and \"description\". Respond with JSON only.\n\nQuestion: ";

/// Deterministic fallback when the LLM is unavailable or returns
/// unparsable output: a single entity-search step over the raw question.
/// Narrow but always resolvable without invoking the LLM again.
fn fallback_plan(question: &str) -> Vec<PlanStepRequest> {
    vec![PlanStepRequest {
        task_type: AgentTaskType::EntitySearch.as_str().to_string(),
        description: question.to_string(),
    }]
}

async fn plan_steps(llm: &dyn LlmClient, question: &str) -> Vec<PlanStepRequest> {
    let prompt = format!("{PLANNER_PROMPT_PREFIX}{question}");
    match llm.generate(&prompt, 0.0, 512).await {
        Ok(text) => serde_json::from_str::<Vec<PlanStepRequest>>(text.trim()).unwrap_or_else(|_| fallback_plan(question)),
        Err(_) => fallback_plan(question),
    }
}

/// Reasoning-coordinator agent: asks the LLM for a free-form
/// execution plan, falling back to a deterministic one-step plan; runs
/// each step through the coordinator's dispatch handle; collects the
/// per-agent results; synthesizes a final answer from them.
pub struct ReasoningCoordinatorAgent<L> {
    llm: Arc<L>,
    status: AgentStatusCell,
    task_types: Vec<AgentTaskType>,
}

impl<L: LlmClient + 'static> ReasoningCoordinatorAgent<L> {
    pub fn new(llm: Arc<L>) -> Self {
        Self {
            llm,
            status: AgentStatusCell::default(),
            task_types: vec![
                AgentTaskType::ComplexReasoning,
                AgentTaskType::MultiAgentCoordination,
                AgentTaskType::QuestionAnalysis,
            ],
        }
    }
}

#[async_trait]
impl<L: LlmClient + 'static> Agent for ReasoningCoordinatorAgent<L> {
    fn id(&self) -> &str {
        "reasoning-coordinator-agent"
    }

    fn display_name(&self) -> &str {
        "Reasoning Coordinator Agent"
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
        let question = description;
        let plan = plan_steps(self.llm.as_ref(), question).await;

        let mut evidences_by_agent: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
        let mut step_timings_ms: Vec<(String, u64)> = Vec::new();

        for step in &plan {
            let Some(task_type) = AgentTaskType::parse(&step.task_type) else {
                continue;
            };
            let step_start = std::time::Instant::now();
            let result = context.dispatch.dispatch(task_type, &step.description, context).await;
            step_timings_ms.push((step.task_type.clone(), step_start.elapsed().as_millis() as u64));

            if let Ok(agent_result) = result {
                let agent_id = agent_result
                    .metadata
                    .get("agent_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                if let Some(value) = agent_result.value {
                    evidences_by_agent.entry(agent_id).or_default().push(value);
                }
            }
        }

        let synthesis_prompt = build_synthesis_prompt(question, &evidences_by_agent);
        let answer = match self.llm.generate(&synthesis_prompt, 0.0, 512).await {
            Ok(text) if !text.trim().is_empty() => text,
            _ => deterministic_synthesis(question, &evidences_by_agent),
        };

        let value = serde_json::json!({ "answer": answer });
        let plan_json = serde_json::to_value(&plan).unwrap_or(serde_json::Value::Null);
        let evidences_json = serde_json::to_value(&evidences_by_agent).unwrap_or(serde_json::Value::Null);

        Ok(AgentResult::ok(value, std::time::Duration::default())
            .with_metadata("plan", plan_json)
            .with_metadata("evidences", evidences_json)
            .with_metadata("step_timings_ms", serde_json::json!(step_timings_ms)))
    }
}

fn build_synthesis_prompt(question: &str, evidences: &HashMap<String, Vec<serde_json::Value>>) -> String {
    let mut prompt = format!("Question: {question}\n\nCollected evidence:\n");
    for (agent_id, values) in evidences {
        prompt.push_str(&format!("- {agent_id}: {} item(s)\n", values.len()));
    }
    prompt.push_str("\nSynthesize a concise answer from the evidence above.");
    prompt
}

fn deterministic_synthesis(question: &str, evidences: &HashMap<String, Vec<serde_json::Value>>) -> String {
    if evidences.values().all(|v| v.is_empty()) || evidences.is_empty() {
        return format!("No sufficient evidence was found to answer: {question}");
    }
    let total: usize = evidences.values().map(|v| v.len()).sum();
    format!("Based on {total} piece(s) of evidence gathered across {} agent(s).", evidences.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_llm::EchoLlmClient;

    fn context_with_dispatch(handler: impl Fn(AgentTaskType, &str) -> Result<AgentResult> + Send + Sync + 'static) -> AgentContext {
        struct FnDispatch<F>(F);
        #[async_trait]
        impl<F> crate::agent::AgentDispatch for FnDispatch<F>
        where
            F: Fn(AgentTaskType, &str) -> Result<AgentResult> + Send + Sync,
        {
            async fn dispatch(
                &self,
                task_type: AgentTaskType,
                description: &str,
                _context: &AgentContext,
            ) -> Result<AgentResult> {
                (self.0)(task_type, description)
            }
        }
        AgentContext {
            scheduler: graphmind_scheduler::TaskScheduler::new(&graphmind_core::ReasoningConfig::default()).unwrap(),
            dispatch: Arc::new(FnDispatch(handler)),
        }
    }

    #[tokio::test]
    async fn falls_back_to_deterministic_plan_when_llm_echoes_non_json() {
        let agent = ReasoningCoordinatorAgent::new(Arc::new(EchoLlmClient::new()));
        let context = context_with_dispatch(|_task_type, _desc| {
            Ok(AgentResult::ok(serde_json::json!({"hit": true}), std::time::Duration::default())
                .with_metadata("agent_id", serde_json::json!("entity-search-agent")))
        });
        let result = agent
            .execute(AgentTaskType::ComplexReasoning, "Who developed relativity?", &context)
            .await
            .unwrap();
        assert!(result.success);
        let evidences = result.metadata.get("evidences").unwrap();
        assert!(evidences.get("entity-search-agent").is_some());
    }

    #[tokio::test]
    async fn no_evidence_yields_explicit_admission() {
        let agent = ReasoningCoordinatorAgent::new(Arc::new(EchoLlmClient::new()));
        let llm = agent.llm.clone();
        llm.set_available(false);
        let context = context_with_dispatch(|_task_type, _desc| {
            Err(GraphMindError::GraphUnavailable("down".into()))
        });
        let result = agent
            .execute(AgentTaskType::ComplexReasoning, "Who developed relativity?", &context)
            .await
            .unwrap();
        let answer = result.value.unwrap()["answer"].as_str().unwrap().to_string();
        assert!(answer.contains("No sufficient evidence"));
    }
}
