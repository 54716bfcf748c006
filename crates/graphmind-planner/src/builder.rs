use graphmind_core::{ExecutionStrategy, PlanStep, ReasoningPlan, StepType};

use crate::classifier::{classify, QuestionCategory};

/// Builds the reasoning plan DAG for a question: entity identification,
/// then a category-keyed relation-exploration/similarity-calculation pair,
/// then evidence collection, answer generation, and result validation.
///
/// The execution strategy is chosen by category: causal (why) questions
/// run `Adaptive`, since whether a cause resolves in one hop or many isn't
/// known until relation exploration starts; every other category runs
/// `Parallel`.
pub fn build_plan(question: &str) -> ReasoningPlan {
    let category = classify(question);
    let strategy = match category {
        QuestionCategory::Causal => ExecutionStrategy::Adaptive,
        _ => ExecutionStrategy::Parallel,
    };

    let steps = vec![
        PlanStep {
            id: "entity_identification".into(),
            step_type: StepType::EntityIdentification,
            dependencies: vec![],
            description: format!("Identify seed entities mentioned in the question (category: {})", category.as_str()),
        },
        PlanStep {
            id: "relation_exploration".into(),
            step_type: StepType::RelationExploration,
            dependencies: vec!["entity_identification".into()],
            description: format!("Explore relations from seed entities relevant to a {} question", category.as_str()),
        },
        PlanStep {
            id: "similarity_calculation".into(),
            step_type: StepType::SimilarityCalculation,
            dependencies: vec!["entity_identification".into()],
            description: "Score candidate relations and neighboring entities against the question text".into(),
        },
        PlanStep {
            id: "evidence_collection".into(),
            step_type: StepType::EvidenceCollection,
            dependencies: vec!["relation_exploration".into(), "similarity_calculation".into()],
            description: "Collect and weight evidence from the explored and scored paths".into(),
        },
        PlanStep {
            id: "answer_generation".into(),
            step_type: StepType::AnswerGeneration,
            dependencies: vec!["evidence_collection".into()],
            description: "Synthesize an answer from the collected evidence".into(),
        },
        PlanStep {
            id: "result_validation".into(),
            step_type: StepType::Validation,
            dependencies: vec!["answer_generation".into()],
            description: "Validate the generated answer against the evidence and confidence thresholds".into(),
        },
    ];

    ReasoningPlan { steps, strategy }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_for_person_question_is_parallel_and_valid() {
        let plan = build_plan("Who developed the theory of relativity?");
        assert_eq!(plan.strategy, ExecutionStrategy::Parallel);
        assert!(plan.validate().is_ok());
        assert_eq!(plan.steps.len(), 6);
    }

    #[test]
    fn plan_for_causal_question_is_adaptive() {
        let plan = build_plan("Why did the bridge collapse?");
        assert_eq!(plan.strategy, ExecutionStrategy::Adaptive);
    }

    #[test]
    fn every_step_id_is_unique() {
        let plan = build_plan("What is entropy?");
        let mut ids: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), plan.steps.len());
    }
}
