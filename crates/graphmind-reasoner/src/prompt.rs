use graphmind_core::{Evidence, Path};
use graphmind_planner::QuestionCategory;

/// Category-keyed instruction prefixing the evidence block. Kept short and
/// declarative — the evidence block itself carries the actual content.
fn instruction_for(category: QuestionCategory) -> &'static str {
    match category {
        QuestionCategory::Person => {
            "Identify the person the question is asking about and answer concisely using only the evidence below."
        }
        QuestionCategory::Location => {
            "Identify the location the question is asking about and answer concisely using only the evidence below."
        }
        QuestionCategory::Time => {
            "Identify the time or date the question is asking about and answer concisely using only the evidence below."
        }
        QuestionCategory::Process => {
            "Explain the process described by the evidence below, step by step if the evidence supports it."
        }
        QuestionCategory::Causal => {
            "Explain the cause-and-effect relationship described by the evidence below."
        }
        QuestionCategory::Concept => {
            "Define or explain the concept the question is asking about using only the evidence below."
        }
        QuestionCategory::General => {
            "Answer the question as completely as the evidence below allows."
        }
    }
}

/// Builds the answer-synthesis prompt: a category-keyed instruction, the
/// question, and a numbered, confidence-annotated evidence block.
pub fn build_prompt(question: &str, category: QuestionCategory, evidence: &[Evidence]) -> String {
    let mut prompt = String::new();
    prompt.push_str(instruction_for(category));
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt.push_str("\n\nEvidence:\n");
    if evidence.is_empty() {
        prompt.push_str("(none found)\n");
    } else {
        for (index, item) in evidence.iter().enumerate() {
            prompt.push_str(&format!("{}. {} (confidence {:.2})\n", index + 1, item.description, item.score));
        }
    }
    prompt.push_str("\nIf the evidence is insufficient, say so explicitly rather than guessing.");
    prompt
}

/// Deterministic answer used whenever the LLM is unavailable or returns an
/// empty response: prefers the strongest traversal path, falls back to the
/// single strongest evidence item, and finally an explicit "no evidence"
/// admission rather than inventing content.
pub fn deterministic_fallback(question: &str, evidence: &[Evidence], paths: &[Path]) -> String {
    if let Some(best_path) = paths.first() {
        if let Some(last_step) = best_path.steps.last() {
            return format!(
                "Based on {} hop(s) of graph evidence, the most likely answer involves {}.",
                best_path.length(),
                last_step.entity.name
            );
        }
    }
    if let Some(top) = evidence.first() {
        return format!("Based on available evidence: {}", top.description);
    }
    format!("No sufficient evidence was found to answer: {question}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_core::{Direction, Entity, Relation};

    #[test]
    fn prompt_embeds_question_and_evidence() {
        let evidence = vec![Evidence {
            description: "Einstein DEVELOPED Theory of Relativity".into(),
            score: 0.9,
            depth: 1,
            timestamp: chrono::Utc::now(),
        }];
        let prompt = build_prompt("Who developed relativity?", QuestionCategory::Person, &evidence);
        assert!(prompt.contains("Who developed relativity?"));
        assert!(prompt.contains("Einstein DEVELOPED Theory of Relativity"));
    }

    #[test]
    fn fallback_prefers_best_path_over_evidence() {
        let e1 = Entity::new("einstein", "Albert Einstein", "Person");
        let e2 = Entity::new("relativity", "Theory of Relativity", "Concept");
        let relation = Relation::new("DEVELOPED", "einstein", "relativity", Direction::Outgoing);
        let path = Path::seed(e1).extend(relation, e2);
        let answer = deterministic_fallback("who developed relativity", &[], &[path]);
        assert!(answer.contains("Theory of Relativity"));
    }

    #[test]
    fn fallback_admits_no_evidence() {
        let answer = deterministic_fallback("who developed relativity", &[], &[]);
        assert!(answer.contains("No sufficient evidence"));
    }
}
