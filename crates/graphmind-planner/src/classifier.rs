/// The closed set of question categories the planner recognizes. Anything
/// that doesn't match a known interrogative falls back to `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionCategory {
    Person,
    Location,
    Concept,
    Time,
    Process,
    Causal,
    General,
}

impl QuestionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionCategory::Person => "person",
            QuestionCategory::Location => "location",
            QuestionCategory::Concept => "concept",
            QuestionCategory::Time => "time",
            QuestionCategory::Process => "process",
            QuestionCategory::Causal => "causal",
            QuestionCategory::General => "general",
        }
    }
}

/// Classifies a question by its leading interrogative word, case-insensitive.
/// Lexical only — no model call, no part-of-speech tagging. Unrecognized or
/// missing leading words classify as `General` rather than failing, since an
/// unclassifiable question is still a question worth trying to answer.
pub fn classify(question: &str) -> QuestionCategory {
    let first_word = question
        .trim()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    match first_word.as_str() {
        "who" | "whom" | "whose" => QuestionCategory::Person,
        "where" => QuestionCategory::Location,
        "what" | "which" => QuestionCategory::Concept,
        "when" => QuestionCategory::Time,
        "how" => QuestionCategory::Process,
        "why" => QuestionCategory::Causal,
        _ => QuestionCategory::General,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_leading_interrogative_case_insensitive() {
        assert_eq!(classify("Who developed the theory of relativity?"), QuestionCategory::Person);
        assert_eq!(classify("WHERE was Marie Curie born?"), QuestionCategory::Location);
        assert_eq!(classify("what is entropy"), QuestionCategory::Concept);
        assert_eq!(classify("When did world war two end"), QuestionCategory::Time);
        assert_eq!(classify("How does photosynthesis work"), QuestionCategory::Process);
        assert_eq!(classify("Why did the bridge collapse"), QuestionCategory::Causal);
    }

    #[test]
    fn unrecognized_leading_word_is_general() {
        assert_eq!(classify("Describe the theory of relativity"), QuestionCategory::General);
        assert_eq!(classify(""), QuestionCategory::General);
    }
}
