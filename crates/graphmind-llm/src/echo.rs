use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use graphmind_core::{GraphMindError, LlmClient, Result};

/// Rough characters-per-token ratio used only to keep the deterministic
/// reference client's output length in the same ballpark as a real
/// provider would produce for a given `max_tokens` budget.
const CHARS_PER_TOKEN: usize = 4;

/// Deterministic stand-in for a real LLM provider: no network call, no
/// sampling, just a templated synthesis of whatever prompt it is given.
/// Exists so the reasoner/agents can be built and tested against a real
/// `LlmClient` without depending on an actual model endpoint, and so the
/// LLM-unavailable fallback path has something concrete to flip.
pub struct EchoLlmClient {
    available: AtomicBool,
}

impl Default for EchoLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EchoLlmClient {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }
}

#[async_trait]
impl LlmClient for EchoLlmClient {
    async fn generate(&self, prompt: &str, _temperature: f32, max_tokens: usize) -> Result<String> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(GraphMindError::LlmUnavailable(
                "echo client is marked unavailable".into(),
            ));
        }
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            return Err(GraphMindError::InvalidInput("prompt must not be empty".into()));
        }
        let budget = max_tokens.max(1) * CHARS_PER_TOKEN;
        let body: String = trimmed.chars().take(budget).collect();
        Ok(format!("Based on the available evidence: {body}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_echoes_truncated_prompt() {
        let client = EchoLlmClient::new();
        let out = client.generate("who developed the theory of relativity?", 0.2, 3).await.unwrap();
        assert!(out.starts_with("Based on the available evidence:"));
        assert!(out.len() <= "Based on the available evidence: ".len() + 12);
    }

    #[tokio::test]
    async fn empty_prompt_is_invalid_input() {
        let client = EchoLlmClient::new();
        let err = client.generate("   ", 0.2, 10).await.unwrap_err();
        assert_eq!(err.kind(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn unavailable_client_errors() {
        let client = EchoLlmClient::new();
        client.set_available(false);
        let err = client.generate("hello", 0.2, 10).await.unwrap_err();
        assert_eq!(err.kind(), "LLM_UNAVAILABLE");
    }
}
