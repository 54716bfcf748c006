use crate::{Entity, Path, Relation, Result};
use async_trait::async_trait;

/// Graph store capability interface. Each operation either
/// succeeds (possibly with an empty list) or fails with a transport/
/// unavailable error; no operation may mutate the graph.
#[async_trait]
pub trait GraphAdapter: Send + Sync {
    async fn find_entity(&self, id: &str) -> Result<Option<Entity>>;
    async fn search_entities_by_name(&self, query: &str, limit: usize) -> Result<Vec<Entity>>;
    async fn search_entities_by_property(
        &self,
        property_name: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Entity>>;
    async fn outgoing_relations(&self, id: &str) -> Result<Vec<Relation>>;
    async fn incoming_relations(&self, id: &str) -> Result<Vec<Relation>>;
    async fn find_related_entities(&self, id: &str, relation_type: &str) -> Result<Vec<Entity>>;
    async fn find_paths(&self, source_id: &str, target_id: &str, max_depth: usize)
        -> Result<Vec<Path>>;
    async fn find_neighbors(&self, id: &str, max_depth: usize) -> Result<Vec<Entity>>;

    // Schema discovery.
    async fn all_node_types(&self) -> Result<Vec<String>>;
    async fn all_relationship_types(&self) -> Result<Vec<String>>;
    async fn node_type_count(&self, node_type: &str) -> Result<u64>;
    async fn node_property_frequency(&self, node_type: &str) -> Result<std::collections::HashMap<String, u64>>;
    async fn relationship_type_count(&self, relationship_type: &str) -> Result<u64>;
    async fn relationship_property_frequency(
        &self,
        relationship_type: &str,
    ) -> Result<std::collections::HashMap<String, u64>>;
    async fn connection_patterns(
        &self,
        relationship_type: &str,
        top_k: usize,
    ) -> Result<Vec<(String, String, u64)>>;
    async fn sample_values(&self, node_type: &str, property: &str, limit: usize) -> Result<Vec<String>>;
}

/// Embedding client capability interface.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Empty/whitespace input yields a zero vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Automatic batching of up to 100 per remote call is the concrete
    /// adapter's responsibility; the trait just exposes the batch shape.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> usize;

    /// Both vectors must share the declared dimension or the result is 0.0.
    fn cosine(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.len() != self.dimension() || b.len() != self.dimension() || a.is_empty() {
            return 0.0;
        }
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 {
            0.0
        } else {
            dot / (na * nb)
        }
    }

    /// A probe call consulted before electing the embedding path.
    async fn is_available(&self) -> bool;
}

/// LLM client capability interface.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: usize) -> Result<String>;

    async fn generate_batch(
        &self,
        prompts: &[String],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(prompts.len());
        for p in prompts {
            out.push(self.generate(p, temperature, max_tokens).await?);
        }
        Ok(out)
    }
}
