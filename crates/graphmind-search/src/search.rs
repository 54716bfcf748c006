use std::collections::HashMap;
use std::sync::Arc;

use graphmind_core::similarity::{jaccard_similarity, normalize_query};
use graphmind_core::{Entity, EmbeddingClient, GraphAdapter, Relation, Result, Schema, SearchStrategy};

use crate::cache::EmbeddingCache;

/// Scores below this cutoff are dropped from search/scoring results rather
/// than surfaced as noise.
const RELEVANCE_CUTOFF: f32 = 0.05;

/// The semantic search engine: entity search, relation scoring, and
/// the similarity primitive the reasoner scores traversal steps with.
///
/// Deliberately takes `Schema`/`SearchStrategy` as method parameters
/// instead of holding a dependency on the schema-analyzer crate — the
/// engine is schema-agnostic composition, not schema-owning.
pub struct SemanticSearchEngine<G, E> {
    graph: Arc<G>,
    embedder: Arc<E>,
    cache: EmbeddingCache,
}

impl<G, E> SemanticSearchEngine<G, E>
where
    G: GraphAdapter,
    E: EmbeddingClient,
{
    pub fn new(graph: Arc<G>, embedder: Arc<E>, cache_capacity: usize) -> Self {
        let dimension = embedder.dimension();
        Self {
            graph,
            embedder,
            cache: EmbeddingCache::new(cache_capacity, dimension),
        }
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }

    async fn embedding_for(&self, text: &str) -> Option<Vec<f32>> {
        if !self.embedder.is_available().await {
            return None;
        }
        if let Some(cached) = self.cache.get(text) {
            return Some(cached);
        }
        match self.embedder.embed(text).await {
            Ok(vector) => {
                self.cache.put(text.to_string(), vector.clone());
                Some(vector)
            }
            Err(_) => None,
        }
    }

    /// Embedding cosine when the client is available and yields
    /// comparable vectors; text-token Jaccard similarity otherwise. This is
    /// the single similarity primitive the rest of the engine (relation
    /// scoring, path scoring, entity search) is built on.
    ///
    /// Vectors of mismatched dimension never participate in cosine: the
    /// mismatch is logged and both cached entries are evicted, since a
    /// dimension that no longer matches its sibling is a sign the cached
    /// vector is stale (e.g. the embedder's declared dimension changed).
    pub async fn calculate_similarity(&self, a: &str, b: &str) -> f32 {
        if let (Some(va), Some(vb)) = (self.embedding_for(a).await, self.embedding_for(b).await) {
            if va.len() == vb.len() {
                return self.embedder.cosine(&va, &vb).max(0.0);
            }
            tracing::warn!(
                dim_a = va.len(),
                dim_b = vb.len(),
                "embedding dimension mismatch, falling back to text similarity"
            );
            self.cache.evict(a);
            self.cache.evict(b);
        }
        jaccard_similarity(a, b)
    }

    /// Scores each relation by similarity between the query and a
    /// human-readable rendering of its type, drops anything below the
    /// relevance cutoff, and returns the rest sorted by descending score.
    pub async fn score_relations(&self, query: &str, relations: Vec<Relation>) -> Vec<Relation> {
        let mut scored = Vec::with_capacity(relations.len());
        for mut relation in relations {
            let label = relation.relation_type.replace('_', " ").to_lowercase();
            let score = self.calculate_similarity(query, &label).await;
            if score >= RELEVANCE_CUTOFF {
                relation.score = score;
                scored.push(relation);
            }
        }
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored
    }

    fn name_score(&self, normalized_query: &str, entity: &Entity) -> f32 {
        if normalized_query.is_empty() {
            return 0.0;
        }
        let normalized_name = entity.name.to_lowercase();
        if normalized_name == normalized_query {
            1.0
        } else if normalized_name.contains(normalized_query) {
            0.8
        } else if normalized_query.contains(&normalized_name) && !normalized_name.is_empty() {
            0.6
        } else {
            0.0
        }
    }

    fn upsert(&self, into: &mut HashMap<String, (Entity, f32)>, entity: Entity, score: f32) {
        into.entry(entity.id.clone())
            .and_modify(|existing| {
                if score > existing.1 {
                    existing.1 = score;
                }
            })
            .or_insert((entity, score));
    }

    /// Entity search. When a `Schema`/`SearchStrategy` pair is supplied, the
    /// recommended (nodeType, property) lookups are the primary signal: they
    /// carry the schema's own confidence in what a question of this shape is
    /// about. The name-substring path is then a secondary fallback, invoked
    /// only when the schema-aware pass comes back thin (fewer than topK/2
    /// hits), with its scores discounted 0.8x to keep schema-aware hits
    /// winning ties. With no schema supplied, the name-substring path is the
    /// only path and runs at full strength: exact/containment name matches
    /// are short-circuited at fixed scores (1.0 / 0.8 / 0.6), anything else
    /// falls back to the embedding-or-Jaccard similarity primitive.
    pub async fn search_entities(
        &self,
        query: &str,
        schema: Option<(&Schema, &SearchStrategy)>,
        top_k: usize,
    ) -> Result<Vec<Entity>> {
        let normalized = normalize_query(query);
        let candidate_limit = (top_k * 3).max(100);
        let mut scored: HashMap<String, (Entity, f32)> = HashMap::new();

        let schema_hit_count = if let Some((_schema, strategy)) = schema {
            let mut count = 0usize;
            for (node_type, recommendations) in &strategy.recommended_properties {
                let type_weight = strategy
                    .node_type_weights
                    .get(node_type)
                    .copied()
                    .unwrap_or(1.0);
                for recommendation in recommendations {
                    let hits = self
                        .graph
                        .search_entities_by_property(&recommendation.property, query, candidate_limit)
                        .await?;
                    for entity in hits {
                        if &entity.entity_type != node_type {
                            continue;
                        }
                        let base = self.name_score(&normalized, &entity).max(recommendation.weight);
                        let score = (base * type_weight).min(1.0);
                        if score >= RELEVANCE_CUTOFF {
                            count += 1;
                            self.upsert(&mut scored, entity, score);
                        }
                    }
                }
            }
            Some(count)
        } else {
            None
        };

        let run_name_pass = match schema_hit_count {
            None => true,
            Some(count) => count < top_k / 2,
        };
        let discount = if schema_hit_count.is_some() { 0.8 } else { 1.0 };

        if run_name_pass {
            let name_hits = self
                .graph
                .search_entities_by_name(query, candidate_limit)
                .await?;
            for entity in name_hits {
                let mut score = self.name_score(&normalized, &entity);
                if score == 0.0 {
                    score = self
                        .calculate_similarity(query, &entity.textual_representation())
                        .await;
                }
                score *= discount;
                if score >= RELEVANCE_CUTOFF {
                    self.upsert(&mut scored, entity, score);
                }
            }
        }

        let mut ranked: Vec<(Entity, f32)> = scored.into_values().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(top_k);
        Ok(ranked.into_iter().map(|(entity, _)| entity).collect())
    }
}
