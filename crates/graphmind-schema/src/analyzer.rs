use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use graphmind_core::similarity::{jaccard_similarity, normalize_query};
use graphmind_core::{
    ConnectionPattern, GraphAdapter, NodeTypeDescriptor, PropertyRecommendation, Result,
    RelationshipTypeDescriptor, Schema, SearchStrategy,
};

/// How many sample values to fetch per node type's most frequent property,
/// and how many recommended properties to keep per type in a strategy.
const SAMPLE_VALUES_LIMIT: usize = 5;
const MAX_RECOMMENDED_PROPERTIES: usize = 3;
const MAX_CONNECTION_PATTERNS: usize = 5;

/// Scales the `log(1+count)` frequency prior before it's added to a type's
/// semantic-similarity weight, so a type's raw occurrence count nudges
/// ranking without ever dominating an actual text match.
const FREQUENCY_PRIOR_SCALE: f32 = 0.05;

fn frequency_prior(count: u64) -> f32 {
    (1.0 + count as f32).ln() * FREQUENCY_PRIOR_SCALE
}

/// The schema analyzer: discovers the graph's node/relationship type
/// shape on first use and caches it for the engine's lifetime, and turns a
/// normalized query into a `SearchStrategy` ranking node/relationship types
/// and their most relevant properties by lexical similarity.
///
/// The schema cache is a single `ArcSwapOption` swap, a copy-on-write
/// idiom that lets readers load the current schema without blocking on a
/// writer; the per-query strategy cache is a `DashMap` keyed by the
/// normalized query, since it is naturally keyed rather than single-valued.
pub struct SchemaAnalyzer<G> {
    graph: Arc<G>,
    schema_cache: ArcSwapOption<Schema>,
    strategy_cache: DashMap<String, Arc<SearchStrategy>>,
}

impl<G> SchemaAnalyzer<G>
where
    G: GraphAdapter,
{
    pub fn new(graph: Arc<G>) -> Self {
        Self {
            graph,
            schema_cache: ArcSwapOption::empty(),
            strategy_cache: DashMap::new(),
        }
    }

    /// Returns the cached schema, discovering it from the graph adapter on
    /// first call. Call `reset` to force rediscovery after the underlying
    /// graph has changed.
    pub async fn analyze(&self) -> Result<Arc<Schema>> {
        if let Some(cached) = self.schema_cache.load_full() {
            return Ok(cached);
        }
        let schema = Arc::new(self.discover().await?);
        self.schema_cache.store(Some(schema.clone()));
        Ok(schema)
    }

    /// Drops the cached schema and every cached strategy (strategies are
    /// derived from the schema, so they are invalidated together).
    pub fn reset(&self) {
        self.schema_cache.store(None);
        self.strategy_cache.clear();
    }

    async fn discover(&self) -> Result<Schema> {
        let mut schema = Schema::default();

        for node_type in self.graph.all_node_types().await? {
            let count = self.graph.node_type_count(&node_type).await?;
            let property_frequency = self.graph.node_property_frequency(&node_type).await?;
            let sample_property = property_frequency
                .iter()
                .max_by_key(|(_, frequency)| **frequency)
                .map(|(name, _)| name.clone());
            let sample_values = match sample_property {
                Some(property) => {
                    self.graph
                        .sample_values(&node_type, &property, SAMPLE_VALUES_LIMIT)
                        .await?
                }
                None => Vec::new(),
            };
            schema.node_types.insert(
                node_type.clone(),
                NodeTypeDescriptor {
                    name: node_type,
                    count,
                    property_frequency,
                    sample_values,
                },
            );
        }

        for relationship_type in self.graph.all_relationship_types().await? {
            let count = self.graph.relationship_type_count(&relationship_type).await?;
            let property_frequency = self
                .graph
                .relationship_property_frequency(&relationship_type)
                .await?;
            let connection_patterns = self
                .graph
                .connection_patterns(&relationship_type, MAX_CONNECTION_PATTERNS)
                .await?
                .into_iter()
                .map(|(source_type, target_type, count)| ConnectionPattern {
                    source_type,
                    target_type,
                    count,
                })
                .collect();
            schema.relationship_types.insert(
                relationship_type.clone(),
                RelationshipTypeDescriptor {
                    name: relationship_type,
                    count,
                    connection_patterns,
                    property_frequency,
                },
            );
        }

        Ok(schema)
    }

    /// Recommends a search strategy for a query, caching it by normalized
    /// query text.
    pub async fn recommend_strategy(&self, query: &str) -> Result<Arc<SearchStrategy>> {
        let key = normalize_query(query);
        if let Some(cached) = self.strategy_cache.get(&key) {
            return Ok(cached.clone());
        }
        let schema = self.analyze().await?;
        let strategy = Arc::new(build_strategy(&key, &schema));
        self.strategy_cache.insert(key, strategy.clone());
        Ok(strategy)
    }
}

fn build_strategy(normalized_query: &str, schema: &Schema) -> SearchStrategy {
    let mut strategy = SearchStrategy::default();
    let mut confidence = 0.0f32;

    for (type_name, descriptor) in &schema.node_types {
        let mut semantic_weight = jaccard_similarity(normalized_query, &type_name.to_lowercase());
        for sample in &descriptor.sample_values {
            semantic_weight = semantic_weight.max(jaccard_similarity(normalized_query, &sample.to_lowercase()));
        }

        let mut recommendations = Vec::new();
        for (property, frequency) in &descriptor.property_frequency {
            let readable = property.replace('_', " ").to_lowercase();
            let property_similarity = jaccard_similarity(normalized_query, &readable);
            if property_similarity <= 0.0 {
                continue;
            }
            let frequency_weight = if descriptor.count == 0 {
                0.0
            } else {
                *frequency as f32 / descriptor.count as f32
            };
            recommendations.push(PropertyRecommendation {
                property: property.clone(),
                weight: property_similarity * frequency_weight,
            });
            semantic_weight = semantic_weight.max(property_similarity);
        }
        recommendations.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        recommendations.truncate(MAX_RECOMMENDED_PROPERTIES);

        let weight = semantic_weight + frequency_prior(descriptor.count);

        if weight > 0.0 || !recommendations.is_empty() {
            strategy.node_type_weights.insert(type_name.clone(), weight);
        }
        if !recommendations.is_empty() {
            strategy.recommended_properties.insert(type_name.clone(), recommendations);
        }
        confidence = confidence.max(weight);
    }

    for (relationship_type, descriptor) in &schema.relationship_types {
        let readable = relationship_type.replace('_', " ").to_lowercase();
        let similarity = jaccard_similarity(normalized_query, &readable);
        let weight = similarity + frequency_prior(descriptor.count);
        if similarity > 0.0 {
            strategy.relationship_type_weights.insert(relationship_type.clone(), weight);
        }
        confidence = confidence.max(weight);
    }

    strategy.confidence = confidence;
    strategy
}
