use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use crossbeam_skiplist::SkipMap;
use graphmind_core::{Direction, Entity, GraphAdapter, Path, Relation, Result};

/// A directed edge as stored in the adjacency index, independent of which
/// endpoint is being queried from.
#[derive(Debug, Clone)]
struct EdgeRecord {
    relation_type: String,
    source_id: String,
    target_id: String,
    properties: HashMap<String, graphmind_core::PropertyValue>,
}

impl EdgeRecord {
    fn as_relation(&self, direction: Direction) -> Relation {
        Relation {
            relation_type: self.relation_type.clone(),
            source_id: self.source_id.clone(),
            target_id: self.target_id.clone(),
            direction,
            properties: self.properties.clone(),
            score: 0.0,
        }
    }
}

/// Lock-free in-memory `GraphAdapter` reference implementation: SkipMap for
/// entities, ArcSwap for copy-on-write adjacency lists. This is test/demo
/// scaffolding, not a persistence layer.
#[derive(Debug, Default)]
pub struct InMemoryGraphAdapter {
    entities: SkipMap<String, Arc<Entity>>,
    outgoing: SkipMap<String, Arc<ArcSwap<Vec<EdgeRecord>>>>,
    incoming: SkipMap<String, Arc<ArcSwap<Vec<EdgeRecord>>>>,
}

impl InMemoryGraphAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&self, entity: Entity) -> &Self {
        self.entities.insert(entity.id.clone(), Arc::new(entity));
        self
    }

    pub fn add_relation(&self, relation: Relation) -> &Self {
        let record = EdgeRecord {
            relation_type: relation.relation_type.clone(),
            source_id: relation.source_id.clone(),
            target_id: relation.target_id.clone(),
            properties: relation.properties.clone(),
        };

        let out_entry = self
            .outgoing
            .get(&record.source_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| {
                let swap = Arc::new(ArcSwap::from_pointee(Vec::new()));
                self.outgoing.insert(record.source_id.clone(), swap.clone());
                swap
            });
        out_entry.rcu(|current| {
            let mut next = (**current).clone();
            next.push(record.clone());
            next
        });

        let in_entry = self
            .incoming
            .get(&record.target_id)
            .map(|e| e.value().clone())
            .unwrap_or_else(|| {
                let swap = Arc::new(ArcSwap::from_pointee(Vec::new()));
                self.incoming.insert(record.target_id.clone(), swap.clone());
                swap
            });
        in_entry.rcu(|current| {
            let mut next = (**current).clone();
            next.push(record.clone());
            next
        });

        self
    }

    fn entity_cloned(&self, id: &str) -> Option<Entity> {
        self.entities.get(id).map(|e| (**e.value()).clone())
    }

    fn bfs_neighbors(&self, start: &str, max_depth: usize) -> Vec<(Entity, usize)> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((start.to_string(), 0));
        let mut out = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for neighbor_id in self.adjacent_ids(&current) {
                if visited.insert(neighbor_id.clone()) {
                    if let Some(entity) = self.entity_cloned(&neighbor_id) {
                        out.push((entity, depth + 1));
                    }
                    queue.push_back((neighbor_id, depth + 1));
                }
            }
        }
        out
    }

    fn adjacent_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(entry) = self.outgoing.get(id) {
            for edge in entry.value().load().iter() {
                out.push(edge.target_id.clone());
            }
        }
        if let Some(entry) = self.incoming.get(id) {
            for edge in entry.value().load().iter() {
                out.push(edge.source_id.clone());
            }
        }
        out
    }
}

#[async_trait]
impl GraphAdapter for InMemoryGraphAdapter {
    async fn find_entity(&self, id: &str) -> Result<Option<Entity>> {
        Ok(self.entity_cloned(id))
    }

    async fn search_entities_by_name(&self, query: &str, limit: usize) -> Result<Vec<Entity>> {
        let needle = query.to_lowercase();
        let mut out = Vec::new();
        for entry in self.entities.iter() {
            if entry.value().name.to_lowercase().contains(&needle) {
                out.push((**entry.value()).clone());
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn search_entities_by_property(
        &self,
        property_name: &str,
        value: &str,
        limit: usize,
    ) -> Result<Vec<Entity>> {
        let needle = value.to_lowercase();
        let mut out = Vec::new();
        for entry in self.entities.iter() {
            if let Some(prop) = entry.value().properties.get(property_name) {
                if prop.as_display_string().to_lowercase().contains(&needle) {
                    out.push((**entry.value()).clone());
                    if out.len() >= limit {
                        break;
                    }
                }
            }
        }
        Ok(out)
    }

    async fn outgoing_relations(&self, id: &str) -> Result<Vec<Relation>> {
        Ok(self
            .outgoing
            .get(id)
            .map(|e| {
                e.value()
                    .load()
                    .iter()
                    .map(|r| r.as_relation(Direction::Outgoing))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn incoming_relations(&self, id: &str) -> Result<Vec<Relation>> {
        Ok(self
            .incoming
            .get(id)
            .map(|e| {
                e.value()
                    .load()
                    .iter()
                    .map(|r| r.as_relation(Direction::Incoming))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_related_entities(&self, id: &str, relation_type: &str) -> Result<Vec<Entity>> {
        let mut out = Vec::new();
        for relation in self.outgoing_relations(id).await? {
            if relation.relation_type == relation_type {
                if let Some(e) = self.entity_cloned(&relation.target_id) {
                    out.push(e);
                }
            }
        }
        for relation in self.incoming_relations(id).await? {
            if relation.relation_type == relation_type {
                if let Some(e) = self.entity_cloned(&relation.source_id) {
                    out.push(e);
                }
            }
        }
        Ok(out)
    }

    async fn find_paths(
        &self,
        source_id: &str,
        target_id: &str,
        max_depth: usize,
    ) -> Result<Vec<Path>> {
        let Some(source) = self.entity_cloned(source_id) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        let mut queue: VecDeque<Path> = VecDeque::new();
        queue.push_back(Path::seed(source));

        while let Some(path) = queue.pop_front() {
            if path.length() >= max_depth {
                continue;
            }
            let current_id = path.last_entity().id.clone();
            let outgoing = self.outgoing_relations(&current_id).await?;
            for relation in outgoing {
                if path.contains_entity(&relation.target_id) {
                    continue;
                }
                if let Some(next_entity) = self.entity_cloned(&relation.target_id) {
                    let next_path = path.extend(relation.clone(), next_entity);
                    if relation.target_id == target_id {
                        found.push(next_path.clone());
                    }
                    queue.push_back(next_path);
                }
            }
        }
        Ok(found)
    }

    async fn find_neighbors(&self, id: &str, max_depth: usize) -> Result<Vec<Entity>> {
        Ok(self
            .bfs_neighbors(id, max_depth)
            .into_iter()
            .map(|(e, _)| e)
            .collect())
    }

    async fn all_node_types(&self) -> Result<Vec<String>> {
        let mut types: HashSet<String> = HashSet::new();
        for entry in self.entities.iter() {
            types.insert(entry.value().entity_type.clone());
        }
        Ok(types.into_iter().collect())
    }

    async fn all_relationship_types(&self) -> Result<Vec<String>> {
        let mut types: HashSet<String> = HashSet::new();
        for entry in self.outgoing.iter() {
            for edge in entry.value().load().iter() {
                types.insert(edge.relation_type.clone());
            }
        }
        Ok(types.into_iter().collect())
    }

    async fn node_type_count(&self, node_type: &str) -> Result<u64> {
        Ok(self
            .entities
            .iter()
            .filter(|e| e.value().entity_type == node_type)
            .count() as u64)
    }

    async fn node_property_frequency(
        &self,
        node_type: &str,
    ) -> Result<HashMap<String, u64>> {
        let mut freq: HashMap<String, u64> = HashMap::new();
        for entry in self.entities.iter() {
            if entry.value().entity_type == node_type {
                for key in entry.value().properties.keys() {
                    *freq.entry(key.clone()).or_insert(0) += 1;
                }
            }
        }
        Ok(freq)
    }

    async fn relationship_type_count(&self, relationship_type: &str) -> Result<u64> {
        let mut count = 0u64;
        for entry in self.outgoing.iter() {
            count += entry
                .value()
                .load()
                .iter()
                .filter(|e| e.relation_type == relationship_type)
                .count() as u64;
        }
        Ok(count)
    }

    async fn relationship_property_frequency(
        &self,
        relationship_type: &str,
    ) -> Result<HashMap<String, u64>> {
        let mut freq: HashMap<String, u64> = HashMap::new();
        for entry in self.outgoing.iter() {
            for edge in entry.value().load().iter() {
                if edge.relation_type == relationship_type {
                    for key in edge.properties.keys() {
                        *freq.entry(key.clone()).or_insert(0) += 1;
                    }
                }
            }
        }
        Ok(freq)
    }

    async fn connection_patterns(
        &self,
        relationship_type: &str,
        top_k: usize,
    ) -> Result<Vec<(String, String, u64)>> {
        let mut counts: HashMap<(String, String), u64> = HashMap::new();
        for entry in self.outgoing.iter() {
            for edge in entry.value().load().iter() {
                if edge.relation_type != relationship_type {
                    continue;
                }
                let source_type = self
                    .entity_cloned(&edge.source_id)
                    .map(|e| e.entity_type)
                    .unwrap_or_default();
                let target_type = self
                    .entity_cloned(&edge.target_id)
                    .map(|e| e.entity_type)
                    .unwrap_or_default();
                *counts.entry((source_type, target_type)).or_insert(0) += 1;
            }
        }
        let mut patterns: Vec<(String, String, u64)> =
            counts.into_iter().map(|((s, t), c)| (s, t, c)).collect();
        patterns.sort_by(|a, b| b.2.cmp(&a.2));
        patterns.truncate(top_k);
        Ok(patterns)
    }

    async fn sample_values(&self, node_type: &str, property: &str, limit: usize) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in self.entities.iter() {
            if entry.value().entity_type != node_type {
                continue;
            }
            if let Some(value) = entry.value().properties.get(property) {
                out.push(value.as_display_string());
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmind_core::Entity;

    fn einstein_graph() -> InMemoryGraphAdapter {
        let g = InMemoryGraphAdapter::new();
        g.add_entity(Entity::new("einstein", "Albert Einstein", "Person"));
        g.add_entity(Entity::new("relativity", "Theory of Relativity", "Concept"));
        g.add_relation(Relation::new(
            "DEVELOPED",
            "einstein",
            "relativity",
            Direction::Outgoing,
        ));
        g
    }

    #[tokio::test]
    async fn outgoing_and_incoming_are_symmetric() {
        let g = einstein_graph();
        let out = g.outgoing_relations("einstein").await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].direction, Direction::Outgoing);

        let inc = g.incoming_relations("relativity").await.unwrap();
        assert_eq!(inc.len(), 1);
        assert_eq!(inc[0].direction, Direction::Incoming);
    }

    #[tokio::test]
    async fn find_paths_respects_max_depth() {
        let g = einstein_graph();
        let paths = g.find_paths("einstein", "relativity", 1).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].length(), 1);

        let paths_zero = g.find_paths("einstein", "relativity", 0).await.unwrap();
        assert!(paths_zero.is_empty());
    }

    #[tokio::test]
    async fn schema_discovery_counts_node_types() {
        let g = einstein_graph();
        let types = g.all_node_types().await.unwrap();
        assert_eq!(types.len(), 2);
        assert_eq!(g.node_type_count("Person").await.unwrap(), 1);
    }
}
