use std::sync::Arc;
use std::time::{Duration, Instant};

use graphmind_core::{Direction, Entity, ReasoningConfig, Relation};
use graphmind_engine::ReasoningEngine;
use graphmind_graph::InMemoryGraphAdapter;
use graphmind_llm::EchoLlmClient;
use graphmind_search::HashEmbeddingClient;

async fn engine_over(
    graph: Arc<InMemoryGraphAdapter>,
) -> Arc<ReasoningEngine<InMemoryGraphAdapter, HashEmbeddingClient, EchoLlmClient>> {
    let embedder = Arc::new(HashEmbeddingClient::new(32));
    let llm = Arc::new(EchoLlmClient::new());
    ReasoningEngine::new(graph, embedder, llm, ReasoningConfig::default())
        .await
        .unwrap()
}

fn einstein_graph() -> Arc<InMemoryGraphAdapter> {
    let graph = InMemoryGraphAdapter::new();
    graph.add_entity(Entity::new("einstein", "Albert Einstein", "Person"));
    graph.add_entity(Entity::new("relativity", "Theory of Relativity", "Concept"));
    graph.add_relation(Relation::new("DEVELOPED", "einstein", "relativity", Direction::Outgoing));
    Arc::new(graph)
}

fn curie_graph() -> Arc<InMemoryGraphAdapter> {
    let graph = InMemoryGraphAdapter::new();
    graph.add_entity(Entity::new("curie", "Marie Curie", "Person"));
    graph.add_entity(Entity::new("warsaw", "Warsaw", "Location"));
    graph.add_relation(Relation::new("BORN_IN", "curie", "warsaw", Direction::Outgoing));
    Arc::new(graph)
}

/// A chain of laureates who moved to, worked at, and won a prize in the
/// same country, reachable only by a 3-hop traversal, alongside a
/// misleading one-hop relation that does not actually answer the question.
fn nobel_same_country_graph() -> Arc<InMemoryGraphAdapter> {
    let graph = InMemoryGraphAdapter::new();
    graph.add_entity(Entity::new("laureate", "Jane Laureate", "Person"));
    graph.add_entity(Entity::new("france", "France", "Country"));
    graph.add_entity(Entity::new("institute", "Pasteur Institute", "Institution"));
    graph.add_entity(Entity::new("nobel_prize", "Nobel Prize in Chemistry", "Award"));
    graph.add_entity(Entity::new("unrelated_country", "Unrelated Country", "Country"));

    graph.add_relation(Relation::new("MOVED_TO", "laureate", "france", Direction::Outgoing));
    graph.add_relation(Relation::new("WORKED_AT", "france", "institute", Direction::Outgoing));
    graph.add_relation(Relation::new("WON", "institute", "nobel_prize", Direction::Outgoing));
    // A one-hop relation that superficially matches the question's wording
    // but does not establish the same-country link the question asks about.
    graph.add_relation(Relation::new(
        "MENTIONS",
        "laureate",
        "unrelated_country",
        Direction::Outgoing,
    ));
    Arc::new(graph)
}

#[tokio::test]
async fn einstein_one_hop_question_resolves_to_relativity() {
    let engine = engine_over(einstein_graph()).await;
    let result = engine.reason("Who developed the theory of relativity?").await.unwrap();

    assert!(result.paths.iter().any(|p| p.length() == 1 && p.last_entity().id == "relativity"));
    assert!(result.answer.contains("Albert Einstein"));
    assert!(result.confidence > 0.0);
}

#[tokio::test]
async fn curie_one_hop_question_resolves_to_warsaw() {
    let engine = engine_over(curie_graph()).await;
    let result = engine.reason("Where was Marie Curie born?").await.unwrap();

    assert!(result.paths.iter().any(|p| p.length() == 1 && p.last_entity().id == "warsaw"));
    assert!(result.confidence > 0.0);
}

#[tokio::test]
async fn multi_hop_traversal_reaches_the_award_across_three_hops() {
    let engine = engine_over(nobel_same_country_graph()).await;
    let mut config = ReasoningConfig::default();
    config.max_depth = 3;
    let result = engine.reason_with_config("What prize did the laureate win through their work in France?", &config).await.unwrap();

    assert!(
        result.paths.iter().any(|p| p.length() >= 3 && p.last_entity().id == "nobel_prize"),
        "expected a depth >= 3 path reaching the award, got paths: {:?}",
        result.paths.iter().map(|p| (p.length(), p.last_entity().id.clone())).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn empty_question_fails_fast_with_invalid_input() {
    let engine = engine_over(einstein_graph()).await;
    let start = Instant::now();
    let err = engine.reason("   ").await.unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(err.kind(), "INVALID_INPUT");
    assert!(elapsed < Duration::from_millis(50), "empty-question rejection took {elapsed:?}");
}

#[tokio::test]
async fn entity_search_matches_by_text_similarity_when_embeddings_are_unavailable() {
    let graph = einstein_graph();
    let embedder = Arc::new(HashEmbeddingClient::new(32));
    embedder.set_available(false);
    let llm = Arc::new(EchoLlmClient::new());
    let engine = ReasoningEngine::new(graph, embedder, llm, ReasoningConfig::default()).await.unwrap();

    let _ = engine.schema().await.unwrap();
    let hits = engine.search_entities("Einstein", 5).await.unwrap();

    let hit = hits.iter().find(|e| e.id == "einstein").expect("Einstein should be found by name similarity");
    assert!(hit.name.contains("Einstein"));
}
