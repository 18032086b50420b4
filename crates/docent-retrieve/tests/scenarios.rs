use docent_core::{BudgetUnit, Chunk, DocentError};
use docent_index::cache::IndexCache;
use docent_index::embedding::{l2_normalize, Embedder, EmbeddingService};
use docent_index::retry::RetryPolicy;
use docent_index::store::Index;
use docent_retrieve::context::ContextAssembler;
use docent_retrieve::pipeline::QueryPipeline;
use docent_retrieve::retriever::{rank_with_query_vector, HybridRetriever, RetrievalParams};

fn chunk(path: &str, order: usize, text: &str) -> Chunk {
    Chunk {
        id: format!("{path}:{order}"),
        source_name: path.rsplit('/').next().unwrap_or(path).to_string(),
        source_path: path.to_string(),
        section: Some("Policies".into()),
        text: text.to_string(),
        order,
    }
}

fn unit(v: &[f32]) -> Vec<f32> {
    let mut v = v.to_vec();
    l2_normalize(&mut v);
    v
}

/// Five chunks of one document; the query is closest to chunk 2.
fn five_chunk_index() -> Index {
    let chunks = (0..5)
        .map(|i| chunk("/docs/handbook.md", i, &format!("section {i} of the handbook")))
        .collect();
    let vectors = vec![
        unit(&[0.0, 0.0, 1.0]),
        unit(&[0.2, 0.1, 1.0]),
        unit(&[1.0, 0.05, 0.0]),
        unit(&[0.1, 0.3, 1.0]),
        unit(&[0.0, 1.0, 0.2]),
    ];
    Index::new("fake", chunks, vectors, "/docs").unwrap()
}

#[test]
fn top_hit_is_expanded_with_both_neighbors() {
    let index = five_chunk_index();
    let params = RetrievalParams {
        top_k: 1,
        neighbor_window: 1,
        ..RetrievalParams::default()
    };
    let hits = rank_with_query_vector(&index, "", &unit(&[1.0, 0.0, 0.0]), &params);

    let mut orders: Vec<usize> = hits.iter().map(|h| h.chunk.order).collect();
    assert_eq!(hits[0].chunk.order, 2);
    assert_eq!(hits[0].rank, 1);
    assert!(!hits[0].neighbor);
    orders.sort_unstable();
    assert_eq!(orders, vec![1, 2, 3]);
    assert!(hits[1..].iter().all(|h| h.neighbor));
}

#[test]
fn first_and_last_chunks_gain_only_in_range_neighbors() {
    let index = five_chunk_index();
    let params = RetrievalParams {
        top_k: 1,
        neighbor_window: 3,
        ..RetrievalParams::default()
    };

    let hits = rank_with_query_vector(&index, "", &unit(&[0.0, 1.0, 0.0]), &params);
    assert_eq!(hits[0].chunk.order, 4);
    assert!(hits.iter().all(|h| h.chunk.order < 5));
    assert!(hits.iter().all(|h| h.chunk.source_path == "/docs/handbook.md"));

    let hits = rank_with_query_vector(&index, "", &unit(&[-0.1, -0.1, 1.0]), &params);
    assert_eq!(hits[0].chunk.order, 0);
}

#[test]
fn near_duplicates_are_not_both_selected() {
    let chunks = vec![
        chunk("/docs/a.md", 0, "expense reports are due monthly"),
        chunk("/docs/b.md", 0, "expense reports are due monthly"),
        chunk("/docs/c.md", 0, "mileage is reimbursed per kilometer"),
    ];
    let vectors = vec![
        unit(&[1.0, 0.0, 0.0]),
        unit(&[0.999, -0.045, 0.0]),
        unit(&[0.0, 1.0, 0.0]),
    ];
    let index = Index::new("fake", chunks, vectors, "/docs").unwrap();
    let params = RetrievalParams {
        top_k: 2,
        neighbor_window: 0,
        alpha: 1.0,
        mmr_lambda: 0.6,
        ..RetrievalParams::default()
    };

    // b.md outranks c.md on relevance alone
    let hits = rank_with_query_vector(&index, "", &unit(&[1.0, 0.8, 0.0]), &params);
    let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"/docs/a.md:0"));
    assert!(ids.contains(&"/docs/c.md:0"));
}

#[test]
fn ranking_is_deterministic() {
    let chunks: Vec<Chunk> = (0..30)
        .map(|i| chunk(&format!("/docs/doc{}.md", i % 4), i / 4, &format!("topic {} note {i}", i % 3)))
        .collect();
    // repeated vectors force score ties
    let vectors: Vec<Vec<f32>> = (0..30)
        .map(|i| unit(&[(i % 5) as f32, 1.0, (i % 2) as f32]))
        .collect();
    let index = Index::new("fake", chunks, vectors, "/docs").unwrap();
    let params = RetrievalParams::default();
    let query = unit(&[1.0, 1.0, 0.0]);

    let first = rank_with_query_vector(&index, "topic note", &query, &params);
    for _ in 0..5 {
        assert_eq!(rank_with_query_vector(&index, "topic note", &query, &params), first);
    }
}

#[test]
fn assembled_context_respects_budget() {
    let chunks: Vec<Chunk> = (0..12)
        .map(|i| chunk("/docs/long.md", i, &"policy text ".repeat(40 + i * 10)))
        .collect();
    let vectors: Vec<Vec<f32>> = (0..12).map(|i| unit(&[1.0, i as f32 * 0.1, 0.0])).collect();
    let index = Index::new("fake", chunks, vectors, "/docs").unwrap();
    let hits = rank_with_query_vector(&index, "policy", &unit(&[1.0, 0.0, 0.0]), &RetrievalParams::default());

    for budget in [300, 1000, 2500] {
        let context = ContextAssembler::new(budget, BudgetUnit::Chars, 200).assemble(&hits);
        assert!(context.chars().count() <= budget);
        assert!(context.starts_with("[long.md > Policies]\n"));
    }
}

/// Embeds by keyword: each axis counts one of three terms.
struct KeywordEmbedder;

impl EmbeddingService for KeywordEmbedder {
    fn model(&self) -> &str {
        "keyword-axes"
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DocentError> {
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                vec![
                    t.matches("vpn").count() as f32 + 0.01,
                    t.matches("parking").count() as f32 + 0.01,
                    t.matches("lunch").count() as f32 + 0.01,
                ]
            })
            .collect())
    }
}

#[tokio::test]
async fn query_through_cache_end_to_end() {
    let texts = [
        "Connect to the VPN before opening the intranet. The VPN client is preinstalled.",
        "Parking permits are issued by facilities. Parking is free after 6pm.",
        "Lunch is served from noon. The lunch menu changes weekly.",
    ];
    let chunks: Vec<Chunk> = texts
        .iter()
        .enumerate()
        .map(|(i, t)| chunk(&format!("/docs/{i}.md"), 0, t))
        .collect();
    let embedder = Embedder::new(KeywordEmbedder, 8, RetryPolicy::default());
    let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
    let vectors = embedder.embed_batch(&owned).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    Index::new("keyword-axes", chunks, vectors, "/docs")
        .unwrap()
        .save_atomic(&path)
        .unwrap();

    let pipeline = QueryPipeline::new(
        HybridRetriever::new(embedder),
        RetrievalParams {
            top_k: 1,
            neighbor_window: 1,
            ..RetrievalParams::default()
        },
        ContextAssembler::new(2000, BudgetUnit::Chars, 200),
    );
    let cache = IndexCache::new(&path);

    let outcome = pipeline
        .query_path(&cache, "where do I get a parking permit?")
        .await
        .unwrap();
    assert_eq!(outcome.hits.len(), 1);
    assert_eq!(outcome.hits[0].chunk.source_path, "/docs/1.md");
    assert!(outcome.context.starts_with("[1.md > Policies]\nParking permits"));
}
