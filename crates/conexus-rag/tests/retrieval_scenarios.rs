//! End-to-end retrieval through the public API with an in-memory backend.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use conexus_rag::{
    CaseStudy, ChunkContext, HybridRetriever, HybridSource, RawHit, Retrieval,
    RetrievalBackend, RetrievalConfig,
};

#[derive(Default)]
struct InMemoryBackend {
    lexical: Vec<RawHit>,
    semantic: Vec<RawHit>,
    records: HashMap<String, ChunkContext>,
}

impl InMemoryBackend {
    fn new(lexical: &[(&str, f32)], semantic: &[(&str, f32)]) -> Self {
        let hits = |list: &[(&str, f32)]| list.iter().map(|(id, s)| RawHit::new(*id, *s)).collect();
        Self {
            lexical: hits(lexical),
            semantic: hits(semantic),
            records: HashMap::new(),
        }
    }

    fn record(mut self, chunk_id: &str, embedding: Vec<f32>) -> Self {
        self.records.insert(
            chunk_id.to_string(),
            ChunkContext {
                chunk_id: chunk_id.to_string(),
                case_study: CaseStudy::new(
                    format!("case-{}", chunk_id),
                    format!("Case {}", chunk_id),
                    Some("example.com/cases".to_string()),
                ),
                text: format!("Passage {}", chunk_id),
                order: 0,
                char_start: 0,
                char_end: 9,
                embedding: Some(embedding),
            },
        );
        self
    }

    fn forget(mut self, chunk_id: &str) -> Self {
        self.records.remove(chunk_id);
        self
    }
}

#[async_trait]
impl RetrievalBackend for InMemoryBackend {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0])
    }

    async fn lexical_search(&self, _text: &str, k: usize) -> Result<Vec<RawHit>> {
        Ok(self.lexical.iter().take(k).cloned().collect())
    }

    async fn vector_search(&self, _query: &[f32], k: usize) -> Result<Vec<RawHit>> {
        Ok(self.semantic.iter().take(k).cloned().collect())
    }

    async fn resolve_context(&self, chunk_id: &str) -> Result<Option<ChunkContext>> {
        Ok(self.records.get(chunk_id).cloned())
    }
}

fn ids(retrieval: &Retrieval) -> Vec<&str> {
    retrieval
        .candidates
        .iter()
        .map(|c| c.chunk_id.as_str())
        .collect()
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
}

fn scenario_a_backend() -> InMemoryBackend {
    InMemoryBackend::new(&[("c1", 0.9), ("c2", 0.1)], &[("c1", 0.2), ("c3", 0.8)])
        .record("c1", vec![1.0, 0.0, 0.0])
        .record("c2", vec![0.0, 0.0, 1.0])
        .record("c3", vec![0.0, 1.0, 0.0])
}

#[tokio::test]
async fn scenario_a_two_strongest_fused_candidates_are_returned() {
    let config = RetrievalConfig {
        top_k: 2,
        top_n: 2,
        hybrid_alpha: 0.6,
        mmr_lambda: 0.7,
        ..RetrievalConfig::default()
    };
    let retriever = HybridRetriever::new(scenario_a_backend(), config.clone()).unwrap();
    let retrieval = retriever.retrieve_top_n("warehouse automation").await.unwrap();

    // Normalized: lexical c1=1 c2=0, semantic c1=0 c3=1.
    // Hybrid: c3 = 0.6, c1 = 0.4, c2 = 0.0
    assert_eq!(ids(&retrieval), vec!["c3", "c1"]);
    assert!(approx(retrieval.candidates[0].hybrid, 0.6));
    assert!(approx(retrieval.candidates[1].hybrid, 0.4));
    assert!(approx(retrieval.best_score, 0.6));
    assert_eq!(retrieval.candidates[0].source, HybridSource::Vector);
    assert_eq!(retrieval.candidates[1].source, HybridSource::Both);

    let json = serde_json::to_value(&retrieval.candidates[1]).unwrap();
    assert_eq!(json["source"], "Both");
    assert!(json.get("vector").is_none());

    // Weighting the lexical signal instead puts c1 first
    let lexical_heavy = RetrievalConfig {
        hybrid_alpha: 0.4,
        ..config
    };
    let retrieval = retriever
        .retrieve_top_n_with("warehouse automation", &lexical_heavy)
        .await
        .unwrap();
    assert_eq!(ids(&retrieval), vec!["c1", "c3"]);
    assert!(approx(retrieval.best_score, 0.6));
}

#[tokio::test]
async fn scenario_a_sources_carry_metadata() {
    let config = RetrievalConfig {
        top_k: 2,
        top_n: 2,
        ..RetrievalConfig::default()
    };
    let retriever = HybridRetriever::new(scenario_a_backend(), config).unwrap();
    let retrieval = retriever.retrieve_top_n("q").await.unwrap();

    assert!(retrieval.is_grounded(0.35));
    assert!(!retrieval.is_grounded(0.9));

    let sources = retrieval.source_items(3);
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].chunk.chunk_id, "c3");
    assert_eq!(sources[0].case_study.title, "Case c3");
    assert_eq!(
        sources[0].case_study.link().as_deref(),
        Some("https://example.com/cases")
    );
    assert_eq!(sources[0].answer_snippet, "Passage c3");
}

#[tokio::test]
async fn scenario_b_no_hits_is_an_empty_result() {
    let retriever =
        HybridRetriever::new(InMemoryBackend::default(), RetrievalConfig::default()).unwrap();
    let retrieval = retriever.retrieve_top_n("anything").await.unwrap();

    assert!(retrieval.is_empty());
    assert_eq!(retrieval.best_score, 0.0);
    assert!(!retrieval.is_grounded(0.0));
}

#[tokio::test]
async fn scenario_c_unresolvable_candidate_is_dropped() {
    let lexical = [("a", 0.9), ("b", 0.5), ("c", 0.1)];
    let semantic = [("a", 0.7), ("b", 0.6), ("c", 0.2)];
    let full = || {
        InMemoryBackend::new(&lexical, &semantic)
            .record("a", vec![1.0, 0.0, 0.0])
            .record("b", vec![0.0, 1.0, 0.0])
            .record("c", vec![0.0, 0.0, 1.0])
    };

    let baseline = HybridRetriever::new(full(), RetrievalConfig::default())
        .unwrap()
        .retrieve_top_n("q")
        .await
        .unwrap();
    let degraded = HybridRetriever::new(full().forget("b"), RetrievalConfig::default())
        .unwrap()
        .retrieve_top_n("q")
        .await
        .unwrap();

    assert_eq!(ids(&baseline), vec!["a", "b", "c"]);
    assert_eq!(ids(&degraded), vec!["a", "c"]);
    assert_eq!(degraded.candidates.len(), baseline.candidates.len() - 1);

    for survivor in &degraded.candidates {
        let before = baseline
            .candidates
            .iter()
            .find(|c| c.chunk_id == survivor.chunk_id)
            .unwrap();
        assert_eq!(survivor.hybrid, before.hybrid);
        assert_eq!(survivor.semantic, before.semantic);
        assert_eq!(survivor.lexical, before.lexical);
    }
}

#[tokio::test]
async fn scenario_d_identical_candidates_break_ties_by_position() {
    let config = RetrievalConfig {
        top_n: 2,
        ..RetrievalConfig::default()
    };
    let build = |semantic: &[(&str, f32)]| {
        InMemoryBackend::new(&[], semantic)
            .record("s", vec![1.0, 0.0, 0.0])
            .record("x", vec![0.0, 1.0, 0.0])
            .record("y", vec![0.0, 1.0, 0.0])
            .record("floor", vec![1.0, 0.0, 0.0])
    };

    let retriever = HybridRetriever::new(
        build(&[("s", 1.0), ("x", 0.5), ("y", 0.5), ("floor", 0.0)]),
        config.clone(),
    )
    .unwrap();
    let retrieval = retriever.retrieve_top_n("q").await.unwrap();
    assert_eq!(ids(&retrieval), vec!["s", "x"]);

    let retriever = HybridRetriever::new(
        build(&[("s", 1.0), ("y", 0.5), ("x", 0.5), ("floor", 0.0)]),
        config,
    )
    .unwrap();
    let retrieval = retriever.retrieve_top_n("q").await.unwrap();
    assert_eq!(ids(&retrieval), vec!["s", "y"]);
}

#[tokio::test]
async fn scenario_d_tied_seed_is_the_earlier_candidate() {
    let config = RetrievalConfig {
        top_n: 1,
        ..RetrievalConfig::default()
    };
    let backend = InMemoryBackend::new(&[], &[("y", 0.8), ("x", 0.8), ("z", 0.1)])
        .record("x", vec![0.0, 1.0, 0.0])
        .record("y", vec![0.0, 1.0, 0.0])
        .record("z", vec![1.0, 0.0, 0.0]);
    let retrieval = HybridRetriever::new(backend, config)
        .unwrap()
        .retrieve_top_n("q")
        .await
        .unwrap();

    assert_eq!(ids(&retrieval), vec!["y"]);
}

#[tokio::test]
async fn selection_size_is_bounded_by_candidates() {
    let config = RetrievalConfig {
        top_n: 10,
        ..RetrievalConfig::default()
    };
    let retrieval = HybridRetriever::new(scenario_a_backend(), config)
        .unwrap()
        .retrieve_top_n("q")
        .await
        .unwrap();
    assert_eq!(retrieval.candidates.len(), 3);
}
