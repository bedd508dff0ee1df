use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;

use super::backend::RetrievalBackend;
use crate::config::{DiversityVectors, RetrievalConfig};
use crate::error::RetrievalError;
use crate::search::{fuse, mmr_select, normalize_hits};
use crate::types::{Candidate, ChunkContext, FusedScore, Retrieval};

/// Hybrid retrieval: both signals, normalized and fused, context-resolved,
/// then diversified with MMR.
pub struct HybridRetriever<B> {
    backend: B,
    config: RetrievalConfig,
}

impl<B: RetrievalBackend> HybridRetriever<B> {
    pub fn new(backend: B, config: RetrievalConfig) -> Result<Self, RetrievalError> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        Ok(Self { backend, config })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Top-N diverse chunks for `question` and the hybrid score of the first.
    pub async fn retrieve_top_n(&self, question: &str) -> Result<Retrieval, RetrievalError> {
        self.run(question, &self.config).await
    }

    /// Same as [`HybridRetriever::retrieve_top_n`] with per-call weights.
    pub async fn retrieve_top_n_with(
        &self,
        question: &str,
        config: &RetrievalConfig,
    ) -> Result<Retrieval, RetrievalError> {
        config.validate().map_err(RetrievalError::InvalidConfig)?;
        self.run(question, config).await
    }

    async fn run(&self, question: &str, config: &RetrievalConfig) -> Result<Retrieval, RetrievalError> {
        let k = config.top_k;

        // The lexical signal does not need the query vector
        let lexical = async {
            self.backend
                .lexical_search(question, k)
                .await
                .map_err(RetrievalError::LexicalSearch)
        };
        let semantic = async {
            let query_vector = self
                .backend
                .embed(question)
                .await
                .map_err(RetrievalError::Embedding)?;
            let hits = self
                .backend
                .vector_search(&query_vector, k)
                .await
                .map_err(RetrievalError::VectorSearch)?;
            Ok::<_, RetrievalError>((query_vector, hits))
        };
        let (lexical, semantic) = tokio::join!(lexical, semantic);
        let (query_vector, vector_hits) = semantic?;
        let lexical_hits = lexical?;

        tracing::info!(
            query = question,
            top_k = k,
            vector_hits = vector_hits.len(),
            lexical_hits = lexical_hits.len(),
            "Hybrid search candidates"
        );

        let fused = fuse(
            &normalize_hits(vector_hits),
            &normalize_hits(lexical_hits),
            config.hybrid_alpha,
        );
        if fused.is_empty() {
            return Ok(Retrieval::empty());
        }
        let fused_count = fused.len();

        // `buffered` yields in input order whatever order lookups finish in
        let resolved: Vec<(FusedScore, Option<ChunkContext>)> = futures::stream::iter(fused)
            .map(|fused| async move {
                let resolved = self.backend.resolve_context(&fused.chunk_id).await;
                match resolved {
                    Ok(context) => Ok((fused, context)),
                    Err(error) => Err(RetrievalError::ContextResolution {
                        chunk_id: fused.chunk_id,
                        error,
                    }),
                }
            })
            .buffered(config.resolve_concurrency)
            .try_collect()
            .await?;

        let query_vector: Arc<[f32]> = Arc::from(query_vector);
        let mut candidates: Vec<Candidate> = resolved
            .into_iter()
            .filter_map(|(fused, context)| match context {
                Some(context) => Some(enrich(fused, context, &query_vector, config.diversity_vectors)),
                None => {
                    tracing::debug!(chunk_id = %fused.chunk_id, "Dropping stale index entry");
                    None
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.hybrid
                .partial_cmp(&a.hybrid)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let resolved_count = candidates.len();
        let selected = mmr_select(candidates, config.top_n, config.mmr_lambda);
        let retrieval = Retrieval::new(selected);

        tracing::info!(
            fused = fused_count,
            resolved = resolved_count,
            dropped = fused_count - resolved_count,
            returned = retrieval.candidates.len(),
            best_score = retrieval.best_score,
            "Retrieval complete"
        );

        Ok(retrieval)
    }
}

fn enrich(
    fused: FusedScore,
    mut context: ChunkContext,
    query_vector: &Arc<[f32]>,
    mode: DiversityVectors,
) -> Candidate {
    let vector = match (mode, context.embedding.take()) {
        (DiversityVectors::ChunkEmbeddings, Some(embedding)) if !embedding.is_empty() => {
            Arc::from(embedding)
        }
        (DiversityVectors::ChunkEmbeddings, _) => {
            tracing::debug!(
                chunk_id = %context.chunk_id,
                "No stored embedding, comparing through the query vector"
            );
            Arc::clone(query_vector)
        }
        (DiversityVectors::QueryVector, _) => Arc::clone(query_vector),
    };
    Candidate::from_context(fused, context, vector)
}
