//! Collaborators the retriever depends on, behind one injectable trait.

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::embeddings::EmbeddingModel;
use crate::search::TextSearch;
use crate::storage::LanceStore;
use crate::types::{ChunkContext, RawHit};

/// Embedding, both search signals and context lookup.
///
/// `lexical_search` and `vector_search` may return fewer than `k` hits, in
/// any order. `resolve_context` returns `Ok(None)` for a chunk that is no
/// longer stored; `Err` is reserved for the store itself failing.
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn lexical_search(&self, text: &str, k: usize) -> Result<Vec<RawHit>>;

    async fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<RawHit>>;

    async fn resolve_context(&self, chunk_id: &str) -> Result<Option<ChunkContext>>;
}

/// LanceDB vectors + Tantivy full text + an embedding model.
pub struct IndexedBackend {
    store: LanceStore,
    text_search: TextSearch,
    embeddings: Box<dyn EmbeddingModel>,
}

impl IndexedBackend {
    pub fn new(
        store: LanceStore,
        text_search: TextSearch,
        embeddings: Box<dyn EmbeddingModel>,
    ) -> Self {
        Self {
            store,
            text_search,
            embeddings,
        }
    }

    pub fn store(&self) -> &LanceStore {
        &self.store
    }

    pub fn text_search(&self) -> &TextSearch {
        &self.text_search
    }

    pub fn embeddings(&self) -> &dyn EmbeddingModel {
        self.embeddings.as_ref()
    }
}

#[async_trait]
impl RetrievalBackend for IndexedBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embeddings.embed_query(text).await
    }

    async fn lexical_search(&self, text: &str, k: usize) -> Result<Vec<RawHit>> {
        self.text_search
            .search(text, k)
            .context("Tantivy search failed")
    }

    async fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<RawHit>> {
        self.store.vector_search(query, k).await
    }

    async fn resolve_context(&self, chunk_id: &str) -> Result<Option<ChunkContext>> {
        self.store.get_context(chunk_id).await
    }
}
