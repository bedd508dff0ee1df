pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::OpenAIEmbeddings;

/// Unified embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a document chunk for indexing
    async fn embed_document(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed document chunks for ingestion
    async fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_document(text).await?);
        }
        Ok(out)
    }

    /// Embedding vector dimension
    fn dimension(&self) -> usize;
}
