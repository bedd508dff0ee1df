//! Retrieval failures surfaced to callers.
//!
//! Only collaborator failures and bad configuration are errors. A context
//! miss, an empty hit list or a degenerate score distribution is handled
//! inside the retriever and never reaches this type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The embedding collaborator could not produce a query vector
    #[error("query embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    /// The full-text index failed to answer
    #[error("lexical search failed: {0:#}")]
    LexicalSearch(anyhow::Error),
    /// The vector index failed to answer
    #[error("vector search failed: {0:#}")]
    VectorSearch(anyhow::Error),
    /// The backing store failed (a missing record is not an error)
    #[error("context resolution failed for chunk {chunk_id}: {error:#}")]
    ContextResolution {
        chunk_id: String,
        error: anyhow::Error,
    },
    #[error("invalid retrieval configuration: {0}")]
    InvalidConfig(String),
}

impl RetrievalError {
    /// True when an upstream collaborator failed, as opposed to the caller
    /// handing in a broken configuration.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, RetrievalError::InvalidConfig(_))
    }
}
