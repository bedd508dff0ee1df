//! Hybrid retrieval over case studies: BM25 and vector search fused into one
//! score, context-resolved from the chunk store, then diversified with MMR.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod processing;
pub mod rag_engine;
pub mod retrieval;
pub mod search;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use config::{DiversityVectors, RAGConfig, RetrievalConfig};
pub use error::RetrievalError;
pub use rag_engine::{EngineStatistics, RAGEngine};
pub use retrieval::{HybridRetriever, IndexedBackend, RetrievalBackend};
pub use search::HybridSource;
pub use types::{
    CaseStudy, Candidate, ChunkContext, ChunkRef, FusedScore, RawHit, Retrieval, SourceItem,
};

// Re-export common types
pub use anyhow::{Error, Result};
