pub mod backend;
pub mod retriever;

pub use backend::{IndexedBackend, RetrievalBackend};
pub use retriever::HybridRetriever;
