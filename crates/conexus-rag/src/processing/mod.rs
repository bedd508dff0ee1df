pub mod chunker;
pub mod parser;

pub use chunker::{chunk_id, ChunkResult, TextChunker};
pub use parser::{DocumentFormat, DocumentParser, ParsedDocument};
