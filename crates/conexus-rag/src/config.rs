use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RAGConfig {
    pub data_dir: PathBuf,
    pub embedding: EmbeddingConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible `/v1/embeddings` endpoint
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    /// Capacity of the query embedding LRU cache
    pub cache_size: usize,
    /// Read from `OPENAI_API_KEY`, never written to disk
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window length in characters
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

/// Which vectors the diversity selector compares candidates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiversityVectors {
    /// Each chunk's own stored embedding (falls back to the query vector
    /// for records stored without one).
    ChunkEmbeddings,
    /// Every candidate is compared through the query vector.
    QueryVector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Raw hits requested from each retrieval signal
    pub top_k: usize,
    /// Size of the diversified result
    pub top_n: usize,
    /// Semantic weight in `hybrid = alpha * semantic + (1 - alpha) * lexical`
    pub hybrid_alpha: f32,
    /// Relevance weight in the MMR objective (1.0 = no diversity penalty)
    pub mmr_lambda: f32,
    /// Best-score cutoff callers use to decide whether a result is grounded
    pub accept_threshold: f32,
    /// Maximum concurrent context lookups per query
    pub resolve_concurrency: usize,
    pub diversity_vectors: DiversityVectors,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 8,
            top_n: 3,
            hybrid_alpha: 0.6,
            mmr_lambda: 0.7,
            accept_threshold: 0.35,
            resolve_concurrency: 8,
            diversity_vectors: DiversityVectors::ChunkEmbeddings,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.top_k == 0 {
            return Err("retrieval.top_k must be > 0".into());
        }
        if self.top_n == 0 {
            return Err("retrieval.top_n must be > 0".into());
        }
        if self.resolve_concurrency == 0 {
            return Err("retrieval.resolve_concurrency must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.hybrid_alpha) {
            return Err("retrieval.hybrid_alpha must be in [0.0, 1.0]".into());
        }
        if !(0.0..=1.0).contains(&self.mmr_lambda) {
            return Err("retrieval.mmr_lambda must be in [0.0, 1.0]".into());
        }
        if !(0.0..=1.0).contains(&self.accept_threshold) {
            return Err("retrieval.accept_threshold must be in [0.0, 1.0]".into());
        }
        Ok(())
    }
}

impl RAGConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if self.embedding.cache_size == 0 {
            return Err("embedding.cache_size must be > 0".into());
        }
        if self.chunking.chunk_size == 0 {
            return Err("chunking.chunk_size must be > 0".into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err("chunking.chunk_overlap must be < chunk_size".into());
        }
        self.retrieval.validate()
    }

    /// Load config from a JSON file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply the deployment environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("CONEXUS_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("EMBED_MODEL") {
            self.embedding.model = v;
        }
        if let Some(v) = get("EMBED_ENDPOINT") {
            self.embedding.endpoint = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.embedding.api_key = Some(v);
        }
        if let Some(v) = parse_override(get("EMBED_DIM"), "EMBED_DIM") {
            self.embedding.dimension = v;
        }
        if let Some(v) = parse_override(get("TOP_K"), "TOP_K") {
            self.retrieval.top_k = v;
        }
        if let Some(v) = parse_override(get("TOP_N"), "TOP_N") {
            self.retrieval.top_n = v;
        }
        if let Some(v) = parse_override(get("HYBRID_ACCEPT"), "HYBRID_ACCEPT") {
            self.retrieval.accept_threshold = v;
        }
        if let Some(v) = parse_override(get("HYBRID_ALPHA"), "HYBRID_ALPHA") {
            self.retrieval.hybrid_alpha = v;
        }
        if let Some(v) = parse_override(get("MMR_LAMBDA"), "MMR_LAMBDA") {
            self.retrieval.mmr_lambda = v;
        }
    }
}

fn parse_override<T: std::str::FromStr>(value: Option<String>, key: &str) -> Option<T> {
    let raw = value?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key = key, value = %raw, "Ignoring unparseable config override");
            None
        }
    }
}

impl Default for RAGConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conexus-rag");

        Self {
            data_dir,
            embedding: EmbeddingConfig {
                endpoint: "https://api.openai.com/v1/embeddings".to_string(),
                model: "text-embedding-3-small".to_string(),
                dimension: 1536,
                cache_size: 1000,
                api_key: None,
            },
            chunking: ChunkingConfig {
                chunk_size: 1400,
                chunk_overlap: 200,
            },
            retrieval: RetrievalConfig::default(),
        }
    }
}
