use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::config::RAGConfig;
use crate::embeddings::{EmbeddingModel, OpenAIEmbeddings};
use crate::error::RetrievalError;
use crate::processing::{chunk_id, DocumentParser, TextChunker};
use crate::retrieval::{HybridRetriever, IndexedBackend};
use crate::search::text_search::TextChunk;
use crate::search::TextSearch;
use crate::storage::LanceStore;
use crate::types::{CaseStudy, ChunkRecord, Retrieval};

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatistics {
    pub total_chunks: usize,
    pub total_cases: usize,
    pub fts_indexed: usize,
    pub embedding_dimension: usize,
    pub data_dir: String,
}

/// Case-study store, full-text index and embedder behind one handle.
pub struct RAGEngine {
    retriever: HybridRetriever<IndexedBackend>,
    chunker: TextChunker,
    parser: DocumentParser,
    config: RAGConfig,
}

impl RAGEngine {
    pub async fn new(config: RAGConfig) -> Result<Self> {
        let embeddings: Box<dyn EmbeddingModel> = Box::new(
            OpenAIEmbeddings::new(&config.embedding)
                .context("Failed to initialize embedding client")?,
        );
        if config.embedding.api_key.is_none() {
            tracing::warn!(
                endpoint = %config.embedding.endpoint,
                "No API key configured, embedding requests are sent unauthenticated"
            );
        }
        Self::with_embeddings(config, embeddings).await
    }

    /// Build the engine around an already constructed embedding model.
    pub async fn with_embeddings(
        config: RAGConfig,
        embeddings: Box<dyn EmbeddingModel>,
    ) -> Result<Self> {
        config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

        std::fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("Failed to create data directory {}", config.data_dir.display())
        })?;

        let lance_path = config.data_dir.join("lance_data");
        let lance_path = lance_path
            .to_str()
            .ok_or_else(|| anyhow!("Data directory is not valid UTF-8: {}", lance_path.display()))?;
        let store = LanceStore::new(lance_path, config.embedding.dimension)
            .await
            .context("Failed to initialize LanceDB store")?;

        let text_search =
            TextSearch::new(&config.data_dir).context("Failed to initialize Tantivy search")?;

        if embeddings.dimension() != config.embedding.dimension {
            return Err(anyhow!(
                "Embedding model produces {}-dimensional vectors, store is configured for {}",
                embeddings.dimension(),
                config.embedding.dimension
            ));
        }

        let backend = IndexedBackend::new(store, text_search, embeddings);
        let retriever = HybridRetriever::new(backend, config.retrieval.clone())?;

        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap);

        tracing::info!(
            data_dir = %config.data_dir.display(),
            model = %config.embedding.model,
            dimension = config.embedding.dimension,
            "RAG engine ready"
        );

        Ok(Self {
            retriever,
            chunker,
            parser: DocumentParser::new(),
            config,
        })
    }

    fn backend(&self) -> &IndexedBackend {
        self.retriever.backend()
    }

    /// Diverse top-N chunks for a question, with the best hybrid score.
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval, RetrievalError> {
        self.retriever.retrieve_top_n(question).await
    }

    /// Whether a retrieval is strong enough to answer from.
    pub fn is_grounded(&self, retrieval: &Retrieval) -> bool {
        retrieval.is_grounded(self.config.retrieval.accept_threshold)
    }

    /// Build the vector index once the table is large enough to need one.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.backend().store().create_index_if_needed().await
    }

    /// Chunk, embed and index one case study. Any chunks stored earlier
    /// for the same case are replaced. Returns the new chunk ids in order.
    pub async fn ingest_text(&mut self, case: &CaseStudy, text: &str) -> Result<Vec<String>> {
        let chunks = self.chunker.chunk(text);
        let backend = self.retriever.backend();

        // Embed before touching the stores so a failure leaves the
        // previous version of the case in place
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = backend
            .embeddings()
            .embed_documents(&texts)
            .await
            .with_context(|| format!("Failed to embed chunks of case {}", case.case_id))?;
        if vectors.len() != chunks.len() {
            return Err(anyhow!(
                "Embedding model returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            ));
        }

        // Drop a previous, possibly longer, version of the case
        backend.store().delete_by_case(&case.case_id).await?;
        backend.text_search().delete_by_case(&case.case_id)?;

        if chunks.is_empty() {
            tracing::warn!(case_id = %case.case_id, "Case study has no text, nothing indexed");
            return Ok(Vec::new());
        }

        let now = chrono::Utc::now().timestamp();
        let mut records = Vec::with_capacity(chunks.len());
        let mut fts_batch = Vec::with_capacity(chunks.len());
        let mut ids = Vec::with_capacity(chunks.len());

        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let id = chunk_id(&case.case_id, chunk.order);
            fts_batch.push(TextChunk {
                chunk_id: id.clone(),
                case_id: case.case_id.clone(),
                title: case.title.clone(),
                text: chunk.text.clone(),
            });
            records.push(ChunkRecord {
                chunk_id: id.clone(),
                case_id: case.case_id.clone(),
                title: case.title.clone(),
                url: case.url.clone(),
                text: chunk.text,
                order: chunk.order,
                char_start: chunk.char_start,
                char_end: chunk.char_end,
                vector,
                created_at: now,
            });
            ids.push(id);
        }

        backend.store().upsert_chunks(records).await?;
        backend.text_search().index_chunks_batch(&fts_batch)?;
        backend.text_search().commit()?;

        tracing::info!(
            case_id = %case.case_id,
            title = %case.title,
            chunks = ids.len(),
            "Ingested case study"
        );

        Ok(ids)
    }

    /// Parse a `.pdf`, `.md`/`.markdown` or `.txt` file and ingest it.
    pub async fn ingest_file(&mut self, case: &CaseStudy, path: &Path) -> Result<Vec<String>> {
        let parsed = self
            .parser
            .parse_file(path)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        self.ingest_text(case, &parsed.content).await
    }

    /// Remove a case study from both stores. Returns the deleted chunk count.
    pub async fn delete_case(&mut self, case_id: &str) -> Result<usize> {
        let deleted = self.backend().store().delete_by_case(case_id).await?;
        self.backend().text_search().delete_by_case(case_id)?;
        Ok(deleted)
    }

    pub async fn clear_all_data(&mut self) -> Result<()> {
        self.backend().store().clear().await?;
        self.backend().text_search().clear()?;
        tracing::info!("Cleared all case studies");
        Ok(())
    }

    pub async fn get_statistics(&self) -> Result<EngineStatistics> {
        let store = self.backend().store();
        Ok(EngineStatistics {
            total_chunks: store.count().await?,
            total_cases: store.count_cases().await?,
            fts_indexed: self.backend().text_search().count()?,
            embedding_dimension: self.backend().embeddings().dimension(),
            data_dir: self.config.data_dir.display().to_string(),
        })
    }

    pub fn config(&self) -> &RAGConfig {
        &self.config
    }
}
