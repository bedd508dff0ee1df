use anyhow::{Context, Result};
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{self, Schema, Value as TantivyValue, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use crate::types::RawHit;

/// One chunk as handed to the full-text index.
#[derive(Debug, Clone)]
pub struct TextChunk {
    pub chunk_id: String,
    pub case_id: String,
    pub title: String,
    pub text: String,
}

/// BM25 lexical index over chunk text and case titles.
pub struct TextSearch {
    index: Index,
    reader: IndexReader,
    writer: parking_lot::Mutex<IndexWriter>,
    chunk_id_field: schema::Field,
    case_id_field: schema::Field,
    text_field: schema::Field,
    title_field: schema::Field,
}

impl TextSearch {
    /// `chunk_id` and `case_id` must be STRING (indexed, not tokenized)
    /// so that `delete_term` lookups work.
    fn build_schema() -> (Schema, schema::Field, schema::Field, schema::Field, schema::Field) {
        let mut sb = Schema::builder();
        let chunk_id_field = sb.add_text_field("chunk_id", STRING | STORED);
        let case_id_field = sb.add_text_field("case_id", STRING | STORED);
        let text_field = sb.add_text_field("text", TEXT);
        let title_field = sb.add_text_field("title", TEXT);
        (sb.build(), chunk_id_field, case_id_field, text_field, title_field)
    }

    /// An index written by an older layout cannot be queried or pruned by id.
    fn needs_schema_migration(index: &Index) -> bool {
        let schema = index.schema();
        ["chunk_id", "case_id"].iter().any(|name| match schema.get_field(name) {
            Ok(field) => !schema.get_field_entry(field).is_indexed(),
            Err(_) => true,
        })
    }

    pub fn new(path: &Path) -> Result<Self> {
        let index_path = path.join("tantivy_index");
        std::fs::create_dir_all(&index_path)
            .with_context(|| format!("Failed to create {}", index_path.display()))?;

        let (schema, chunk_id_field, case_id_field, text_field, title_field) =
            Self::build_schema();

        let existing = {
            let dir = tantivy::directory::MmapDirectory::open(&index_path)?;
            Index::exists(&dir)?
        }; // dir dropped here, releasing mmap handles

        let index = if existing {
            let opened = Index::open_in_dir(&index_path)?;
            if Self::needs_schema_migration(&opened) {
                drop(opened);
                tracing::warn!(
                    path = %index_path.display(),
                    "Full-text index has an outdated schema; rebuilding. Re-ingest cases to repopulate it."
                );
                std::fs::remove_dir_all(&index_path)?;
                std::fs::create_dir_all(&index_path)?;
                Index::create_in_dir(&index_path, schema)?
            } else {
                opened
            }
        } else {
            Index::create_in_dir(&index_path, schema)?
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create Tantivy reader")?;

        let writer = index
            .writer(50_000_000)
            .context("Failed to create Tantivy writer")?;

        Ok(Self {
            index,
            reader,
            writer: parking_lot::Mutex::new(writer),
            chunk_id_field,
            case_id_field,
            text_field,
            title_field,
        })
    }

    /// Add chunks, replacing any earlier document with the same chunk id.
    /// Changes become visible after [`TextSearch::commit`].
    pub fn index_chunks_batch(&self, chunks: &[TextChunk]) -> Result<()> {
        let writer = self.writer.lock();
        for chunk in chunks {
            writer.delete_term(Term::from_field_text(self.chunk_id_field, &chunk.chunk_id));
            writer.add_document(doc!(
                self.chunk_id_field => chunk.chunk_id.as_str(),
                self.case_id_field => chunk.case_id.as_str(),
                self.text_field => chunk.text.as_str(),
                self.title_field => chunk.title.as_str(),
            ))?;
        }
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.commit().context("Tantivy commit failed")?;
        self.reader.reload()?;
        Ok(())
    }

    /// Top-`k` chunks by BM25 score. Query syntax the parser rejects is
    /// retried as a quoted phrase.
    pub fn search(&self, query: &str, k: usize) -> Result<Vec<RawHit>> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser =
            QueryParser::for_index(&self.index, vec![self.text_field, self.title_field]);

        let parsed_query = match query_parser.parse_query(query) {
            Ok(q) => q,
            Err(e) => {
                tracing::debug!(error = %e, "Query syntax rejected, falling back to phrase query");
                let escaped_query = query.replace('"', "");
                let fallback_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
                fallback_parser.parse_query(&format!("\"{}\"", escaped_query))?
            }
        };

        let top_docs = searcher.search(&parsed_query, &TopDocs::with_limit(k))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(doc_address)?;
            if let Some(id_text) = doc.get_first(self.chunk_id_field).and_then(|v| v.as_str()) {
                results.push(RawHit::new(id_text, score));
            }
        }

        Ok(results)
    }

    /// Delete every chunk of a case and commit immediately.
    pub fn delete_by_case(&self, case_id: &str) -> Result<()> {
        {
            let writer = self.writer.lock();
            writer.delete_term(Term::from_field_text(self.case_id_field, case_id));
        }
        self.commit()?;
        tracing::info!(case_id = %case_id, "Tantivy: deleted case documents");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.delete_all_documents()?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let searcher = self.reader.searcher();
        Ok(searcher.num_docs() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.count().unwrap_or(0) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, case: &str, title: &str, text: &str) -> TextChunk {
        TextChunk {
            chunk_id: id.to_string(),
            case_id: case.to_string(),
            title: title.to_string(),
            text: text.to_string(),
        }
    }

    fn seeded(dir: &Path) -> TextSearch {
        let search = TextSearch::new(dir).unwrap();
        search
            .index_chunks_batch(&[
                chunk("retail-0000", "retail", "Retail", "Warehouse automation cut supply chain costs."),
                chunk("retail-0001", "retail", "Retail", "Store staff adopted handheld scanners."),
                chunk("bank-0000", "bank", "Banking", "Fraud detection with graph analytics."),
            ])
            .unwrap();
        search.commit().unwrap();
        search
    }

    #[test]
    fn test_search_returns_matching_chunk_ids() {
        let dir = tempfile::tempdir().unwrap();
        let search = seeded(dir.path());

        assert_eq!(search.count().unwrap(), 3);
        let hits = search.search("supply chain", 8).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "retail-0000");
        assert!(hits[0].score > 0.0);

        assert!(search.search("zeppelin", 8).unwrap().is_empty());
        assert!(search.search("   ", 8).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_query_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let search = seeded(dir.path());
        // Unbalanced quote and parenthesis are rejected by the parser
        let hits = search.search("fraud detection (\"", 8).unwrap();
        assert!(hits.iter().all(|h| h.chunk_id == "bank-0000"));
    }

    #[test]
    fn test_reindex_replaces_and_delete_by_case() {
        let dir = tempfile::tempdir().unwrap();
        let search = seeded(dir.path());

        search
            .index_chunks_batch(&[chunk("retail-0000", "retail", "Retail", "Pricing experiments.")])
            .unwrap();
        search.commit().unwrap();
        assert_eq!(search.count().unwrap(), 3);
        assert!(search.search("warehouse", 8).unwrap().is_empty());

        search.delete_by_case("retail").unwrap();
        assert_eq!(search.count().unwrap(), 1);

        search.clear().unwrap();
        assert!(search.is_empty());
    }
}
