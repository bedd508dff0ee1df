use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

use crate::types::{CaseStudy, ChunkContext, ChunkRecord, RawHit};

/// Chunk table: one row per chunk, with its owning case study denormalized.
pub struct LanceStore {
    db: lancedb::Connection,
    dimension: usize,
    table_name: String,
}

impl LanceStore {
    pub async fn new(path: &str, dimension: usize) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create LanceDB directory {}", path))?;
        let db = lancedb::connect(path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let store = Self {
            db,
            dimension,
            table_name: "chunks".to_string(),
        };

        store.ensure_table().await?;
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("case_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("url", DataType::Utf8, true),
            Field::new("text", DataType::Utf8, false),
            Field::new("chunk_order", DataType::UInt32, false),
            Field::new("char_start", DataType::UInt32, false),
            Field::new("char_end", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
            Field::new("created_at", DataType::Int64, false),
        ]))
    }

    fn record_batch(&self, chunks: &[ChunkRecord]) -> Result<RecordBatch> {
        let flat_vectors: Vec<f32> = chunks.iter().flat_map(|c| c.vector.iter().copied()).collect();
        let values = Float32Array::from(flat_vectors);
        let vector_array = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        );

        RecordBatch::try_new(
            self.schema(),
            vec![
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.chunk_id.as_str()).collect::<Vec<_>>(),
                )) as Arc<dyn Array>,
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.case_id.as_str()).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.title.as_str()).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.url.as_deref()).collect::<Vec<_>>(),
                )),
                Arc::new(StringArray::from(
                    chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
                )),
                Arc::new(UInt32Array::from(
                    chunks.iter().map(|c| c.order).collect::<Vec<_>>(),
                )),
                Arc::new(UInt32Array::from(
                    chunks.iter().map(|c| c.char_start).collect::<Vec<_>>(),
                )),
                Arc::new(UInt32Array::from(
                    chunks.iter().map(|c| c.char_end).collect::<Vec<_>>(),
                )),
                Arc::new(vector_array) as Arc<dyn Array>,
                Arc::new(Int64Array::from(
                    chunks.iter().map(|c| c.created_at).collect::<Vec<_>>(),
                )),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn ensure_table(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&self.table_name) {
            // Create with a seed record, then delete it
            let seed = ChunkRecord {
                chunk_id: "__seed__".to_string(),
                case_id: "__seed__".to_string(),
                title: String::new(),
                url: None,
                text: String::new(),
                order: 0,
                char_start: 0,
                char_end: 0,
                vector: vec![0.0f32; self.dimension],
                created_at: 0,
            };
            let schema = self.schema();
            let batch = self
                .record_batch(std::slice::from_ref(&seed))
                .context("Failed to create seed RecordBatch")?;
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(&self.table_name, Box::new(batches))
                .execute()
                .await
                .context("Failed to create chunks table")?;

            let table = self.db.open_table(&self.table_name).execute().await?;
            table.delete("chunk_id = '__seed__'").await.ok();
        }
        Ok(())
    }

    async fn open(&self) -> Result<lancedb::Table> {
        self.db
            .open_table(&self.table_name)
            .execute()
            .await
            .context("Failed to open chunks table")
    }

    /// Insert chunks, replacing rows that share a chunk id.
    pub async fn upsert_chunks(&self, chunks: Vec<ChunkRecord>) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        if let Some(bad) = chunks.iter().find(|c| c.vector.len() != self.dimension) {
            anyhow::bail!(
                "Chunk {} has a {}-dimensional vector, store expects {}",
                bad.chunk_id,
                bad.vector.len(),
                self.dimension
            );
        }

        let table = self.open().await?;

        for ids in chunks.chunks(50) {
            let id_list: Vec<String> = ids.iter().map(|c| quote(&c.chunk_id)).collect();
            table
                .delete(&format!("chunk_id IN ({})", id_list.join(", ")))
                .await
                .context("Failed to replace existing chunks")?;
        }

        let len = chunks.len();
        let batch = self.record_batch(&chunks)?;
        let reader = RecordBatchIterator::new(vec![Ok(batch)], self.schema());
        table
            .add(Box::new(reader))
            .execute()
            .await
            .context("Failed to insert chunks")?;

        tracing::debug!("Upserted {} chunks into LanceDB", len);
        Ok(())
    }

    /// Nearest chunks by cosine distance, scored `max(0, 1 - distance)`.
    pub async fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<RawHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let table = self.open().await?;

        let results = table
            .query()
            .nearest_to(query)?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(k)
            .select(lancedb::query::Select::columns(&["chunk_id"]))
            .execute()
            .await
            .context("LanceDB vector search failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;

        let mut hits = Vec::new();
        for batch in &batches {
            let ids = string_column(batch, "chunk_id");
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());
            let (Some(ids), Some(distances)) = (ids, distances) else {
                continue;
            };
            for i in 0..batch.num_rows() {
                hits.push(RawHit::new(ids.value(i), (1.0 - distances.value(i)).max(0.0)));
            }
        }
        Ok(hits)
    }

    /// Full record for one chunk, or `None` when the id is not stored.
    pub async fn get_context(&self, chunk_id: &str) -> Result<Option<ChunkContext>> {
        let table = self.open().await?;
        let results = table
            .query()
            .only_if(format!("chunk_id = {}", quote(chunk_id)))
            .limit(1)
            .execute()
            .await
            .context("LanceDB context lookup failed")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        Ok(extract_contexts_from_batches(&batches).into_iter().next())
    }

    pub async fn delete_by_case(&self, case_id: &str) -> Result<usize> {
        let table = self.open().await?;
        let count_before = table.count_rows(None).await.unwrap_or(0);
        table.delete(&format!("case_id = {}", quote(case_id))).await?;
        let count_after = table.count_rows(None).await.unwrap_or(0);
        let deleted = count_before.saturating_sub(count_after);
        tracing::info!(case_id = %case_id, deleted = deleted, "Deleted chunks by case_id");
        Ok(deleted)
    }

    pub async fn clear(&self) -> Result<()> {
        let names = self.db.table_names().execute().await?;
        if names.contains(&self.table_name) {
            self.db.drop_table(&self.table_name, &[]).await?;
        }
        self.ensure_table().await?;
        Ok(())
    }

    pub async fn count(&self) -> Result<usize> {
        let table = self.open().await?;
        let count = table.count_rows(None).await?;
        Ok(count)
    }

    /// Count distinct case studies in the store.
    pub async fn count_cases(&self) -> Result<usize> {
        let table = self.open().await?;
        let results = table
            .query()
            .select(lancedb::query::Select::columns(&["case_id"]))
            .execute()
            .await
            .context("Failed to query case ids")?;

        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results).await?;
        let mut case_ids = std::collections::HashSet::new();
        for batch in &batches {
            if let Some(col) = string_column(batch, "case_id") {
                for i in 0..col.len() {
                    let val = col.value(i);
                    if !val.is_empty() && val != "__seed__" {
                        case_ids.insert(val.to_string());
                    }
                }
            }
        }
        Ok(case_ids.len())
    }

    pub async fn create_index_if_needed(&self) -> Result<()> {
        let count = self.count().await?;
        if count >= 1_000 {
            let table = self.open().await?;
            table
                .create_index(&["vector"], lancedb::index::Index::Auto)
                .execute()
                .await
                .context("Failed to create vector index")?;
            tracing::info!("Created vector index on {} rows", count);
        } else {
            tracing::debug!(rows = count, "Skipping vector index, flat search is sufficient");
        }
        Ok(())
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
}

/// Extract chunk contexts (including stored vectors) from Arrow batches.
fn extract_contexts_from_batches(batches: &[RecordBatch]) -> Vec<ChunkContext> {
    let mut contexts = Vec::new();
    for batch in batches {
        let ids = string_column(batch, "chunk_id");
        let case_ids = string_column(batch, "case_id");
        let titles = string_column(batch, "title");
        let texts = string_column(batch, "text");
        let (Some(ids), Some(case_ids), Some(titles), Some(texts)) = (ids, case_ids, titles, texts)
        else {
            continue;
        };
        let urls = string_column(batch, "url");
        let orders = u32_column(batch, "chunk_order");
        let starts = u32_column(batch, "char_start");
        let ends = u32_column(batch, "char_end");
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>());

        for i in 0..batch.num_rows() {
            let url = urls
                .filter(|u| !u.is_null(i))
                .map(|u| u.value(i).to_string());
            let embedding = vectors.filter(|v| !v.is_null(i)).and_then(|v| {
                let row = v.value(i);
                row.as_any()
                    .downcast_ref::<Float32Array>()
                    .map(|values| values.values().to_vec())
            });

            contexts.push(ChunkContext {
                chunk_id: ids.value(i).to_string(),
                case_study: CaseStudy::new(case_ids.value(i), titles.value(i), url),
                text: texts.value(i).to_string(),
                order: orders.map(|c| c.value(i)).unwrap_or(0),
                char_start: starts.map(|c| c.value(i)).unwrap_or(0),
                char_end: ends.map(|c| c.value(i)).unwrap_or(0),
                embedding,
            });
        }
    }
    contexts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_escapes_single_quotes() {
        assert_eq!(quote("o'brien-0001"), "'o''brien-0001'");
    }

    #[test]
    fn test_extract_contexts_reads_vectors_and_nullable_url() {
        let dimension = 2;
        let schema = Arc::new(Schema::new(vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("case_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("url", DataType::Utf8, true),
            Field::new("text", DataType::Utf8, false),
            Field::new("chunk_order", DataType::UInt32, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension,
                ),
                true,
            ),
        ]));
        let vectors = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            dimension,
            Arc::new(Float32Array::from(vec![1.0f32, 0.0, 0.0, 1.0])) as Arc<dyn Array>,
            None,
        );
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["acme-0000", "acme-0001"])) as Arc<dyn Array>,
                Arc::new(StringArray::from(vec!["acme", "acme"])),
                Arc::new(StringArray::from(vec!["Acme", "Acme"])),
                Arc::new(StringArray::from(vec![Some("acme.example.com"), None])),
                Arc::new(StringArray::from(vec!["first", "second"])),
                Arc::new(UInt32Array::from(vec![0u32, 1])),
                Arc::new(vectors) as Arc<dyn Array>,
            ],
        )
        .unwrap();

        let contexts = extract_contexts_from_batches(&[batch]);
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].case_study.url.as_deref(), Some("acme.example.com"));
        assert!(contexts[1].case_study.url.is_none());
        assert_eq!(contexts[1].order, 1);
        assert_eq!(contexts[0].embedding.as_deref(), Some(&[1.0f32, 0.0][..]));
        assert_eq!(contexts[1].embedding.as_deref(), Some(&[0.0f32, 1.0][..]));
        // Missing span columns default to zero
        assert_eq!(contexts[1].char_end, 0);
    }

    fn record(id: &str, vector: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk_id: id.to_string(),
            case_id: "acme".to_string(),
            title: "Acme".to_string(),
            url: Some("acme.example.com".to_string()),
            text: format!("text of {}", id),
            order: 0,
            char_start: 0,
            char_end: 10,
            vector,
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_context_lookup_and_vector_scores() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lance");
        let store = LanceStore::new(path.to_str().unwrap(), 3).await.unwrap();
        store
            .upsert_chunks(vec![
                record("acme-0000", vec![1.0, 0.0, 0.0]),
                record("acme-0001", vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();

        // An unknown id is a miss, not a failure
        assert!(store.get_context("missing").await.unwrap().is_none());

        let context = store.get_context("acme-0001").await.unwrap().unwrap();
        assert_eq!(context.text, "text of acme-0001");
        assert_eq!(context.case_study.case_id, "acme");
        assert_eq!(context.embedding.as_deref(), Some(&[0.0f32, 1.0, 0.0][..]));

        let hits = store.vector_search(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "acme-0000");
        assert!((hits[0].score - 1.0).abs() < 1e-4, "score {}", hits[0].score);
        assert!(hits.iter().all(|h| (0.0..=1.0 + 1e-4).contains(&h.score)));

        // Upsert replaces rows that share an id
        store
            .upsert_chunks(vec![record("acme-0000", vec![0.0, 0.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.count_cases().await.unwrap(), 1);
    }
}
