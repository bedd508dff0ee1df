use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::search::hybrid::HybridSource;

/// Length of the snippet shown for each source.
pub const SNIPPET_CHARS: usize = 220;

/// A (chunk id, score) pair produced by one retrieval signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawHit {
    pub chunk_id: String,
    pub score: f32,
}

impl RawHit {
    pub fn new(chunk_id: impl Into<String>, score: f32) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            score,
        }
    }
}

/// The document that owns a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStudy {
    pub case_id: String,
    pub title: String,
    pub url: Option<String>,
}

impl CaseStudy {
    pub fn new(case_id: impl Into<String>, title: impl Into<String>, url: Option<String>) -> Self {
        Self {
            case_id: case_id.into(),
            title: title.into(),
            url: url.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Default case id for a title: lower-cased, spaces replaced by dashes.
    pub fn slug_from_title(title: &str) -> String {
        title.trim().to_lowercase().replace(' ', "-")
    }

    /// Clickable form of the stored URL. Scheme-less URLs get `https://`.
    pub fn link(&self) -> Option<String> {
        let url = self.url.as_deref()?.trim();
        if url.is_empty() {
            return None;
        }
        if url.contains("://") {
            Some(url.to_string())
        } else {
            Some(format!("https://{}", url))
        }
    }
}

/// Full indexed record for one chunk, as returned by context resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkContext {
    pub chunk_id: String,
    pub case_study: CaseStudy,
    pub text: String,
    pub order: u32,
    pub char_start: u32,
    pub char_end: u32,
    /// The chunk's own embedding, when the store keeps one
    pub embedding: Option<Vec<f32>>,
}

/// Internal chunk record for storage operations
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub case_id: String,
    pub title: String,
    pub url: Option<String>,
    pub text: String,
    pub order: u32,
    pub char_start: u32,
    pub char_end: u32,
    pub vector: Vec<f32>,
    pub created_at: i64,
}

/// Per-signal scores for one chunk after fusion, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedScore {
    pub chunk_id: String,
    pub semantic: f32,
    pub lexical: f32,
    pub hybrid: f32,
    pub source: HybridSource,
}

/// A fused, context-enriched unit of ranking.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub chunk_id: String,
    pub case_study: CaseStudy,
    pub text: String,
    pub order: u32,
    pub char_start: u32,
    pub char_end: u32,
    pub semantic: f32,
    pub lexical: f32,
    pub hybrid: f32,
    /// Which signals reported this chunk
    pub source: HybridSource,
    /// Vector used for similarity comparisons during diversification
    #[serde(skip)]
    pub vector: Arc<[f32]>,
}

impl Candidate {
    pub fn from_context(fused: FusedScore, context: ChunkContext, vector: Arc<[f32]>) -> Self {
        Self {
            chunk_id: fused.chunk_id,
            case_study: context.case_study,
            text: context.text,
            order: context.order,
            char_start: context.char_start,
            char_end: context.char_end,
            semantic: fused.semantic,
            lexical: fused.lexical,
            hybrid: fused.hybrid,
            source: fused.source,
            vector,
        }
    }
}

/// Outcome of one retrieval call.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub candidates: Vec<Candidate>,
    /// Hybrid score of the first candidate, 0.0 when empty
    pub best_score: f32,
}

impl Retrieval {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        let best_score = candidates.first().map(|c| c.hybrid).unwrap_or(0.0);
        Self {
            candidates,
            best_score,
        }
    }

    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            best_score: 0.0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Whether callers should answer from these passages.
    pub fn is_grounded(&self, threshold: f32) -> bool {
        !self.candidates.is_empty() && self.best_score >= threshold
    }

    /// Render the first `limit` candidates as displayable sources.
    pub fn source_items(&self, limit: usize) -> Vec<SourceItem> {
        self.candidates
            .iter()
            .take(limit)
            .map(SourceItem::from_candidate)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRef {
    pub chunk_id: String,
    pub text: String,
    pub order: u32,
    pub char_start: u32,
    pub char_end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceItem {
    pub answer_snippet: String,
    pub score: f32,
    pub case_study: CaseStudy,
    pub chunk: ChunkRef,
}

impl SourceItem {
    pub fn from_candidate(candidate: &Candidate) -> Self {
        Self {
            answer_snippet: snippet(&candidate.text, SNIPPET_CHARS),
            score: (candidate.hybrid * 1000.0).round() / 1000.0,
            case_study: candidate.case_study.clone(),
            chunk: ChunkRef {
                chunk_id: candidate.chunk_id.clone(),
                text: candidate.text.clone(),
                order: candidate.order,
                char_start: candidate.char_start,
                char_end: candidate.char_end,
            },
        }
    }
}

fn snippet(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}
