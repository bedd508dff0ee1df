/// One window of a case study's text. Offsets count characters, not bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub order: u32,
    pub char_start: u32,
    pub char_end: u32,
    pub text: String,
}

/// Fixed-size character windows with overlap.
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// `chunk_overlap` is clamped below `chunk_size` so every window advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<ChunkResult> {
        // Byte offset of every char, plus the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        if total_chars == 0 {
            return Vec::new();
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(total_chars);
            chunks.push(ChunkResult {
                order: chunks.len() as u32,
                char_start: start as u32,
                char_end: end as u32,
                text: text[boundaries[start]..boundaries[end]].to_string(),
            });
            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1400, 200)
    }
}

/// Stable chunk identifier, e.g. `acme-retail-0007`.
pub fn chunk_id(case_id: &str, order: u32) -> String {
    format!("{}-{:04}", case_id, order)
}
