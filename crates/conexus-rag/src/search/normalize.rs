use crate::types::RawHit;

/// Spans narrower than this are treated as "all scores equal".
pub const SCORE_SPAN_EPSILON: f32 = 1e-9;

/// Min-max scale raw scores into [0, 1], preserving order and length.
/// When every score is effectively the same (including a single score),
/// each maps to 1.0.
pub fn min_max_normalize(scores: &[f32]) -> Vec<f32> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores.iter().copied().fold(f32::MIN, f32::max);
    let min = scores.iter().copied().fold(f32::MAX, f32::min);
    let range = max - min;
    if range < SCORE_SPAN_EPSILON {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|s| (s - min) / range).collect()
}

/// Normalize the scores of one signal's hit list in place of the raw ones.
pub fn normalize_hits(hits: Vec<RawHit>) -> Vec<RawHit> {
    let scores: Vec<f32> = hits.iter().map(|h| h.score).collect();
    hits.into_iter()
        .zip(min_max_normalize(&scores))
        .map(|(hit, score)| RawHit { score, ..hit })
        .collect()
}
