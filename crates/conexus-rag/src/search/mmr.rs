//! Maximal Marginal Relevance selection.
//!
//! `mmr(d) = lambda * relevance(d) - (1 - lambda) * max_{s in S} cos(d, s)`
//!
//! The seed is always the most relevant candidate. Each later pick trades
//! relevance against its closest already-selected neighbour. Scores are
//! not rescaled, so MMR values may be negative; only their order matters.

use crate::types::Candidate;

/// Guards the cosine denominator against zero-norm vectors.
pub const COSINE_EPSILON: f32 = 1e-9;

/// Something the diversity selector can rank.
pub trait Diversifiable {
    fn relevance(&self) -> f32;
    fn comparison_vector(&self) -> &[f32];
}

impl Diversifiable for Candidate {
    fn relevance(&self) -> f32 {
        self.hybrid
    }

    fn comparison_vector(&self) -> &[f32] {
        &self.vector
    }
}

/// `dot(a, b) / (|a| * |b| + eps)`. Mismatched lengths and zero vectors
/// give 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb + COSINE_EPSILON)
}

/// Greedily select up to `n` items from `candidates`.
///
/// Ties on relevance (seed) and on MMR score (later picks) go to the item
/// that comes first in `candidates`.
pub fn mmr_select<T: Diversifiable>(candidates: Vec<T>, n: usize, lambda: f32) -> Vec<T> {
    if candidates.is_empty() || n == 0 {
        return Vec::new();
    }

    let target = n.min(candidates.len());
    let mut order: Vec<usize> = Vec::with_capacity(target);
    let mut taken = vec![false; candidates.len()];

    let mut seed = 0;
    for (i, c) in candidates.iter().enumerate().skip(1) {
        if c.relevance() > candidates[seed].relevance() {
            seed = i;
        }
    }
    order.push(seed);
    taken[seed] = true;

    // Closest selected neighbour per candidate, refreshed against the
    // latest pick only.
    let mut max_sim = vec![f32::NEG_INFINITY; candidates.len()];

    while order.len() < target {
        let last = candidates[order[order.len() - 1]].comparison_vector();

        let mut best: Option<(usize, f32)> = None;
        for (i, c) in candidates.iter().enumerate() {
            if taken[i] {
                continue;
            }
            let sim = cosine_similarity(c.comparison_vector(), last);
            if sim > max_sim[i] {
                max_sim[i] = sim;
            }
            let score = lambda * c.relevance() - (1.0 - lambda) * max_sim[i];
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((i, score)),
            }
        }

        let Some((pick, score)) = best else {
            break;
        };
        tracing::trace!(index = pick, mmr = score, "MMR pick");
        order.push(pick);
        taken[pick] = true;
    }

    let mut slots: Vec<Option<T>> = candidates.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}
