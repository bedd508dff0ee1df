use serde::Serialize;
use std::collections::HashMap;

use crate::types::{FusedScore, RawHit};

/// Which retrieval signals reported a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HybridSource {
    Vector,
    TextSearch,
    Both,
}

impl HybridSource {
    fn merge(self, other: HybridSource) -> HybridSource {
        if self == other {
            self
        } else {
            HybridSource::Both
        }
    }
}

#[derive(Clone, Copy)]
enum Signal {
    Semantic,
    Lexical,
}

/// Per-chunk accumulation keyed by chunk id, kept in first-seen order so
/// downstream stable sorts break ties deterministically.
#[derive(Default)]
struct Accumulator {
    index: HashMap<String, usize>,
    entries: Vec<FusedScore>,
}

impl Accumulator {
    fn record(mut self, hit: &RawHit, signal: Signal) -> Self {
        let source = match signal {
            Signal::Semantic => HybridSource::Vector,
            Signal::Lexical => HybridSource::TextSearch,
        };

        let slot = match self.index.get(&hit.chunk_id) {
            Some(&i) => i,
            None => {
                self.index.insert(hit.chunk_id.clone(), self.entries.len());
                self.entries.push(FusedScore {
                    chunk_id: hit.chunk_id.clone(),
                    semantic: 0.0,
                    lexical: 0.0,
                    hybrid: 0.0,
                    source,
                });
                self.entries.len() - 1
            }
        };

        // Max-write: duplicate hits within one signal never add up
        let entry = &mut self.entries[slot];
        match signal {
            Signal::Semantic => entry.semantic = entry.semantic.max(hit.score),
            Signal::Lexical => entry.lexical = entry.lexical.max(hit.score),
        }
        entry.source = entry.source.merge(source);
        self
    }
}

/// Weighted combination of already-normalized semantic and lexical hits.
/// `hybrid = alpha * semantic + (1 - alpha) * lexical`, with a missing
/// signal counting as 0.
pub fn fuse(semantic: &[RawHit], lexical: &[RawHit], alpha: f32) -> Vec<FusedScore> {
    let accumulated = semantic
        .iter()
        .map(|hit| (hit, Signal::Semantic))
        .chain(lexical.iter().map(|hit| (hit, Signal::Lexical)))
        .fold(Accumulator::default(), |acc, (hit, signal)| {
            acc.record(hit, signal)
        });

    accumulated
        .entries
        .into_iter()
        .map(|entry| FusedScore {
            hybrid: alpha * entry.semantic + (1.0 - alpha) * entry.lexical,
            ..entry
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(fused: &'a [FusedScore], id: &str) -> &'a FusedScore {
        fused.iter().find(|f| f.chunk_id == id).unwrap()
    }

    #[test]
    fn test_merges_both_signals() {
        let semantic = vec![RawHit::new("c1", 0.0), RawHit::new("c3", 1.0)];
        let lexical = vec![RawHit::new("c1", 1.0), RawHit::new("c2", 0.0)];
        let fused = fuse(&semantic, &lexical, 0.6);

        assert_eq!(fused.len(), 3);
        let ids: Vec<&str> = fused.iter().map(|f| f.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3", "c2"]);

        let c1 = find(&fused, "c1");
        assert_eq!(c1.source, HybridSource::Both);
        assert!((c1.hybrid - 0.4).abs() < 1e-6);

        let c3 = find(&fused, "c3");
        assert_eq!(c3.source, HybridSource::Vector);
        assert_eq!(c3.lexical, 0.0);
        assert!((c3.hybrid - 0.6).abs() < 1e-6);

        let c2 = find(&fused, "c2");
        assert_eq!(c2.source, HybridSource::TextSearch);
        assert_eq!(c2.hybrid, 0.0);
    }

    #[test]
    fn test_duplicate_hits_keep_maximum() {
        let semantic = vec![
            RawHit::new("c1", 0.3),
            RawHit::new("c1", 0.8),
            RawHit::new("c1", 0.5),
        ];
        let fused = fuse(&semantic, &[], 0.6);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].semantic - 0.8).abs() < 1e-6);
        assert_eq!(fused[0].source, HybridSource::Vector);
    }

    #[test]
    fn test_fusing_duplicated_list_is_idempotent() {
        let lexical = vec![RawHit::new("a", 1.0), RawHit::new("b", 0.25)];
        let doubled: Vec<RawHit> = lexical.iter().chain(lexical.iter()).cloned().collect();

        let once = fuse(&[], &lexical, 0.6);
        let twice = fuse(&[], &doubled, 0.6);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_hybrid_is_convex_combination() {
        let semantic = vec![RawHit::new("x", 0.7)];
        let lexical = vec![RawHit::new("x", 0.2)];
        for alpha in [0.0f32, 0.25, 0.6, 1.0] {
            let fused = fuse(&semantic, &lexical, alpha);
            let expected = alpha * 0.7 + (1.0 - alpha) * 0.2;
            assert_eq!(fused[0].hybrid, expected);
            assert!((0.0..=1.0).contains(&fused[0].hybrid));
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(fuse(&[], &[], 0.6).is_empty());
    }
}
