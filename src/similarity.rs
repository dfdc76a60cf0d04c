//! Similarity engine — ranked search, duplicate grouping, and
//! contradiction-candidate filtering over in-memory vectors.
//!
//! Everything here is pure and synchronous: no I/O, no cache or service
//! dependency. Contradiction *judgment* is explicitly out of scope — see
//! [`crate::insight`] for the chat-backed explanation step this module
//! only feeds candidates into.

use serde::Serialize;

use crate::error::Result;
use crate::vector::cosine_similarity;

/// Cosine similarity at or above which two texts are treated as likely
/// duplicates.
pub const DUPLICATE_THRESHOLD: f32 = 0.85;

/// Cosine similarity at or above which two texts are semantically related
/// enough to warrant a contradiction check. This is a filter, not a
/// judgment: similarity does not imply contradiction.
pub const CONTRADICTION_THRESHOLD: f32 = 0.70;

/// A ranked match against a candidate set. `index` refers to the caller's
/// candidate ordering; results are ephemeral and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityMatch {
    pub index: usize,
    pub score: f32,
}

/// Score `query` against every candidate, drop scores below `min_threshold`,
/// sort descending, and truncate to `top_k`.
///
/// Equal scores keep their original candidate order (first seen wins), so
/// output is deterministic.
pub fn find_similar(
    query: &[f32],
    candidates: &[Vec<f32>],
    top_k: usize,
    min_threshold: f32,
) -> Result<Vec<SimilarityMatch>> {
    let mut matches = Vec::with_capacity(candidates.len());
    for (index, candidate) in candidates.iter().enumerate() {
        let score = cosine_similarity(query, candidate)?;
        if score >= min_threshold {
            matches.push(SimilarityMatch { index, score });
        }
    }

    // Stable sort: ties retain ascending-index order from the push above.
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(top_k);
    Ok(matches)
}

/// Group indices whose pairwise similarity exceeds `threshold`, using
/// single-link clustering over a union-find: an item joins a group if it
/// matches *any* existing member. Loosely related items can therefore chain
/// together through a path of pairwise matches — a documented characteristic
/// of this policy, not full clique detection.
///
/// Only groups with two or more members are returned, ordered by their
/// smallest member index, members ascending.
pub fn find_similar_groups(embeddings: &[Vec<f32>], threshold: f32) -> Result<Vec<Vec<usize>>> {
    let mut uf = UnionFind::new(embeddings.len());

    for i in 0..embeddings.len() {
        for j in (i + 1)..embeddings.len() {
            if cosine_similarity(&embeddings[i], &embeddings[j])? > threshold {
                uf.union(i, j);
            }
        }
    }

    let mut groups: std::collections::BTreeMap<usize, Vec<usize>> =
        std::collections::BTreeMap::new();
    for i in 0..embeddings.len() {
        groups.entry(uf.find(i)).or_default().push(i);
    }

    let mut groups: Vec<Vec<usize>> = groups
        .into_values()
        .filter(|members| members.len() >= 2)
        .collect();
    // Roots are not guaranteed to be the smallest member, so order
    // explicitly by first (lowest) index.
    groups.sort_by_key(|members| members[0]);
    Ok(groups)
}

/// Likely-duplicate check at [`DUPLICATE_THRESHOLD`].
pub fn is_duplicate(a: &[f32], b: &[f32]) -> Result<bool> {
    is_duplicate_at(a, b, DUPLICATE_THRESHOLD)
}

/// Likely-duplicate check at a caller-supplied threshold.
pub fn is_duplicate_at(a: &[f32], b: &[f32], threshold: f32) -> Result<bool> {
    Ok(cosine_similarity(a, b)? >= threshold)
}

/// Candidates similar enough to `query` to be worth a contradiction check,
/// ranked by score. Strictly a filter feeding an external reasoning step.
pub fn contradiction_candidates(
    query: &[f32],
    candidates: &[Vec<f32>],
    threshold: f32,
) -> Result<Vec<SimilarityMatch>> {
    find_similar(query, candidates, candidates.len(), threshold)
}

/// Union-find with path halving and union by size.
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}
