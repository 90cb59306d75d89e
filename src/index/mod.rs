
use tracing::{debug, info};

use crate::{KbError, Result};

const NORM_EPSILON: f32 = 1e-12;

/// Flat inner-product index over unit-normalized embedding vectors.
///
/// Every stored vector is L2-normalized at build time and every query is
/// normalized before scoring, so the inner product equals cosine similarity
/// and scores stay in [-1, 1]. Position i in the index corresponds to row i
/// of the knowledge base it was built from; the index is immutable once
/// built.
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

/// A single search hit: index position plus cosine similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub position: usize,
    pub score: f32,
}

/// Normalize a vector to unit L2 norm in place.
///
/// The zero vector is left untouched: it has no direction, and leaving it
/// zero makes its inner product against any query 0, which sits below any
/// usable confidence threshold.
#[inline]
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > NORM_EPSILON {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

impl FlatIndex {
    /// Build an index from embedding vectors, in input order.
    ///
    /// The dimension is fixed by the first vector. Fails on an empty input
    /// (a zero-row index can never produce a meaningful match) and on any
    /// vector whose dimension disagrees with the first.
    #[inline]
    pub fn build(mut vectors: Vec<Vec<f32>>) -> Result<Self> {
        if vectors.is_empty() {
            return Err(KbError::Config(
                "Cannot build a vector index from an empty knowledge base".to_string(),
            ));
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(KbError::Config(
                "Embedding vectors must have a non-zero dimension".to_string(),
            ));
        }

        for (position, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(KbError::Config(format!(
                    "Inconsistent embedding dimension at position {}: expected {}, got {}",
                    position,
                    dimension,
                    vector.len()
                )));
            }
        }

        for vector in &mut vectors {
            normalize_l2(vector);
        }

        info!(
            "Built flat index with {} vectors of dimension {}",
            vectors.len(),
            dimension
        );

        Ok(Self { dimension, vectors })
    }

    /// Dimension every stored vector and every query must have.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed vectors.
    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Return the min(k, N) positions with the highest inner product to the
    /// query, sorted by descending score. Equal scores order by ascending
    /// position, the index's natural order.
    ///
    /// A query whose dimension differs from the index dimension is a
    /// configuration error (an embedding model change), not a per-query
    /// failure.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dimension {
            return Err(KbError::Config(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut normalized = query.to_vec();
        normalize_l2(&mut normalized);

        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| SearchHit {
                position,
                score: dot(&normalized, vector),
            })
            .collect();

        // Stable sort keeps ascending-position order among equal scores.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);

        debug!(
            "Index search returned {} hits (k={}, best score {:.3})",
            hits.len(),
            k,
            hits.first().map_or(f32::NAN, |h| h.score)
        );

        Ok(hits)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
