//! Exact nearest-neighbour search over a contiguous vector store.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Indexes with at least this many rows compute distances in parallel.
const PARALLEL_THRESHOLD: usize = 2048;

/// Distance metric. Smaller distances mean closer vectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// `1 - cosine_similarity`; zero vectors are at distance 1 from everything.
    Cosine,
}

impl Metric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = x - y;
                    d * d
                })
                .sum(),
            Metric::Cosine => 1.0 - cosine_similarity(a, b),
        }
    }

    /// Map a distance onto a similarity where larger is closer.
    pub fn similarity(self, distance: f32) -> f32 {
        match self {
            Metric::L2 => 1.0 / (1.0 + distance),
            Metric::Cosine => 1.0 - distance,
        }
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// A search hit: the ordinal of a stored vector and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}

impl Neighbor {
    /// Closest first; equal distances resolve to the lower ordinal.
    fn rank(&self, other: &Neighbor) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.ordinal.cmp(&other.ordinal))
    }
}

/// Row-major store of equal-length vectors. Row `i` belongs to ordinal `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatVectors {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatVectors {
    /// Wrap row-major data. `data.len()` must be a multiple of `dimension`.
    pub(crate) fn from_raw(dimension: usize, data: Vec<f32>) -> Self {
        debug_assert!(if dimension == 0 {
            data.is_empty()
        } else {
            data.len() % dimension == 0
        });
        Self { dimension, data }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, ordinal: usize) -> Option<&[f32]> {
        if ordinal >= self.len() {
            return None;
        }
        let start = ordinal * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// The `k` rows closest to `query`, closest first.
    ///
    /// `query` must have `dimension()` elements; returns fewer than `k`
    /// neighbours only when the store holds fewer rows.
    pub fn search(&self, query: &[f32], k: usize, metric: Metric) -> Vec<Neighbor> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let score = |(ordinal, row): (usize, &[f32])| Neighbor {
            ordinal,
            distance: metric.distance(query, row),
        };

        let mut neighbors: Vec<Neighbor> = if self.len() >= PARALLEL_THRESHOLD {
            self.data
                .par_chunks(self.dimension)
                .enumerate()
                .map(score)
                .collect()
        } else {
            self.data.chunks(self.dimension).enumerate().map(score).collect()
        };

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k, Neighbor::rank);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(Neighbor::rank);
        neighbors
    }
}
