//! Exact nearest-neighbor index over squared Euclidean distance.
//!
//! Vectors are stored contiguously in insertion order; position `i` in a
//! search result is the `i`-th vector passed to [`VectorIndex::build`].


use std::cmp::Ordering;
use tracing::debug;

use crate::{AssistError, Result};

/// A search hit: index position and squared L2 distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Brute-force (flat) L2 index. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dimension: usize,
    len: usize,
    data: Vec<f32>,
    built: bool,
}

impl VectorIndex {
    /// An index that has not been built yet; searching it fails with
    /// [`AssistError::IndexNotBuilt`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a new index from `vectors`.
    #[inline]
    pub fn from_vectors(vectors: &[Vec<f32>]) -> Result<Self> {
        let mut index = Self::new();
        index.build(vectors)?;
        Ok(index)
    }

    /// Replace the contents of the index with `vectors`. On error the index is
    /// left unchanged.
    #[inline]
    pub fn build(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let first = vectors.first().ok_or(AssistError::EmptyIndex)?;
        let dimension = first.len();

        if dimension == 0 {
            return Err(AssistError::DimensionMismatch {
                expected: 1,
                found: 0,
                position: 0,
            });
        }

        if let Some((position, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(AssistError::DimensionMismatch {
                expected: dimension,
                found: vector.len(),
                position,
            });
        }

        let mut data = Vec::with_capacity(dimension * vectors.len());
        for vector in vectors {
            data.extend_from_slice(vector);
        }

        self.dimension = dimension;
        self.len = vectors.len();
        self.data = data;
        self.built = true;

        debug!(
            "Built flat L2 index with {} vectors of dimension {}",
            self.len, self.dimension
        );
        Ok(())
    }

    /// The `k` nearest vectors to `query`, closest first, ties broken by the
    /// lower position. Returns at most `len()` neighbors.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if !self.built {
            return Err(AssistError::IndexNotBuilt);
        }

        if query.len() != self.dimension {
            return Err(AssistError::DimensionMismatch {
                expected: self.dimension,
                found: query.len(),
                position: 0,
            });
        }

        let k = k.min(self.len);
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: squared_l2(query, vector),
            })
            .collect();

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(compare_neighbors);

        Ok(neighbors)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.built
    }
}

/// Squared Euclidean distance between two equal-length vectors
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0_f32, |acc, (x, y)| {
        let diff = x - y;
        diff.mul_add(diff, acc)
    })
}

// NaN distances sort after every number; positions break ties.
fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    match (a.distance.is_nan(), b.distance.is_nan()) {
        (false, true) => Ordering::Less,
        (true, false) => Ordering::Greater,
        (true, true) => Ordering::Equal,
        (false, false) => a.distance.total_cmp(&b.distance),
    }
    .then_with(|| a.position.cmp(&b.position))
}
