//! Vector index abstraction for chunk embeddings.
//!
//! Defines a trait for exact similarity search and the flat in-memory
//! implementation every named index uses.

use crate::embeddings::l2_normalize;
use ragdex_core::{AppError, AppResult};
use std::collections::HashSet;

/// Trait for vector index backends.
///
/// Implementations must support:
/// - Appending rows keyed by chunk id, all-or-nothing
/// - Exact top-k search by inner product
/// - Reporting dimension and row count
pub trait VectorIndex: Send + Sync {
    /// Dimension every stored and query vector must have.
    fn dimension(&self) -> usize;

    /// Number of stored rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `vectors` under `chunk_ids`, normalizing each one.
    ///
    /// Every check runs before the first row is written, so a failed add
    /// leaves the index exactly as it was.
    fn add(&mut self, vectors: Vec<Vec<f32>>, chunk_ids: &[String]) -> AppResult<()>;

    /// Return at most `k` `(chunk_id, score)` pairs ordered by descending
    /// score, ties broken by ascending chunk id.
    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(String, f32)>>;
}

/// Exhaustive inner-product index over row-major `f32` storage.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimension: usize,
    data: Vec<f32>,
    row_map: Vec<String>,
    ids: HashSet<String>,
}

impl FlatIndex {
    /// Create an empty index.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            row_map: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Rebuild an index from persisted parts without renormalizing.
    ///
    /// The caller has already checked that `data.len() == rows * dimension`
    /// and that `row_map` holds no duplicates.
    pub(crate) fn from_parts(dimension: usize, data: Vec<f32>, row_map: Vec<String>) -> Self {
        let ids = row_map.iter().cloned().collect();
        Self {
            dimension,
            data,
            row_map,
            ids,
        }
    }

    /// Row-major vector storage.
    pub fn vectors(&self) -> &[f32] {
        &self.data
    }

    /// Chunk id of every row, in row order.
    pub fn row_map(&self) -> &[String] {
        &self.row_map
    }

    /// Vector stored at `row`.
    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    pub fn contains(&self, chunk_id: &str) -> bool {
        self.ids.contains(chunk_id)
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.row_map.len()
    }

    fn add(&mut self, mut vectors: Vec<Vec<f32>>, chunk_ids: &[String]) -> AppResult<()> {
        if vectors.len() != chunk_ids.len() {
            return Err(AppError::InvalidConfiguration(format!(
                "Got {} vectors for {} chunk ids",
                vectors.len(),
                chunk_ids.len()
            )));
        }

        let mut incoming = HashSet::with_capacity(chunk_ids.len());
        for (vector, chunk_id) in vectors.iter_mut().zip(chunk_ids) {
            if vector.len() != self.dimension {
                return Err(AppError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }

            if self.ids.contains(chunk_id) || !incoming.insert(chunk_id.as_str()) {
                return Err(AppError::DuplicateChunkId(chunk_id.clone()));
            }

            // Normalizing the owned copy is safe; nothing is committed yet
            if !l2_normalize(vector) {
                return Err(AppError::InvalidVector {
                    chunk_id: chunk_id.clone(),
                    reason: "vector has zero norm or non-finite values".to_string(),
                });
            }
        }

        self.data.reserve(vectors.len() * self.dimension);
        for (vector, chunk_id) in vectors.into_iter().zip(chunk_ids) {
            self.data.extend_from_slice(&vector);
            self.row_map.push(chunk_id.clone());
            self.ids.insert(chunk_id.clone());
        }

        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> AppResult<Vec<(String, f32)>> {
        if k == 0 {
            return Err(AppError::InvalidQuery("k must be at least 1".to_string()));
        }

        if query.len() != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.row_map.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = query.to_vec();
        if !l2_normalize(&mut query) {
            return Err(AppError::InvalidQuery(
                "query vector has zero norm or non-finite values".to_string(),
            ));
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .map(|row| row.iter().zip(&query).map(|(a, b)| a * b).sum::<f32>())
            .enumerate()
            .collect();

        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| self.row_map[a.0].cmp(&self.row_map[b.0]))
        });
        scored.truncate(k);

        tracing::debug!(
            "Searched {} rows, returning {} (requested top-{})",
            self.row_map.len(),
            scored.len(),
            k
        );

        Ok(scored
            .into_iter()
            .map(|(row, score)| (self.row_map[row].clone(), score))
            .collect())
    }
}
