//! Precomputed vocabulary embeddings with exhaustive cosine nearest-neighbor lookup

use crate::error::{Result, SkillAlignerError};
use crate::processing::embeddings::Embedder;
use crate::processing::vocabulary::SkillVocabulary;
use log::info;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::time::Instant;

/// Row `i` of `embeddings` is the embedding of `names[i]`
pub struct SkillEmbeddingIndex {
    names: Vec<String>,
    embeddings: Array2<f32>,
    norms: Array1<f32>,
}

/// Best vocabulary row for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest {
    pub index: usize,
    pub similarity: f32,
}

impl SkillEmbeddingIndex {
    /// Embed every vocabulary skill once, `batch_size` names per embedder call
    pub fn build(vocabulary: &SkillVocabulary, embedder: &dyn Embedder, batch_size: usize) -> Result<Self> {
        let start_time = Instant::now();
        let names = vocabulary.skills().to_vec();

        let mut vectors = Vec::with_capacity(names.len());
        for batch in names.chunks(batch_size.max(1)) {
            let embedded = embedder.embed_batch(batch)?;
            if embedded.len() != batch.len() {
                return Err(SkillAlignerError::Embedding(format!(
                    "Embedder returned {} vectors for {} vocabulary skills",
                    embedded.len(),
                    batch.len()
                )));
            }
            vectors.extend(embedded);
        }
        let index = Self::from_vectors(names, vectors)?;

        if let Some(expected) = embedder.dimension() {
            if !index.is_empty() && index.dimension() != expected {
                return Err(SkillAlignerError::Embedding(format!(
                    "{} declares {} dims but produced {}",
                    embedder.name(),
                    expected,
                    index.dimension()
                )));
            }
        }

        info!(
            "Embedded {} vocabulary skills ({} dims) in {:.2?}",
            index.len(),
            index.dimension(),
            start_time.elapsed()
        );
        Ok(index)
    }

    pub fn from_vectors(names: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<Self> {
        if names.len() != vectors.len() {
            return Err(SkillAlignerError::Embedding(format!(
                "Expected {} embeddings, got {}",
                names.len(),
                vectors.len()
            )));
        }
        let embeddings = to_matrix(vectors)?;
        Self::from_parts(names, embeddings)
    }

    pub fn from_parts(names: Vec<String>, embeddings: Array2<f32>) -> Result<Self> {
        if names.len() != embeddings.nrows() {
            return Err(SkillAlignerError::Embedding(format!(
                "{} skill names but {} embedding rows",
                names.len(),
                embeddings.nrows()
            )));
        }

        let norms = row_norms(&embeddings);
        Ok(Self {
            names,
            embeddings,
            norms,
        })
    }

    /// Row with the highest cosine similarity to `query`.
    ///
    /// Ties go to the lowest index. Zero-norm vectors score 0. Returns `None`
    /// only when the index is empty.
    pub fn nearest(&self, query: &[f32]) -> Result<Option<Nearest>> {
        if self.names.is_empty() {
            return Ok(None);
        }
        if query.len() != self.dimension() {
            return Err(SkillAlignerError::Embedding(format!(
                "Query has {} dims, index has {}",
                query.len(),
                self.dimension()
            )));
        }

        let query = ArrayView1::from(query);
        let query_norm = query.dot(&query).sqrt();
        let dots = self.embeddings.dot(&query);

        let mut best = Nearest {
            index: 0,
            similarity: f32::NEG_INFINITY,
        };
        for (i, (dot, norm)) in dots.iter().zip(self.norms.iter()).enumerate() {
            let similarity = if query_norm == 0.0 || *norm == 0.0 {
                0.0
            } else {
                dot / (query_norm * norm)
            };
            if similarity > best.similarity {
                best = Nearest { index: i, similarity };
            }
        }

        Ok(Some(best))
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.embeddings.ncols()
    }
}

/// Full cosine similarity matrix, `rows` x `columns`
pub fn similarity_matrix(rows: &[Vec<f32>], columns: &[Vec<f32>]) -> Result<Array2<f32>> {
    if rows.is_empty() || columns.is_empty() {
        return Ok(Array2::zeros((rows.len(), columns.len())));
    }

    let rows = to_matrix(rows.to_vec())?;
    let columns = to_matrix(columns.to_vec())?;
    if rows.ncols() != columns.ncols() {
        return Err(SkillAlignerError::Embedding(format!(
            "Embedding dimensions don't match: {} vs {}",
            rows.ncols(),
            columns.ncols()
        )));
    }

    let left_norms = row_norms(&rows);
    let right_norms = row_norms(&columns);
    let mut matrix = rows.dot(&columns.t());
    for ((i, j), value) in matrix.indexed_iter_mut() {
        let denominator = left_norms[i] * right_norms[j];
        *value = if denominator == 0.0 { 0.0 } else { *value / denominator };
    }
    Ok(matrix)
}

/// Stack equal-length vectors into a matrix
fn to_matrix(vectors: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let rows = vectors.len();
    let dimension = vectors.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = vectors.iter().position(|v| v.len() != dimension) {
        return Err(SkillAlignerError::Embedding(format!(
            "Embedding {} has {} dims, expected {}",
            bad,
            vectors[bad].len(),
            dimension
        )));
    }

    let flat: Vec<f32> = vectors.into_iter().flatten().collect();
    Array2::from_shape_vec((rows, dimension), flat)
        .map_err(|e| SkillAlignerError::Embedding(format!("Failed to build embedding matrix: {}", e)))
}

fn row_norms(matrix: &Array2<f32>) -> Array1<f32> {
    matrix.map_axis(Axis(1), |row| row.dot(&row).sqrt())
}
