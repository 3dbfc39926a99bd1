//! Embedding backends behind a single `Embedder` capability

use crate::error::{Result, SkillAlignerError};
use log::info;
use model2vec_rs::model::StaticModel;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// Anything that can turn text into dense vectors.
///
/// Implementations must be deterministic for a fixed model and must return
/// exactly one vector per input, all of the same dimension.
pub trait Embedder: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| SkillAlignerError::Embedding(format!("No embedding returned for '{}'", text)))
    }

    /// Output dimension, when known up front
    fn dimension(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str;
}

/// Model2Vec static embeddings
pub struct Model2VecEmbedder {
    model: StaticModel,
    batch_size: usize,
    model_name: String,
}

impl Model2VecEmbedder {
    /// Load from a local model directory or a Hugging Face repo id
    pub fn load(model_path: &Path, batch_size: usize) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading Model2Vec embedding model from: {}", model_path.display());

        let model = StaticModel::from_pretrained(
            model_path,
            None, // token
            None, // normalize
            None, // subfolder
        )
        .map_err(|e| SkillAlignerError::ModelLoading(format!("Failed to load model: {}", e)))?;

        info!("Model loaded successfully in {:.2?}", start_time.elapsed());

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| model_path.display().to_string());

        Ok(Self {
            model,
            batch_size: batch_size.max(1),
            model_name,
        })
    }
}

impl Embedder for Model2VecEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            embeddings.extend(self.model.encode(batch));
        }
        Ok(embeddings)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Fixed table of precomputed vectors.
///
/// Unknown texts embed to the zero vector, which has similarity 0 with
/// everything. Useful for tests and for hosts that ship their own vectors.
#[derive(Debug, Clone, Default)]
pub struct LookupEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

impl LookupEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: HashMap::new(),
            dimension,
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.insert(text, vector);
        self
    }

    /// Register a vector; it is truncated or zero-padded to the table dimension
    pub fn insert(&mut self, text: &str, mut vector: Vec<f32>) {
        vector.resize(self.dimension, 0.0);
        self.vectors.insert(text.to_string(), vector);
    }

    /// Give each text its own axis, so every text is similar only to itself
    pub fn one_hot(texts: &[&str]) -> Self {
        let mut embedder = Self::new(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let mut vector = vec![0.0; texts.len()];
            vector[i] = 1.0;
            embedder.insert(text, vector);
        }
        embedder
    }

    /// Reuse the vector of `target` for `alias`
    pub fn alias(mut self, alias: &str, target: &str) -> Self {
        if let Some(vector) = self.vectors.get(target).cloned() {
            self.vectors.insert(alias.to_string(), vector);
        }
        self
    }
}

impl Embedder for LookupEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                self.vectors
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dimension])
            })
            .collect())
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn name(&self) -> &str {
        "lookup"
    }
}
