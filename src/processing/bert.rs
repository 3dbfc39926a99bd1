//! Sentence-transformer embeddings (all-MiniLM-L6-v2 and friends) run with candle

use crate::error::{Result, SkillAlignerError};
use crate::llm::inference::get_device_with_override;
use crate::processing::embeddings::Embedder;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use log::info;
use std::path::Path;
use std::time::Instant;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

/// Sentence-transformers truncate MiniLM inputs at 256 word pieces
const MAX_SEQUENCE_LENGTH: usize = 256;

/// BERT encoder with mask-aware mean pooling and L2 normalization
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    batch_size: usize,
    hidden_size: usize,
    model_name: String,
}

impl BertEmbedder {
    /// Load `config.json`, `tokenizer.json` and `model.safetensors` from a directory
    pub fn load(model_path: &Path, batch_size: usize) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading sentence-transformer model from: {}", model_path.display());

        let device = get_device_with_override()?;

        let config_content = std::fs::read_to_string(model_path.join("config.json")).map_err(|e| {
            SkillAlignerError::ModelLoading(format!("Failed to read model config: {}", e))
        })?;
        let config: BertConfig = serde_json::from_str(&config_content).map_err(|e| {
            SkillAlignerError::ModelLoading(format!("Failed to parse model config: {}", e))
        })?;

        let mut tokenizer = Tokenizer::from_file(model_path.join("tokenizer.json")).map_err(|e| {
            SkillAlignerError::ModelLoading(format!("Failed to load tokenizer: {}", e))
        })?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| SkillAlignerError::ModelLoading(format!("Failed to configure truncation: {}", e)))?;

        let weights_path = model_path.join("model.safetensors");
        if !weights_path.exists() {
            return Err(SkillAlignerError::ModelNotFound(format!(
                "{} (missing model.safetensors)",
                model_path.display()
            )));
        }
        // SAFETY: the weights file is not modified while the model is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;

        info!("Model loaded successfully in {:.2?}", start_time.elapsed());

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| model_path.display().to_string());

        Ok(Self {
            model,
            tokenizer,
            device,
            batch_size: batch_size.max(1),
            hidden_size: config.hidden_size,
            model_name,
        })
    }

    fn encode_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| SkillAlignerError::Embedding(format!("Tokenization failed: {}", e)))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        // (batch, seq, hidden)
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?;
        let pooled = summed.broadcast_div(&counts)?;
        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norms)?;

        Ok(normalized.to_dtype(DType::F32)?.to_vec2::<f32>()?)
    }
}

impl Embedder for BertEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            embeddings.extend(self.encode_chunk(chunk)?);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.hidden_size)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
