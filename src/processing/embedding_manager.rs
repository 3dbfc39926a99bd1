//! Embedding model catalog plus download and cache management on the Hugging Face Hub

use crate::config::EmbedderKind;
use crate::error::{Result, SkillAlignerError};
use hf_hub::api::tokio::Api;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Information about an available embedding model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingModelInfo {
    pub name: String,
    pub repo_id: String,
    pub size_mb: u64,
    pub description: String,
    pub backend: EmbedderKind,
    pub dimensions: u32,
}

impl EmbeddingModelInfo {
    /// Files fetched from the repo, and whether each must exist
    fn files(&self) -> &'static [(&'static str, bool)] {
        match self.backend {
            EmbedderKind::Model2Vec => &[
                ("model.safetensors", true),
                ("tokenizer.json", true),
                ("config.json", false),
                ("README.md", false),
            ],
            EmbedderKind::Bert => &[
                ("model.safetensors", true),
                ("tokenizer.json", true),
                ("config.json", true),
            ],
        }
    }
}

/// Known models, downloaded models, and where they live on disk
pub struct EmbeddingModelManager {
    models_dir: PathBuf,
    available_models: BTreeMap<String, EmbeddingModelInfo>,
    downloaded_models: BTreeSet<String>,
    api: Api,
}

impl EmbeddingModelManager {
    /// Create the models directory if needed and scan it for complete models
    pub async fn new(models_dir: PathBuf) -> Result<Self> {
        if !models_dir.exists() {
            fs::create_dir_all(&models_dir).await.map_err(|e| {
                SkillAlignerError::ModelError(format!("Failed to create models directory: {}", e))
            })?;
        }

        let api = Api::new()
            .map_err(|e| SkillAlignerError::ModelError(format!("Failed to initialize HF API: {}", e)))?;

        let mut manager = Self {
            models_dir,
            available_models: known_models(),
            downloaded_models: BTreeSet::new(),
            api,
        };
        manager.scan_downloaded_models().await?;

        Ok(manager)
    }

    async fn scan_downloaded_models(&mut self) -> Result<()> {
        let mut entries = fs::read_dir(&self.models_dir).await.map_err(|e| {
            SkillAlignerError::ModelError(format!("Failed to scan models directory: {}", e))
        })?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let model_id = entry.file_name().to_string_lossy().to_string();
            if is_valid_model_directory(&entry.path()).await {
                debug!("Found downloaded embedding model: {}", model_id);
                self.downloaded_models.insert(model_id);
            }
        }

        Ok(())
    }

    /// Download a model by id. Re-downloads only when `force` is set.
    pub async fn download_model(&mut self, model_id: &str, force: bool) -> Result<PathBuf> {
        let model_info = self
            .available_models
            .get(model_id)
            .cloned()
            .ok_or_else(|| SkillAlignerError::ModelNotFound(format!("Unknown embedding model: {}", model_id)))?;

        let model_dir = self.models_dir.join(model_id);
        if self.downloaded_models.contains(model_id) && !force {
            return Ok(model_dir);
        }

        println!("📥 Downloading embedding model: {} ({} MB)", model_info.name, model_info.size_mb);
        println!("📍 Repository: {}", model_info.repo_id);
        info!("Downloading {} into {}", model_info.repo_id, model_dir.display());

        fs::create_dir_all(&model_dir).await.map_err(|e| {
            SkillAlignerError::ModelError(format!("Failed to create model directory: {}", e))
        })?;

        let repo = self.api.repo(hf_hub::Repo::model(model_info.repo_id.clone()));
        for &(file, required) in model_info.files() {
            match repo.get(file).await {
                Ok(cached_path) => {
                    fs::copy(&cached_path, model_dir.join(file)).await.map_err(|e| {
                        SkillAlignerError::ModelError(format!("Failed to copy {}: {}", file, e))
                    })?;
                    println!("  ✅ Downloaded: {}", file);
                }
                Err(e) if !required => {
                    warn!("Optional file {} not available: {}", file, e);
                }
                Err(e) => {
                    return Err(SkillAlignerError::ModelError(format!(
                        "Failed to download required file {}: {}",
                        file, e
                    )));
                }
            }
        }

        self.downloaded_models.insert(model_id.to_string());
        println!("✅ Embedding model {} downloaded successfully!", model_info.name);
        Ok(model_dir)
    }

    /// Delete a downloaded model from disk
    pub async fn remove_model(&mut self, model_id: &str) -> Result<()> {
        if !self.downloaded_models.remove(model_id) {
            return Err(SkillAlignerError::ModelNotFound(format!(
                "Model {} is not downloaded",
                model_id
            )));
        }

        let model_dir = self.models_dir.join(model_id);
        fs::remove_dir_all(&model_dir).await.map_err(|e| {
            SkillAlignerError::ModelError(format!("Failed to remove {}: {}", model_dir.display(), e))
        })?;
        info!("Removed embedding model {}", model_id);
        Ok(())
    }

    pub fn get_model_path(&self, model_id: &str) -> Option<PathBuf> {
        if self.downloaded_models.contains(model_id) {
            Some(self.models_dir.join(model_id))
        } else {
            None
        }
    }

    /// Path of a downloaded model, downloading it first when missing
    pub async fn ensure_model_available(&mut self, model_id: &str) -> Result<PathBuf> {
        if let Some(path) = self.get_model_path(model_id) {
            return Ok(path);
        }
        self.download_model(model_id, false).await
    }

    /// Sorted by id
    pub fn list_available_models(&self) -> Vec<(&str, &EmbeddingModelInfo)> {
        self.available_models
            .iter()
            .map(|(id, info)| (id.as_str(), info))
            .collect()
    }

    pub fn list_downloaded_models(&self) -> Vec<String> {
        self.downloaded_models.iter().cloned().collect()
    }

    pub fn get_model_info(&self, model_id: &str) -> Option<&EmbeddingModelInfo> {
        self.available_models.get(model_id)
    }

    pub fn is_model_downloaded(&self, model_id: &str) -> bool {
        self.downloaded_models.contains(model_id)
    }

    /// Accept a model id, a Hub repo id, or a display name (any case)
    pub fn resolve_model_id(&self, input: &str) -> Option<String> {
        if self.available_models.contains_key(input) {
            return Some(input.to_string());
        }

        let input_lower = input.to_lowercase();
        self.available_models
            .iter()
            .find(|(id, info)| {
                info.repo_id == input
                    || info.name.to_lowercase() == input_lower
                    || id.to_lowercase() == input_lower
            })
            .map(|(id, _)| id.clone())
    }
}

/// A model directory is usable once it has a tokenizer and safetensors weights
async fn is_valid_model_directory(path: &Path) -> bool {
    for file in ["tokenizer.json", "model.safetensors"] {
        if fs::metadata(path.join(file)).await.is_err() {
            return false;
        }
    }
    true
}

fn known_models() -> BTreeMap<String, EmbeddingModelInfo> {
    let mut models = BTreeMap::new();

    models.insert(
        "potion-base-8M".to_string(),
        EmbeddingModelInfo {
            name: "Potion Base 8M".to_string(),
            repo_id: "minishlab/potion-base-8M".to_string(),
            size_mb: 30,
            description: "Fast static embeddings, good default for skill matching".to_string(),
            backend: EmbedderKind::Model2Vec,
            dimensions: 256,
        },
    );

    models.insert(
        "m2v-base".to_string(),
        EmbeddingModelInfo {
            name: "Model2Vec Base".to_string(),
            repo_id: "minishlab/M2V_base_output".to_string(),
            size_mb: 90,
            description: "Model2Vec distillation of bge-base".to_string(),
            backend: EmbedderKind::Model2Vec,
            dimensions: 256,
        },
    );

    models.insert(
        "all-MiniLM-L6-v2".to_string(),
        EmbeddingModelInfo {
            name: "MiniLM L6 v2".to_string(),
            repo_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            size_mb: 90,
            description: "Sentence transformer, slower but context aware".to_string(),
            backend: EmbedderKind::Bert,
            dimensions: 384,
        },
    );

    models
}
