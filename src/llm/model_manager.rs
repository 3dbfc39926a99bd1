//! Chat model catalog and downloads for career advice

use crate::error::{Result, SkillAlignerError};
use crate::llm::inference::shard_names;
use hf_hub::api::tokio::{Api, ApiRepo};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmModelInfo {
    pub name: String,
    pub repo_id: String,
    pub size_mb: u64,
    pub description: String,
    pub context_length: u32,
}

pub struct LlmModelManager {
    models_dir: PathBuf,
    available_models: BTreeMap<String, LlmModelInfo>,
    downloaded_models: BTreeSet<String>,
    api: Api,
}

impl LlmModelManager {
    pub async fn new(models_dir: PathBuf) -> Result<Self> {
        if !models_dir.exists() {
            fs::create_dir_all(&models_dir).await.map_err(|e| {
                SkillAlignerError::ModelError(format!("Failed to create LLM models directory: {}", e))
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
            SkillAlignerError::ModelError(format!("Failed to scan LLM models directory: {}", e))
        })?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let model_id = entry.file_name().to_string_lossy().to_string();
            if is_valid_model_directory(&entry.path()).await {
                debug!("Found downloaded LLM: {}", model_id);
                self.downloaded_models.insert(model_id);
            }
        }

        Ok(())
    }

    /// Download config, tokenizer and weights. Sharded repos are fetched shard by shard.
    pub async fn download_model(&mut self, model_id: &str, force: bool) -> Result<PathBuf> {
        let model_info = self
            .available_models
            .get(model_id)
            .cloned()
            .ok_or_else(|| SkillAlignerError::ModelNotFound(format!("Unknown LLM: {}", model_id)))?;

        let model_dir = self.models_dir.join(model_id);
        if self.downloaded_models.contains(model_id) && !force {
            return Ok(model_dir);
        }

        println!("📥 Downloading LLM: {} ({} MB)", model_info.name, model_info.size_mb);
        println!("📍 Repository: {}", model_info.repo_id);
        info!("Downloading {} into {}", model_info.repo_id, model_dir.display());

        fs::create_dir_all(&model_dir).await.map_err(|e| {
            SkillAlignerError::ModelError(format!("Failed to create model directory: {}", e))
        })?;

        let repo = self.api.repo(hf_hub::Repo::model(model_info.repo_id.clone()));
        for file in ["config.json", "tokenizer.json"] {
            fetch(&repo, file, &model_dir).await?;
        }

        match repo.get("model.safetensors.index.json").await {
            Ok(index_path) => {
                let index_content = fs::read_to_string(&index_path).await?;
                let index_json: serde_json::Value = serde_json::from_str(&index_content)?;
                fs::write(model_dir.join("model.safetensors.index.json"), &index_content).await?;
                println!("  ✅ Downloaded: model.safetensors.index.json");

                for shard in shard_names(&index_json)? {
                    fetch(&repo, &shard, &model_dir).await?;
                }
            }
            Err(e) => {
                debug!("No safetensors index for {} ({}), fetching a single file", model_info.repo_id, e);
                fetch(&repo, "model.safetensors", &model_dir).await?;
            }
        }

        self.downloaded_models.insert(model_id.to_string());
        println!("✅ LLM {} downloaded successfully!", model_info.name);
        Ok(model_dir)
    }

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
        info!("Removed LLM {}", model_id);
        Ok(())
    }

    pub fn get_model_path(&self, model_id: &str) -> Option<PathBuf> {
        if self.downloaded_models.contains(model_id) {
            Some(self.models_dir.join(model_id))
        } else {
            None
        }
    }

    pub async fn ensure_model_available(&mut self, model_id: &str) -> Result<PathBuf> {
        if let Some(path) = self.get_model_path(model_id) {
            return Ok(path);
        }
        self.download_model(model_id, false).await
    }

    pub fn list_available_models(&self) -> Vec<(&str, &LlmModelInfo)> {
        self.available_models
            .iter()
            .map(|(id, info)| (id.as_str(), info))
            .collect()
    }

    pub fn list_downloaded_models(&self) -> Vec<String> {
        self.downloaded_models.iter().cloned().collect()
    }

    pub fn get_model_info(&self, model_id: &str) -> Option<&LlmModelInfo> {
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

async fn fetch(repo: &ApiRepo, file: &str, model_dir: &Path) -> Result<()> {
    let cached_path = repo.get(file).await.map_err(|e| {
        SkillAlignerError::ModelError(format!("Failed to download required file {}: {}", file, e))
    })?;
    fs::copy(&cached_path, model_dir.join(file))
        .await
        .map_err(|e| SkillAlignerError::ModelError(format!("Failed to copy {}: {}", file, e)))?;
    println!("  ✅ Downloaded: {}", file);
    Ok(())
}

/// Needs config, tokenizer and either a single weights file or a shard index
async fn is_valid_model_directory(path: &Path) -> bool {
    for file in ["config.json", "tokenizer.json"] {
        if fs::metadata(path.join(file)).await.is_err() {
            return false;
        }
    }
    fs::metadata(path.join("model.safetensors")).await.is_ok()
        || fs::metadata(path.join("model.safetensors.index.json")).await.is_ok()
}

fn known_models() -> BTreeMap<String, LlmModelInfo> {
    let mut models = BTreeMap::new();

    models.insert(
        "phi-3-mini".to_string(),
        LlmModelInfo {
            name: "Phi-3 Mini 4K Instruct".to_string(),
            repo_id: "microsoft/Phi-3-mini-4k-instruct".to_string(),
            size_mb: 7600,
            description: "Best advice quality, needs about 8 GB of memory".to_string(),
            context_length: 4096,
        },
    );

    models.insert(
        "tinyllama".to_string(),
        LlmModelInfo {
            name: "TinyLlama 1.1B Chat".to_string(),
            repo_id: "TinyLlama/TinyLlama-1.1B-Chat-v1.0".to_string(),
            size_mb: 2200,
            description: "Small and fast, shorter and plainer advice".to_string(),
            context_length: 2048,
        },
    );

    models.insert(
        "llama-3.2-1b".to_string(),
        LlmModelInfo {
            name: "Llama 3.2 1B Instruct".to_string(),
            repo_id: "meta-llama/Llama-3.2-1B-Instruct".to_string(),
            size_mb: 2500,
            description: "Gated on the Hub, requires an accepted license and HF token".to_string(),
            context_length: 8192,
        },
    );

    models
}
