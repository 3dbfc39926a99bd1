//! Configuration management for the skill aligner

use crate::error::{Result, SkillAlignerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub models: ModelConfig,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
    pub matching: MatchingConfig,
    pub processing: ProcessingConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    pub default_embedding_model: String,
    pub backend: EmbedderKind,
}

/// Which embedding backend encodes tokens and skill names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Static Model2Vec embeddings (fast, CPU only)
    Model2Vec,
    /// BERT-family sentence transformer run through candle
    Bert,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// JSON or TOML file mapping category -> skills. The built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Token-to-skill similarity must exceed this to count as a mention
    pub extraction_threshold: f32,
    /// Skill-to-skill similarity must exceed this to count as a match
    pub comparison_threshold: f32,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Documents longer than this (in characters) are rejected before extraction
    pub max_input_chars: usize,
}

/// Local language model used for written career advice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model id from the LLM catalog, or a local model directory
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: Option<usize>,
    pub repeat_penalty: f32,
    pub seed: u64,
    /// Resume and job text are cut to this many characters before prompting
    pub max_document_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub detailed: bool,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Console,
    Json,
    Markdown,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            extraction_threshold: 0.75,
            comparison_threshold: 0.75,
            batch_size: 64,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "phi-3-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.4,
            top_p: 0.9,
            top_k: Some(50),
            repeat_penalty: 1.1,
            seed: 42,
            max_document_chars: 6000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let models_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".skill-aligner")
            .join("models");

        Self {
            models: ModelConfig {
                models_dir,
                default_embedding_model: "potion-base-8M".to_string(),
                backend: EmbedderKind::Model2Vec,
            },
            vocabulary: VocabularyConfig::default(),
            matching: MatchingConfig::default(),
            processing: ProcessingConfig {
                max_input_chars: 100_000,
            },
            output: OutputConfig {
                format: OutputFormat::Console,
                detailed: false,
                color_output: true,
            },
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Load a config file, writing defaults there on first run
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| SkillAlignerError::Configuration(format!("Failed to parse config: {}", e)))?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SkillAlignerError::Configuration(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("skill-aligner")
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("matching.extraction_threshold", self.matching.extraction_threshold),
            ("matching.comparison_threshold", self.matching.comparison_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(SkillAlignerError::Configuration(format!(
                    "{} must be a cosine similarity in [-1, 1], got {}",
                    name, value
                )));
            }
        }
        if self.matching.batch_size == 0 {
            return Err(SkillAlignerError::Configuration(
                "matching.batch_size must be at least 1".to_string(),
            ));
        }
        if self.llm.max_tokens == 0 || self.llm.temperature < 0.0 {
            return Err(SkillAlignerError::Configuration(
                "llm.max_tokens must be at least 1 and llm.temperature non-negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn models_dir(&self) -> &PathBuf {
        &self.models.models_dir
    }

    /// Language models live apart from embedding models
    pub fn llm_models_dir(&self) -> PathBuf {
        self.models.models_dir.join("llm")
    }
}
