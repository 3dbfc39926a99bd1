//! Local text generation with candle for Phi-3 and Llama-family chat models

use crate::config::LlmConfig;
use crate::error::{Result, SkillAlignerError};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::{llama, phi3};
use candle_transformers::utils::apply_repeat_penalty;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokenizers::Tokenizer;

/// Repeat penalty looks back this many tokens
const REPEAT_LAST_N: usize = 64;

/// Sampling settings for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    pub max_tokens: usize,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: Option<usize>,
    pub repeat_penalty: f32,
    pub seed: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self::from(&LlmConfig::default())
    }
}

impl From<&LlmConfig> for InferenceConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            repeat_penalty: config.repeat_penalty,
            seed: config.seed,
        }
    }
}

impl InferenceConfig {
    /// Zero temperature means greedy decoding
    pub fn sampling(&self) -> Sampling {
        if self.temperature <= 0.0 {
            return Sampling::ArgMax;
        }
        match self.top_k {
            Some(k) => Sampling::TopKThenTopP {
                k,
                p: self.top_p,
                temperature: self.temperature,
            },
            None => Sampling::TopP {
                p: self.top_p,
                temperature: self.temperature,
            },
        }
    }
}

/// Result of one generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub text: String,
    pub prompt_tokens: usize,
    pub token_count: usize,
    pub inference_time_ms: u64,
    pub tokens_per_second: f64,
}

/// Anything that can answer a prompt with text
pub trait TextGenerator: Send {
    fn generate(&mut self, system: &str, prompt: &str) -> Result<InferenceResult>;

    fn name(&self) -> &str;
}

/// Prompt markup of the supported chat models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatTemplate {
    /// Phi-3 instruct
    Phi3,
    /// Llama 3.x instruct
    Llama3,
    /// Zephyr-style markup used by TinyLlama chat
    Zephyr,
}

impl ChatTemplate {
    pub fn format(&self, system: &str, user: &str) -> String {
        match self {
            ChatTemplate::Phi3 => format!(
                "<|system|>\n{}<|end|>\n<|user|>\n{}<|end|>\n<|assistant|>\n",
                system.trim(),
                user.trim()
            ),
            ChatTemplate::Llama3 => format!(
                "<|begin_of_text|><|start_header_id|>system<|end_header_id|>\n\n{}<|eot_id|>\
                 <|start_header_id|>user<|end_header_id|>\n\n{}<|eot_id|>\
                 <|start_header_id|>assistant<|end_header_id|>\n\n",
                system.trim(),
                user.trim()
            ),
            ChatTemplate::Zephyr => format!(
                "<|system|>\n{}</s>\n<|user|>\n{}</s>\n<|assistant|>\n",
                system.trim(),
                user.trim()
            ),
        }
    }

    /// Llama 3 markup already carries its begin-of-text token
    fn add_special_tokens(&self) -> bool {
        !matches!(self, ChatTemplate::Llama3)
    }

    fn stop_tokens(&self) -> &'static [&'static str] {
        match self {
            ChatTemplate::Phi3 => &["<|end|>", "<|endoftext|>"],
            ChatTemplate::Llama3 => &["<|eot_id|>", "<|end_of_text|>"],
            ChatTemplate::Zephyr => &["</s>"],
        }
    }
}

/// Architecture and prompt markup named by a model's `config.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Phi3,
    Llama,
}

pub fn detect_family(model_config: &serde_json::Value) -> Result<(ModelFamily, ChatTemplate)> {
    let model_type = model_config["model_type"].as_str().unwrap_or("");
    let architecture = model_config["architectures"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|v| v.as_str())
        .unwrap_or("");

    match (model_type, architecture) {
        ("phi3", _) | (_, "Phi3ForCausalLM") => Ok((ModelFamily::Phi3, ChatTemplate::Phi3)),
        ("llama", _) | (_, "LlamaForCausalLM") => {
            // Llama 3 ships a 128k-token vocabulary; older chat tunes use 32k
            let vocab_size = model_config["vocab_size"].as_u64().unwrap_or(0);
            let template = if vocab_size >= 128_000 {
                ChatTemplate::Llama3
            } else {
                ChatTemplate::Zephyr
            };
            Ok((ModelFamily::Llama, template))
        }
        _ => Err(SkillAlignerError::ModelLoading(format!(
            "Unsupported language model (model_type '{}', architecture '{}')",
            model_type, architecture
        ))),
    }
}

/// Distinct shard file names listed in a `model.safetensors.index.json`
pub fn shard_names(index_json: &serde_json::Value) -> Result<BTreeSet<String>> {
    let weight_map = index_json
        .get("weight_map")
        .and_then(|v| v.as_object())
        .ok_or_else(|| SkillAlignerError::ModelLoading("Invalid safetensors index: missing weight_map".to_string()))?;
    Ok(weight_map
        .values()
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .collect())
}

/// Safetensors files of a model directory, sharded or single
pub fn weight_files(model_path: &Path) -> Result<Vec<PathBuf>> {
    let index_path = model_path.join("model.safetensors.index.json");
    if index_path.exists() {
        let index_content = std::fs::read_to_string(&index_path)?;
        let index_json: serde_json::Value = serde_json::from_str(&index_content)?;
        let shards = shard_names(&index_json)?;
        let mut files = Vec::with_capacity(shards.len());
        for shard in shards {
            let shard_path = model_path.join(&shard);
            if !shard_path.exists() {
                return Err(SkillAlignerError::ModelNotFound(format!("Shard file not found: {}", shard)));
            }
            files.push(shard_path);
        }
        return Ok(files);
    }

    let single = model_path.join("model.safetensors");
    if single.exists() {
        Ok(vec![single])
    } else {
        Err(SkillAlignerError::ModelNotFound(format!(
            "{} (no safetensors weights)",
            model_path.display()
        )))
    }
}

/// Best available device for inference (GPU if available, CPU fallback)
pub fn get_best_device() -> Result<Device> {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            info!("Using CUDA GPU for acceleration");
            return Ok(device);
        }
    }

    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(device) => {
                info!("Using Metal GPU for acceleration");
                return Ok(device);
            }
            Err(e) => warn!("Metal GPU initialization failed: {}", e),
        }
    }

    Ok(Device::Cpu)
}

/// Device for an explicit preference: `cpu`, `cuda`, `metal` or `auto`
pub fn device_from_preference(preference: &str) -> Result<Device> {
    match preference.trim().to_lowercase().as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" => {
            #[cfg(feature = "cuda")]
            {
                return Device::new_cuda(0)
                    .map_err(|e| SkillAlignerError::ModelError(format!("Failed to initialize CUDA: {}", e)));
            }
            #[cfg(not(feature = "cuda"))]
            {
                return Err(SkillAlignerError::ModelError("CUDA support not compiled in".to_string()));
            }
        }
        "metal" => {
            #[cfg(feature = "metal")]
            {
                return Device::new_metal(0)
                    .map_err(|e| SkillAlignerError::ModelError(format!("Failed to initialize Metal: {}", e)));
            }
            #[cfg(not(feature = "metal"))]
            {
                return Err(SkillAlignerError::ModelError("Metal support not compiled in".to_string()));
            }
        }
        "" | "auto" => get_best_device(),
        other => {
            warn!("Unknown device '{}', falling back to auto-detection", other);
            get_best_device()
        }
    }
}

/// Device with optional user override from `SKILL_ALIGNER_DEVICE`
pub fn get_device_with_override() -> Result<Device> {
    match std::env::var("SKILL_ALIGNER_DEVICE") {
        Ok(preference) => device_from_preference(&preference),
        Err(_) => get_best_device(),
    }
}

trait CausalLm: Send {
    /// Logits for the last position of `input_ids`
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor>;

    fn clear_cache(&mut self) -> Result<()>;
}

struct Phi3Lm {
    model: phi3::Model,
}

impl CausalLm for Phi3Lm {
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor> {
        Ok(self.model.forward(input_ids, position)?)
    }

    fn clear_cache(&mut self) -> Result<()> {
        self.model.clear_kv_cache();
        Ok(())
    }
}

struct LlamaLm {
    model: llama::Llama,
    cache: llama::Cache,
    config: llama::Config,
    device: Device,
}

impl CausalLm for LlamaLm {
    fn forward(&mut self, input_ids: &Tensor, position: usize) -> Result<Tensor> {
        Ok(self.model.forward(input_ids, position, &mut self.cache)?)
    }

    fn clear_cache(&mut self) -> Result<()> {
        self.cache = llama::Cache::new(true, DType::F32, &self.config, &self.device)?;
        Ok(())
    }
}

/// Chat model loaded from a local directory
pub struct LlmEngine {
    model: Box<dyn CausalLm>,
    tokenizer: Tokenizer,
    device: Device,
    template: ChatTemplate,
    stop_tokens: Vec<u32>,
    config: InferenceConfig,
    model_name: String,
}

impl LlmEngine {
    /// Load `config.json`, `tokenizer.json` and safetensors weights from a directory
    pub fn load(model_path: &Path, config: InferenceConfig) -> Result<Self> {
        let start_time = Instant::now();
        info!("Loading language model from: {}", model_path.display());

        let device = get_device_with_override()?;

        let tokenizer = Tokenizer::from_file(model_path.join("tokenizer.json"))
            .map_err(|e| SkillAlignerError::ModelLoading(format!("Failed to load tokenizer: {}", e)))?;

        let config_content = std::fs::read_to_string(model_path.join("config.json")).map_err(|e| {
            SkillAlignerError::ModelLoading(format!("Failed to read model config: {}", e))
        })?;
        let model_config: serde_json::Value = serde_json::from_str(&config_content)?;
        let (family, template) = detect_family(&model_config)?;

        let files = weight_files(model_path)?;
        // SAFETY: the weight files are not modified while the model is alive.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files, DType::F32, &device)? };

        let model: Box<dyn CausalLm> = match family {
            ModelFamily::Phi3 => {
                let phi_config: phi3::Config = serde_json::from_str(&config_content).map_err(|e| {
                    SkillAlignerError::ModelLoading(format!("Failed to parse Phi-3 config: {}", e))
                })?;
                Box::new(Phi3Lm {
                    model: phi3::Model::new(&phi_config, vb)?,
                })
            }
            ModelFamily::Llama => {
                let llama_config: llama::LlamaConfig = serde_json::from_str(&config_content).map_err(|e| {
                    SkillAlignerError::ModelLoading(format!("Failed to parse Llama config: {}", e))
                })?;
                let llama_config = llama_config.into_config(false);
                let cache = llama::Cache::new(true, DType::F32, &llama_config, &device)?;
                Box::new(LlamaLm {
                    model: llama::Llama::load(vb, &llama_config)?,
                    cache,
                    config: llama_config,
                    device: device.clone(),
                })
            }
        };

        let stop_tokens: Vec<u32> = template
            .stop_tokens()
            .iter()
            .filter_map(|token| tokenizer.token_to_id(token))
            .collect();
        if stop_tokens.is_empty() {
            warn!("No stop token found in the tokenizer, generation runs to max_tokens");
        }

        info!(
            "Language model ({:?}, {} weight files) loaded in {:.2?}",
            family,
            files.len(),
            start_time.elapsed()
        );

        let model_name = model_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| model_path.display().to_string());

        Ok(Self {
            model,
            tokenizer,
            device,
            template,
            stop_tokens,
            config,
            model_name,
        })
    }
}

impl TextGenerator for LlmEngine {
    fn generate(&mut self, system: &str, prompt: &str) -> Result<InferenceResult> {
        let start_time = Instant::now();
        self.model.clear_cache()?;

        let formatted = self.template.format(system, prompt);
        let encoding = self
            .tokenizer
            .encode(formatted.as_str(), self.template.add_special_tokens())
            .map_err(|e| SkillAlignerError::ModelError(format!("Failed to tokenize prompt: {}", e)))?;
        let mut tokens = encoding.get_ids().to_vec();
        let prompt_tokens = tokens.len();
        debug!("Prompt is {} tokens", prompt_tokens);

        let mut logits_processor = LogitsProcessor::from_sampling(self.config.seed, self.config.sampling());
        let mut generated = Vec::new();
        let mut next_input = tokens.clone();
        let mut position = 0;

        for _ in 0..self.config.max_tokens {
            let input = Tensor::new(next_input.as_slice(), &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, position)?;
            position += next_input.len();

            let logits = logits.flatten_all()?.to_dtype(DType::F32)?;
            let logits = if self.config.repeat_penalty == 1.0 {
                logits
            } else {
                let start = tokens.len().saturating_sub(REPEAT_LAST_N);
                apply_repeat_penalty(&logits, self.config.repeat_penalty, &tokens[start..])?
            };

            let next_token = logits_processor.sample(&logits)?;
            if self.stop_tokens.contains(&next_token) {
                break;
            }
            tokens.push(next_token);
            generated.push(next_token);
            next_input = vec![next_token];
        }

        let text = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| SkillAlignerError::ModelError(format!("Failed to decode output: {}", e)))?;

        let elapsed = start_time.elapsed();
        debug!("Generated {} tokens in {:.2?}", generated.len(), elapsed);

        Ok(InferenceResult {
            text: text.trim().to_string(),
            prompt_tokens,
            token_count: generated.len(),
            inference_time_ms: elapsed.as_millis() as u64,
            tokens_per_second: if generated.is_empty() {
                0.0
            } else {
                generated.len() as f64 / elapsed.as_secs_f64()
            },
        })
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_inference_config_from_llm_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.top_k, Some(50));
    }

    #[test]
    fn test_sampling_strategy() {
        let mut config = InferenceConfig::default();
        assert!(matches!(config.sampling(), Sampling::TopKThenTopP { k: 50, .. }));

        config.top_k = None;
        assert!(matches!(config.sampling(), Sampling::TopP { .. }));

        config.temperature = 0.0;
        assert!(matches!(config.sampling(), Sampling::ArgMax));
    }

    #[test]
    fn test_chat_templates() {
        let phi = ChatTemplate::Phi3.format("Be brief.", " Review this. ");
        assert_eq!(phi, "<|system|>\nBe brief.<|end|>\n<|user|>\nReview this.<|end|>\n<|assistant|>\n");

        let llama = ChatTemplate::Llama3.format("Be brief.", "Review this.");
        assert!(llama.starts_with("<|begin_of_text|>"));
        assert!(llama.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));
        assert!(!ChatTemplate::Llama3.add_special_tokens());

        let zephyr = ChatTemplate::Zephyr.format("Be brief.", "Review this.");
        assert!(zephyr.contains("<|user|>\nReview this.</s>"));
    }

    #[test]
    fn test_detect_family() {
        let phi = json!({"model_type": "phi3", "architectures": ["Phi3ForCausalLM"]});
        assert_eq!(detect_family(&phi).unwrap(), (ModelFamily::Phi3, ChatTemplate::Phi3));

        let llama3 = json!({"model_type": "llama", "vocab_size": 128256});
        assert_eq!(detect_family(&llama3).unwrap(), (ModelFamily::Llama, ChatTemplate::Llama3));

        let tinyllama = json!({"architectures": ["LlamaForCausalLM"], "vocab_size": 32000});
        assert_eq!(detect_family(&tinyllama).unwrap(), (ModelFamily::Llama, ChatTemplate::Zephyr));

        let bert = json!({"model_type": "bert"});
        assert!(matches!(detect_family(&bert), Err(SkillAlignerError::ModelLoading(_))));
    }

    #[test]
    fn test_weight_files_single_and_sharded() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        assert!(matches!(weight_files(dir), Err(SkillAlignerError::ModelNotFound(_))));

        std::fs::write(dir.join("model.safetensors"), "").unwrap();
        assert_eq!(weight_files(dir).unwrap(), vec![dir.join("model.safetensors")]);

        let index = json!({"weight_map": {
            "a": "model-00002-of-00002.safetensors",
            "b": "model-00001-of-00002.safetensors",
            "c": "model-00001-of-00002.safetensors"
        }});
        std::fs::write(dir.join("model.safetensors.index.json"), index.to_string()).unwrap();
        assert!(matches!(weight_files(dir), Err(SkillAlignerError::ModelNotFound(_))));

        std::fs::write(dir.join("model-00001-of-00002.safetensors"), "").unwrap();
        std::fs::write(dir.join("model-00002-of-00002.safetensors"), "").unwrap();
        assert_eq!(
            weight_files(dir).unwrap(),
            vec![
                dir.join("model-00001-of-00002.safetensors"),
                dir.join("model-00002-of-00002.safetensors")
            ]
        );
    }

    #[test]
    fn test_device_from_preference() {
        assert!(matches!(device_from_preference("cpu").unwrap(), Device::Cpu));
        assert!(matches!(device_from_preference(" CPU ").unwrap(), Device::Cpu));
        assert!(device_from_preference("auto").is_ok());
        assert!(device_from_preference("tpu").is_ok());
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_cuda_preference_without_feature() {
        assert!(matches!(device_from_preference("cuda"), Err(SkillAlignerError::ModelError(_))));
    }

    #[test]
    fn test_load_fails_without_model_files() {
        let temp_dir = TempDir::new().unwrap();
        let result = LlmEngine::load(temp_dir.path(), InferenceConfig::default());
        assert!(matches!(result, Err(SkillAlignerError::ModelLoading(_))));
    }
}
