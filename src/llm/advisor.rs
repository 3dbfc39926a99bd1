//! Written career advice from a local language model

use crate::config::LlmConfig;
use crate::error::{Result, SkillAlignerError};
use crate::llm::inference::{InferenceConfig, LlmEngine, TextGenerator};
use crate::llm::prompts::{PromptParams, PromptTemplates, SYSTEM_PROMPT};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Advice text plus how it was produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerAdvice {
    /// Markdown sections: strengths, areas to improve, skill gaps, role alignment
    pub text: String,
    pub model_used: String,
    pub token_count: usize,
    pub processing_time_ms: u64,
}

pub struct CareerAdvisor {
    generator: Box<dyn TextGenerator>,
    templates: PromptTemplates,
}

impl CareerAdvisor {
    pub fn new(generator: Box<dyn TextGenerator>) -> Self {
        Self {
            generator,
            templates: PromptTemplates::default(),
        }
    }

    /// Load a chat model directory with the sampling settings from config
    pub fn load(model_path: &Path, config: &LlmConfig) -> Result<Self> {
        let engine = LlmEngine::load(model_path, InferenceConfig::from(config))?;
        Ok(Self::new(Box::new(engine)))
    }

    pub fn advise(&mut self, params: &PromptParams) -> Result<CareerAdvice> {
        let prompt = self.templates.render_career_advice(params);
        debug!("Career advice prompt is {} characters", prompt.len());

        let result = self.generator.generate(SYSTEM_PROMPT, &prompt)?;
        if result.text.trim().is_empty() {
            return Err(SkillAlignerError::ModelError(format!(
                "{} returned no advice",
                self.generator.name()
            )));
        }

        info!(
            "Generated {} advice tokens in {}ms ({:.1} tokens/sec)",
            result.token_count, result.inference_time_ms, result.tokens_per_second
        );

        Ok(CareerAdvice {
            text: result.text,
            model_used: self.generator.name().to_string(),
            token_count: result.token_count,
            processing_time_ms: result.inference_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::inference::InferenceResult;
    use std::sync::{Arc, Mutex};

    /// Records the prompts it receives and answers with a fixed reply
    struct ScriptedGenerator {
        reply: String,
        prompts: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl TextGenerator for ScriptedGenerator {
        fn generate(&mut self, system: &str, prompt: &str) -> Result<InferenceResult> {
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Ok(InferenceResult {
                text: self.reply.clone(),
                prompt_tokens: 100,
                token_count: 7,
                inference_time_ms: 35,
                tokens_per_second: 200.0,
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn advisor(reply: &str) -> (CareerAdvisor, Arc<Mutex<Vec<(String, String)>>>) {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let generator = ScriptedGenerator {
            reply: reply.to_string(),
            prompts: Arc::clone(&prompts),
        };
        (CareerAdvisor::new(Box::new(generator)), prompts)
    }

    fn params() -> PromptParams {
        PromptParams {
            resume_content: "Backend developer, Python and PostgreSQL".to_string(),
            job_content: "Platform engineer: Python, Kubernetes".to_string(),
            matched_skills: vec!["python".to_string()],
            missing_skills: vec!["kubernetes".to_string()],
            fit_score: 52.0,
        }
    }

    #[test]
    fn test_advise_sends_rendered_prompt() {
        let (mut advisor, prompts) = advisor("## KEY STRENGTHS\nYour Python work.");

        let advice = advisor.advise(&params()).unwrap();
        assert_eq!(advice.text, "## KEY STRENGTHS\nYour Python work.");
        assert_eq!(advice.model_used, "scripted");
        assert_eq!(advice.token_count, 7);
        assert_eq!(advice.processing_time_ms, 35);

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        let (system, prompt) = &prompts[0];
        assert_eq!(system, SYSTEM_PROMPT);
        assert!(prompt.contains("Backend developer, Python and PostgreSQL"));
        assert!(prompt.contains("lacks: kubernetes"));
    }

    #[test]
    fn test_empty_reply_is_an_error() {
        let (mut advisor, _) = advisor("  \n ");
        let result = advisor.advise(&params());
        assert!(matches!(result, Err(SkillAlignerError::ModelError(_))));
    }

    #[test]
    fn test_load_fails_without_model_files() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let result = CareerAdvisor::load(temp_dir.path(), &LlmConfig::default());
        assert!(result.is_err());
    }
}
