//! Semantic skill extraction and resume/job description fit scoring

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod llm;
pub mod output;
pub mod processing;

pub use config::Config;
pub use error::{Result, SkillAlignerError};
pub use llm::advisor::{CareerAdvice, CareerAdvisor};
pub use processing::analyzer::{Analysis, EngineCell, MatchingOptions, SkillEngine};
pub use processing::comparator::ComparisonResult;
pub use processing::embeddings::{Embedder, LookupEmbedder};
pub use processing::scorer::ScoreResult;
pub use processing::skill_extractor::ExtractionResult;
pub use processing::vocabulary::SkillVocabulary;
