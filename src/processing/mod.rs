//! Skill extraction, comparison and scoring

pub mod analyzer;
pub mod bert;
pub mod comparator;
pub mod embedding_index;
pub mod embedding_manager;
pub mod embeddings;
pub mod scorer;
pub mod skill_extractor;
pub mod text_processor;
pub mod tfidf;
pub mod vocabulary;
