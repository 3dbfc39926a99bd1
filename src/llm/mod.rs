//! Career advice generated by a local chat model

pub mod advisor;
pub mod inference;
pub mod model_manager;
pub mod prompts;
