//! CLI interface for the skill aligner

use crate::config::{EmbedderKind, OutputFormat};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "skill-aligner")]
#[command(version)]
#[command(about = "Semantic skill matching between resumes and job descriptions")]
#[command(
    long_about = "Extract skills from a resume and a job description with embedding similarity against a curated vocabulary, then score how well they align"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Align resume with job description
    Align {
        /// Path to resume file (PDF, TXT, MD)
        #[arg(short, long)]
        resume: PathBuf,

        /// Path to job description file (PDF, TXT, MD)
        #[arg(short, long)]
        job: PathBuf,

        /// Embedding model id, Hub repo id, or local model directory
        #[arg(short, long)]
        embedding: Option<String>,

        /// Embedding backend: model2vec, bert
        #[arg(short, long)]
        backend: Option<String>,

        /// Output detailed analysis
        #[arg(short, long)]
        detailed: bool,

        /// Output format: console, json, markdown
        #[arg(short, long)]
        output: Option<String>,

        /// Save output to file, or into a directory under a generated name
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Ask a local chat model for written career advice
        #[arg(short, long)]
        advice: bool,

        /// Chat model used for advice (id, name, or HuggingFace repo ID)
        #[arg(long)]
        llm: Option<String>,
    },

    /// List the skills found in a single document
    Extract {
        /// Path to a resume or job description (PDF, TXT, MD)
        file: PathBuf,

        /// Embedding model id, Hub repo id, or local model directory
        #[arg(short, long)]
        embedding: Option<String>,

        /// Embedding backend: model2vec, bert
        #[arg(short, long)]
        backend: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Model management commands
    Models {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// List the skill vocabulary
    Skills {
        /// Only show one category
        #[arg(long)]
        category: Option<String>,

        /// Show the vocabulary skill closest to a phrase instead
        #[arg(long)]
        closest: Option<String>,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ModelAction {
    /// List available embedding and chat models
    List,

    /// Download a model
    Download {
        /// Model id, name, or HuggingFace repo ID
        model: String,

        /// Force re-download if model exists
        #[arg(short, long)]
        force: bool,
    },

    /// Remove a downloaded model
    Remove {
        /// Model id to remove
        model: String,
    },

    /// Show model information
    Info {
        /// Model id
        model: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

/// Parse and validate output format
pub fn parse_output_format(format: &str) -> Result<OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "console" => Ok(OutputFormat::Console),
        "json" => Ok(OutputFormat::Json),
        "markdown" | "md" => Ok(OutputFormat::Markdown),
        _ => Err(format!(
            "Invalid output format: {}. Supported: console, json, markdown",
            format
        )),
    }
}

/// Parse and validate embedding backend
pub fn parse_backend(backend: &str) -> Result<EmbedderKind, String> {
    match backend.to_lowercase().as_str() {
        "model2vec" | "m2v" => Ok(EmbedderKind::Model2Vec),
        "bert" | "sentence-transformer" => Ok(EmbedderKind::Bert),
        _ => Err(format!("Invalid backend: {}. Supported: model2vec, bert", backend)),
    }
}

/// Validate file extension
pub fn validate_file_extension(path: &Path, allowed_extensions: &[&str]) -> Result<(), String> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            if allowed_extensions.contains(&ext.to_lowercase().as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "Unsupported file extension: .{}. Allowed: {}",
                    ext,
                    allowed_extensions.join(", ")
                ))
            }
        }
        None => Err("File has no extension".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_align() {
        let cli = Cli::parse_from([
            "skill-aligner",
            "align",
            "--resume",
            "cv.pdf",
            "--job",
            "job.md",
            "--backend",
            "bert",
            "-o",
            "json",
        ]);
        match cli.command {
            Commands::Align {
                resume,
                backend,
                output,
                advice,
                llm,
                ..
            } => {
                assert_eq!(resume, PathBuf::from("cv.pdf"));
                assert_eq!(backend.as_deref(), Some("bert"));
                assert_eq!(output.as_deref(), Some("json"));
                assert!(!advice);
                assert!(llm.is_none());
            }
            _ => panic!("expected align"),
        }
    }

    #[test]
    fn test_parse_align_with_advice() {
        let cli = Cli::parse_from([
            "skill-aligner",
            "align",
            "-r",
            "cv.txt",
            "-j",
            "job.txt",
            "--advice",
            "--llm",
            "tinyllama",
        ]);
        match cli.command {
            Commands::Align { advice, llm, .. } => {
                assert!(advice);
                assert_eq!(llm.as_deref(), Some("tinyllama"));
            }
            _ => panic!("expected align"),
        }
    }

    #[test]
    fn test_parse_skills_closest() {
        let cli = Cli::parse_from(["skill-aligner", "skills", "--closest", "k8s"]);
        match cli.command {
            Commands::Skills { category, closest } => {
                assert!(category.is_none());
                assert_eq!(closest.as_deref(), Some("k8s"));
            }
            _ => panic!("expected skills"),
        }
    }

    #[test]
    fn test_parse_output_format() {
        assert_eq!(parse_output_format("MD"), Ok(OutputFormat::Markdown));
        assert_eq!(parse_output_format("json"), Ok(OutputFormat::Json));
        assert!(parse_output_format("html").is_err());
    }

    #[test]
    fn test_parse_backend() {
        assert_eq!(parse_backend("Model2Vec"), Ok(EmbedderKind::Model2Vec));
        assert_eq!(parse_backend("bert"), Ok(EmbedderKind::Bert));
        assert!(parse_backend("onnx").is_err());
    }

    #[test]
    fn test_validate_file_extension() {
        assert!(validate_file_extension(Path::new("a.PDF"), &["pdf", "txt"]).is_ok());
        assert!(validate_file_extension(Path::new("a.docx"), &["pdf", "txt"]).is_err());
        assert!(validate_file_extension(Path::new("README"), &["pdf"]).is_err());
    }
}
