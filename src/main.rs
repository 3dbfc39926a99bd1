//! skill-aligner: semantic skill matching between resumes and job descriptions

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use skill_aligner::cli::{self, Cli, Commands, ConfigAction, ModelAction};
use skill_aligner::config::{Config, EmbedderKind, OutputFormat};
use skill_aligner::error::{Result, SkillAlignerError};
use skill_aligner::input::InputManager;
use skill_aligner::llm::advisor::{CareerAdvice, CareerAdvisor};
use skill_aligner::llm::model_manager::LlmModelManager;
use skill_aligner::llm::prompts::PromptParams;
use skill_aligner::output::{save_report_to_file, suggest_filename, AlignmentReport, ReportGenerator, ReportMetadata};
use skill_aligner::processing::analyzer::{Analysis, SkillEngine};
use skill_aligner::processing::embedding_manager::EmbeddingModelManager;
use skill_aligner::processing::vocabulary::SkillVocabulary;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "markdown"];

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, config, &config_path).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, config: Config, config_path: &Path) -> Result<()> {
    match command {
        Commands::Align {
            resume,
            job,
            embedding,
            backend,
            detailed,
            output,
            save,
            advice,
            llm,
        } => {
            info!("Starting skill alignment analysis");

            cli::validate_file_extension(&resume, SUPPORTED_EXTENSIONS)
                .map_err(|e| SkillAlignerError::InvalidInput(format!("Resume file: {}", e)))?;
            cli::validate_file_extension(&job, SUPPORTED_EXTENSIONS)
                .map_err(|e| SkillAlignerError::InvalidInput(format!("Job description file: {}", e)))?;

            let output_format = match output {
                Some(format) => cli::parse_output_format(&format).map_err(SkillAlignerError::InvalidInput)?,
                None => config.output.format,
            };
            let backend = backend
                .map(|b| cli::parse_backend(&b))
                .transpose()
                .map_err(SkillAlignerError::InvalidInput)?;
            let detailed = detailed || config.output.detailed;
            let console = output_format == OutputFormat::Console;

            if console {
                println!("🚀 Skill alignment analysis");
                println!("📄 Resume: {}", resume.display());
                println!("💼 Job Description: {}", job.display());
            }

            let start_time = Instant::now();
            let mut input_manager = InputManager::new();
            let resume_text = input_manager.extract_text(&resume).await?;
            let job_text = input_manager.extract_text(&job).await?;
            check_length(&resume, &resume_text, config.processing.max_input_chars)?;
            check_length(&job, &job_text, config.processing.max_input_chars)?;

            let (engine, model_name) = build_engine(&config, embedding.as_deref(), backend, console).await?;
            let analysis = engine.analyze(&resume_text, &job_text)?;

            let metadata = ReportMetadata::new(
                &resume.to_string_lossy(),
                &job.to_string_lossy(),
                &model_name,
                engine.vocabulary().len(),
            )
            .with_processing_time(start_time.elapsed().as_millis() as u64);
            let mut report = AlignmentReport::from_analysis(&analysis, engine.vocabulary(), metadata);

            if advice {
                // the score report stands on its own when the chat model cannot run
                match generate_advice(&config, llm.as_deref(), &resume_text, &job_text, &analysis, console).await {
                    Ok(advice) => report = report.with_advice(advice),
                    Err(e) => warn!("Career advice unavailable: {}", e),
                }
            }

            let generator = ReportGenerator::with_options(config.output.color_output, detailed, true, true);
            let rendered = generator.generate_report(&report, &output_format)?;
            println!("{}", rendered);

            if let Some(save_path) = save {
                // colors are terminal-only
                let content = if console {
                    ReportGenerator::with_options(false, detailed, true, true).generate_report(&report, &output_format)?
                } else {
                    rendered
                };
                let save_path = if save_path.is_dir() {
                    save_path.join(suggest_filename(&output_format, &resume.to_string_lossy(), true))
                } else {
                    save_path
                };
                save_report_to_file(&content, &save_path)?;
                println!("💾 Report saved to {}", save_path.display());
            }
        }

        Commands::Extract {
            file,
            embedding,
            backend,
            json,
        } => {
            cli::validate_file_extension(&file, SUPPORTED_EXTENSIONS).map_err(SkillAlignerError::InvalidInput)?;
            let backend = backend
                .map(|b| cli::parse_backend(&b))
                .transpose()
                .map_err(SkillAlignerError::InvalidInput)?;

            let text = InputManager::new().extract_text(&file).await?;
            check_length(&file, &text, config.processing.max_input_chars)?;

            let (engine, _) = build_engine(&config, embedding.as_deref(), backend, !json).await?;
            let extraction = engine.extract(&text)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&extraction.skills)?);
            } else {
                println!("🔎 {} skills found in {}\n", extraction.skills.len(), file.display());
                for skill in &extraction.skills {
                    let category = engine.vocabulary().category_of(skill).unwrap_or("other");
                    println!("  • {} ({})", skill, category.replace('_', " "));
                }
            }
        }

        Commands::Models { action } => {
            let mut manager = EmbeddingModelManager::new(config.models_dir().clone()).await?;
            let mut llm_manager = LlmModelManager::new(config.llm_models_dir()).await?;

            match action {
                ModelAction::List => {
                    println!("📚 Available Embedding Models\n");
                    for (id, model) in manager.list_available_models() {
                        let default_marker = if id == config.models.default_embedding_model {
                            " (default)"
                        } else {
                            ""
                        };
                        println!(
                            "  • {}{} - {} MB [{}]",
                            id,
                            default_marker,
                            model.size_mb,
                            download_status(manager.is_model_downloaded(id))
                        );
                        println!("    {} ({})", model.description, model.repo_id);
                    }

                    println!("\n🤖 Available Chat Models (for --advice)\n");
                    for (id, model) in llm_manager.list_available_models() {
                        let default_marker = if id == config.llm.model { " (default)" } else { "" };
                        println!(
                            "  • {}{} - {} MB [{}]",
                            id,
                            default_marker,
                            model.size_mb,
                            download_status(llm_manager.is_model_downloaded(id))
                        );
                        println!("    {} ({})", model.description, model.repo_id);
                    }

                    if manager.list_downloaded_models().is_empty() {
                        println!("\n💡 No embedding models downloaded yet. Get started with:");
                        println!("   skill-aligner models download {}", config.models.default_embedding_model);
                    }
                    if llm_manager.list_downloaded_models().is_empty() {
                        println!("\n💡 Career advice downloads {} on first use of --advice", config.llm.model);
                    }
                }

                ModelAction::Download { model, force } => {
                    let (model_id, is_llm) = resolve_any_model(&manager, &llm_manager, &model)
                        .ok_or_else(|| SkillAlignerError::ModelNotFound(model.clone()))?;
                    let downloaded = if is_llm {
                        llm_manager.is_model_downloaded(&model_id)
                    } else {
                        manager.is_model_downloaded(&model_id)
                    };

                    if !force && downloaded {
                        println!("✅ Model '{}' is already downloaded!", model_id);
                        println!("💡 Use --force to re-download");
                        return Ok(());
                    }

                    let model_path = if is_llm {
                        llm_manager.download_model(&model_id, force).await?
                    } else {
                        manager.download_model(&model_id, force).await?
                    };
                    println!("📁 Location: {}", model_path.display());
                }

                ModelAction::Remove { model } => {
                    let (model_id, is_llm) =
                        resolve_any_model(&manager, &llm_manager, &model).unwrap_or((model, false));
                    if is_llm && llm_manager.is_model_downloaded(&model_id) {
                        llm_manager.remove_model(&model_id).await?;
                    } else if !is_llm && manager.is_model_downloaded(&model_id) {
                        manager.remove_model(&model_id).await?;
                    } else {
                        println!("⚠️  Model '{}' is not downloaded", model_id);
                        return Ok(());
                    }
                    println!("✅ Model '{}' removed successfully!", model_id);
                }

                ModelAction::Info { model } => {
                    let (model_id, is_llm) = resolve_any_model(&manager, &llm_manager, &model)
                        .ok_or_else(|| SkillAlignerError::ModelNotFound(model.clone()))?;

                    println!("📋 Model Information for '{}'\n", model_id);
                    let path = if is_llm {
                        let info = llm_manager
                            .get_model_info(&model_id)
                            .ok_or_else(|| SkillAlignerError::ModelNotFound(model_id.clone()))?;
                        println!("Name: {}", info.name);
                        println!("Repository: {}", info.repo_id);
                        println!("Kind: chat model (career advice)");
                        println!("Context length: {} tokens", info.context_length);
                        println!("Size: {} MB", info.size_mb);
                        println!("Description: {}", info.description);
                        llm_manager.get_model_path(&model_id)
                    } else {
                        let info = manager
                            .get_model_info(&model_id)
                            .ok_or_else(|| SkillAlignerError::ModelNotFound(model_id.clone()))?;
                        println!("Name: {}", info.name);
                        println!("Repository: {}", info.repo_id);
                        println!("Backend: {:?}", info.backend);
                        println!("Dimensions: {}", info.dimensions);
                        println!("Size: {} MB", info.size_mb);
                        println!("Description: {}", info.description);
                        manager.get_model_path(&model_id)
                    };

                    match path {
                        Some(path) => println!("Status: ✅ Downloaded ({})", path.display()),
                        None => {
                            println!("Status: ⬇️  Available for download");
                            println!("\n💡 To download this model, run:");
                            println!("   skill-aligner models download {}", model_id);
                        }
                    }
                }
            }
        }

        Commands::Skills {
            category: _,
            closest: Some(phrase),
        } => {
            let (engine, model_name) = build_engine(&config, None, None, true).await?;
            match engine.nearest_skill(&phrase)? {
                Some((skill, similarity)) => {
                    let category = engine.vocabulary().category_of(&skill).unwrap_or("other");
                    println!("🔎 Closest skill to '{}' with {}:\n", phrase.trim(), model_name);
                    println!("  • {} ({}) similarity {:.3}", skill, category.replace('_', " "), similarity);
                    let threshold = engine.options().extraction_threshold;
                    if similarity > threshold {
                        println!("\n✅ Above the extraction threshold ({}), it would be extracted", threshold);
                    } else {
                        println!("\n❌ Not above the extraction threshold ({}), it would be ignored", threshold);
                    }
                }
                None => println!("⚠️  The skill vocabulary is empty"),
            }
        }

        Commands::Skills { category, closest: None } => {
            let vocabulary = SkillVocabulary::load(&config.vocabulary)?;
            let mut shown = 0;
            for (name, skills) in vocabulary.categories() {
                if category.as_deref().is_some_and(|c| !c.eq_ignore_ascii_case(name)) {
                    continue;
                }
                println!("{} ({})", name.replace('_', " "), skills.len());
                println!("  {}\n", skills.join(", "));
                shown += 1;
            }

            match (category, shown) {
                (Some(c), 0) => {
                    return Err(SkillAlignerError::InvalidInput(format!("Unknown skill category: {}", c)));
                }
                (None, _) => println!("📚 {} skills in total", vocabulary.len()),
                _ => {}
            }
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                println!("⚙️  Current Configuration ({})\n", config_path.display());
                println!("Models Directory: {}", config.models_dir().display());
                println!("Default Embedding Model: {}", config.models.default_embedding_model);
                println!("Backend: {:?}", config.models.backend);
                match &config.vocabulary.catalog_path {
                    Some(path) => println!("Skill Catalog: {}", path.display()),
                    None => println!("Skill Catalog: built-in"),
                }
                println!("\nMatching:");
                println!("  Extraction threshold: {}", config.matching.extraction_threshold);
                println!("  Comparison threshold: {}", config.matching.comparison_threshold);
                println!("  Batch size: {}", config.matching.batch_size);
                println!("\nCareer advice:");
                println!("  Chat model: {} ({})", config.llm.model, config.llm_models_dir().display());
                println!("  Max tokens: {}", config.llm.max_tokens);
                println!(
                    "  Temperature: {} | top-p: {} | top-k: {}",
                    config.llm.temperature,
                    config.llm.top_p,
                    config.llm.top_k.map_or("off".to_string(), |k| k.to_string())
                );
                println!("  Document limit: {} characters", config.llm.max_document_chars);
                println!("\nMax input: {} characters", config.processing.max_input_chars);
                println!("Output: {:?} (detailed: {})", config.output.format, config.output.detailed);
            }

            Some(ConfigAction::Reset) => {
                println!("🔄 Resetting configuration to defaults...");
                Config::default().save_to(config_path)?;
                println!("✅ Configuration reset successfully!");
            }

            Some(ConfigAction::Path) => {
                println!("{}", config_path.display());
            }
        },
    }

    Ok(())
}

/// Resolve the embedding model and build the engine, showing a spinner while
/// the vocabulary is embedded
async fn build_engine(
    config: &Config,
    embedding: Option<&str>,
    backend_override: Option<EmbedderKind>,
    show_progress: bool,
) -> Result<(SkillEngine, String)> {
    let requested = embedding.unwrap_or(&config.models.default_embedding_model);
    let (model_path, model_name, model_backend) = resolve_model(config, requested).await?;

    let mut engine_config = config.clone();
    engine_config.models.backend = backend_override.or(model_backend).unwrap_or(config.models.backend);
    info!("Using {} with the {:?} backend", model_name, engine_config.models.backend);

    let spinner = if show_progress {
        let spinner = ProgressBar::new_spinner().with_style(ProgressStyle::default_spinner());
        spinner.set_message(format!("Embedding skill vocabulary with {}...", model_name));
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    } else {
        None
    };

    let engine = tokio::task::spawn_blocking(move || SkillEngine::from_config(&engine_config, &model_path))
        .await
        .map_err(|e| SkillAlignerError::Processing(format!("Engine initialization panicked: {}", e)))?;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    Ok((engine?, model_name))
}

/// Known model ids are downloaded on demand; anything else must be a local directory
async fn resolve_model(config: &Config, requested: &str) -> Result<(PathBuf, String, Option<EmbedderKind>)> {
    let local = PathBuf::from(requested);
    if local.is_dir() {
        return Ok((local, requested.to_string(), None));
    }

    let mut manager = EmbeddingModelManager::new(config.models_dir().clone()).await?;
    let model_id = manager
        .resolve_model_id(requested)
        .ok_or_else(|| SkillAlignerError::ModelNotFound(requested.to_string()))?;
    let backend = manager.get_model_info(&model_id).map(|info| info.backend);

    if !manager.is_model_downloaded(&model_id) {
        warn!("Embedding model {} is not downloaded yet, fetching it now", model_id);
    }
    let path = manager.ensure_model_available(&model_id).await?;
    Ok((path, model_id, backend))
}

/// Load the chat model off the async runtime and ask it for advice
async fn generate_advice(
    config: &Config,
    requested: Option<&str>,
    resume_text: &str,
    job_text: &str,
    analysis: &Analysis,
    show_progress: bool,
) -> Result<CareerAdvice> {
    let requested = requested.unwrap_or(&config.llm.model);
    let model_path = resolve_llm(config, requested).await?;
    let params = PromptParams::from_analysis(resume_text, job_text, analysis, config.llm.max_document_chars);
    let llm_config = config.llm.clone();

    let spinner = if show_progress {
        let spinner = ProgressBar::new_spinner().with_style(ProgressStyle::default_spinner());
        spinner.set_message(format!("Writing career advice with {}...", requested));
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    } else {
        None
    };

    let advice = tokio::task::spawn_blocking(move || CareerAdvisor::load(&model_path, &llm_config)?.advise(&params))
        .await
        .map_err(|e| SkillAlignerError::Processing(format!("Advice generation panicked: {}", e)))?;

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    advice
}

async fn resolve_llm(config: &Config, requested: &str) -> Result<PathBuf> {
    let local = PathBuf::from(requested);
    if local.is_dir() {
        return Ok(local);
    }

    let mut manager = LlmModelManager::new(config.llm_models_dir()).await?;
    let model_id = manager
        .resolve_model_id(requested)
        .ok_or_else(|| SkillAlignerError::ModelNotFound(requested.to_string()))?;
    if !manager.is_model_downloaded(&model_id) {
        warn!("Chat model {} is not downloaded yet, fetching it now", model_id);
    }
    manager.ensure_model_available(&model_id).await
}

/// Embedding models win when an id exists in both catalogs; the flag marks a chat model
fn resolve_any_model(
    embeddings: &EmbeddingModelManager,
    llms: &LlmModelManager,
    input: &str,
) -> Option<(String, bool)> {
    embeddings
        .resolve_model_id(input)
        .map(|id| (id, false))
        .or_else(|| llms.resolve_model_id(input).map(|id| (id, true)))
}

fn download_status(downloaded: bool) -> &'static str {
    if downloaded {
        "✅ Downloaded"
    } else {
        "⬇️  Available"
    }
}

fn check_length(path: &Path, text: &str, max_chars: usize) -> Result<()> {
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(SkillAlignerError::InvalidInput(format!(
            "{} has {} characters, the limit is {} (processing.max_input_chars)",
            path.display(),
            chars,
            max_chars
        )));
    }
    Ok(())
}
