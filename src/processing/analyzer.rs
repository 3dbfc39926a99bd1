//! Skill engine: owns the vocabulary, the embedder and the vocabulary index,
//! and runs extraction, comparison and scoring against them

use crate::config::{Config, EmbedderKind, MatchingConfig};
use crate::error::Result;
use crate::processing::bert::BertEmbedder;
use crate::processing::comparator::{ComparisonResult, Comparator};
use crate::processing::embedding_index::SkillEmbeddingIndex;
use crate::processing::embeddings::{Embedder, Model2VecEmbedder};
use crate::processing::scorer::{self, ScoreResult};
use crate::processing::skill_extractor::{ExtractionResult, SkillExtractor};
use crate::processing::vocabulary::SkillVocabulary;
use log::{debug, info};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingOptions {
    /// A token is a skill when its best vocabulary similarity is above this
    pub extraction_threshold: f32,
    /// A job skill is matched when its best resume skill similarity is above this
    pub comparison_threshold: f32,
    pub batch_size: usize,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self::from(&MatchingConfig::default())
    }
}

impl From<&MatchingConfig> for MatchingOptions {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            extraction_threshold: config.extraction_threshold,
            comparison_threshold: config.comparison_threshold,
            batch_size: config.batch_size.max(1),
        }
    }
}

/// Everything one resume/job pass produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub resume: ExtractionResult,
    pub comparison: ComparisonResult,
    pub scores: ScoreResult,
}

/// Immutable after construction; safe to share across threads
pub struct SkillEngine {
    vocabulary: SkillVocabulary,
    embedder: Box<dyn Embedder>,
    index: SkillEmbeddingIndex,
    options: MatchingOptions,
}

impl SkillEngine {
    /// Embed the whole vocabulary once and keep the result
    pub fn new(
        vocabulary: SkillVocabulary,
        embedder: Box<dyn Embedder>,
        options: MatchingOptions,
    ) -> Result<Self> {
        let index = SkillEmbeddingIndex::build(&vocabulary, embedder.as_ref(), options.batch_size)?;
        Ok(Self {
            vocabulary,
            embedder,
            index,
            options,
        })
    }

    /// Load the configured vocabulary and the backend named by `models.backend`
    pub fn from_config(config: &Config, model_path: &Path) -> Result<Self> {
        let start_time = Instant::now();
        let options = MatchingOptions::from(&config.matching);
        let vocabulary = SkillVocabulary::load(&config.vocabulary)?;

        let embedder: Box<dyn Embedder> = match config.models.backend {
            EmbedderKind::Model2Vec => Box::new(Model2VecEmbedder::load(model_path, options.batch_size)?),
            EmbedderKind::Bert => Box::new(BertEmbedder::load(model_path, options.batch_size)?),
        };

        let engine = Self::new(vocabulary, embedder, options)?;
        info!(
            "Skill engine ready with {} skills in {:.2?}",
            engine.vocabulary.len(),
            start_time.elapsed()
        );
        Ok(engine)
    }

    fn extractor(&self) -> SkillExtractor<'_> {
        SkillExtractor::new(
            self.embedder.as_ref(),
            &self.index,
            self.options.extraction_threshold,
            self.options.batch_size,
        )
    }

    pub fn extract(&self, text: &str) -> Result<ExtractionResult> {
        self.extractor().extract(text)
    }

    pub fn compare(&self, resume: &ExtractionResult, jd_text: &str) -> Result<ComparisonResult> {
        let extractor = self.extractor();
        Comparator::new(&extractor, self.embedder.as_ref(), self.options.comparison_threshold)
            .compare(resume, jd_text)
    }

    pub fn score(&self, comparison: &ComparisonResult) -> ScoreResult {
        scorer::score(comparison)
    }

    /// Extract, compare and score in one call
    pub fn analyze(&self, resume_text: &str, jd_text: &str) -> Result<Analysis> {
        let start_time = Instant::now();
        let resume = self.extract(resume_text)?;
        let comparison = self.compare(&resume, jd_text)?;
        let scores = self.score(&comparison);
        debug!("Analysis finished in {:.2?}, score {:.2}", start_time.elapsed(), scores.final_score);

        Ok(Analysis {
            resume,
            comparison,
            scores,
        })
    }

    /// Closest vocabulary skill to a free-form phrase, with its similarity.
    ///
    /// `None` only for an empty vocabulary.
    pub fn nearest_skill(&self, phrase: &str) -> Result<Option<(String, f32)>> {
        let vector = self.embedder.embed(&phrase.trim().to_lowercase())?;
        Ok(self
            .index
            .nearest(&vector)?
            .map(|hit| (self.index.name(hit.index).to_string(), hit.similarity)))
    }

    pub fn vocabulary(&self) -> &SkillVocabulary {
        &self.vocabulary
    }

    pub fn options(&self) -> &MatchingOptions {
        &self.options
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}

/// Lazily initialized engine shared by every caller in the process.
///
/// The first successful initializer wins; a failed one leaves the cell empty
/// so a later call can retry.
pub struct EngineCell {
    inner: OnceCell<Arc<SkillEngine>>,
}

impl EngineCell {
    pub const fn new() -> Self {
        Self {
            inner: OnceCell::new(),
        }
    }

    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<SkillEngine>>
    where
        F: FnOnce() -> Result<SkillEngine>,
    {
        self.inner
            .get_or_try_init(|| init().map(Arc::new))
            .map(Arc::clone)
    }

    pub fn get(&self) -> Option<Arc<SkillEngine>> {
        self.inner.get().cloned()
    }
}

impl Default for EngineCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SkillAlignerError;
    use crate::processing::embeddings::LookupEmbedder;
    use approx::assert_relative_eq;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn engine() -> SkillEngine {
        let vocabulary = SkillVocabulary::from_json_str(
            r#"{"languages": ["Python", "SQL", "Rust"], "devops": ["Docker", "Kubernetes"]}"#,
        )
        .unwrap();
        let embedder = LookupEmbedder::one_hot(&["docker", "kubernetes", "python", "rust", "sql"])
            .alias("k8s", "kubernetes")
            .alias("postgresql", "sql");
        SkillEngine::new(vocabulary, Box::new(embedder), MatchingOptions::default()).unwrap()
    }

    #[test]
    fn test_default_options() {
        let options = MatchingOptions::default();
        assert_eq!(options.extraction_threshold, 0.75);
        assert_eq!(options.comparison_threshold, 0.75);
        assert_eq!(options.batch_size, 64);
    }

    #[test]
    fn test_partial_match() {
        let engine = engine();
        let analysis = engine
            .analyze("Python and SQL experience", "Must know Python, SQL, and Docker")
            .unwrap();

        assert_eq!(analysis.resume.skills, set(&["python", "sql"]));
        assert_eq!(analysis.comparison.matched_skills, set(&["python", "sql"]));
        assert_eq!(analysis.comparison.missing_skills, set(&["docker"]));
        assert_relative_eq!(analysis.scores.skill_component, 46.67);
        assert!(analysis.comparison.keyword_similarity > 0.0);
        assert!(analysis.scores.final_score > 46.67 && analysis.scores.final_score < 76.67);
    }

    #[test]
    fn test_no_skills_in_resume() {
        let engine = engine();
        let analysis = engine.analyze("asdkjh qwe zzz", "Python and SQL").unwrap();

        assert!(analysis.resume.skills.is_empty());
        assert!(analysis.comparison.matched_skills.is_empty());
        assert_eq!(analysis.comparison.missing_skills, set(&["python", "sql"]));
        assert_eq!(analysis.comparison.keyword_similarity, 0.0);
        assert_eq!(analysis.scores.final_score, 0.0);
    }

    #[test]
    fn test_identical_documents() {
        let engine = engine();
        let text = "Rust services on Kubernetes with PostgreSQL";
        let resume = engine.extract(text).unwrap();
        let comparison = engine.compare(&resume, text).unwrap();

        assert_eq!(comparison.matched_skills, comparison.jd_skills);
        assert_eq!(comparison.matched_skills, set(&["kubernetes", "rust", "sql"]));
        assert!(comparison.keyword_similarity >= 99.99);
        assert_relative_eq!(engine.score(&comparison).final_score, 100.0, epsilon = 0.01);
    }

    #[test]
    fn test_synonyms_map_to_vocabulary_names() {
        let engine = engine();
        let result = engine.extract("k8s and PostgreSQL").unwrap();
        assert_eq!(result.skills, set(&["kubernetes", "sql"]));
    }

    #[test]
    fn test_nearest_skill() {
        let engine = engine();

        let (skill, similarity) = engine.nearest_skill(" K8s ").unwrap().unwrap();
        assert_eq!(skill, "kubernetes");
        assert_relative_eq!(similarity, 1.0);

        let (_, similarity) = engine.nearest_skill("watercolour").unwrap().unwrap();
        assert_eq!(similarity, 0.0);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let engine = engine();
        let text = "Python, Docker, rust; kubernetes!";
        assert_eq!(engine.extract(text).unwrap(), engine.extract(text).unwrap());
        assert!(engine.extract("").unwrap().skills.is_empty());
    }

    #[test]
    fn test_partition_invariant() {
        let engine = engine();
        let resume = engine.extract("python docker").unwrap();
        let comparison = engine.compare(&resume, "python sql docker kubernetes rust").unwrap();

        let union: BTreeSet<String> = comparison
            .matched_skills
            .union(&comparison.missing_skills)
            .cloned()
            .collect();
        assert_eq!(union, comparison.jd_skills);
        assert!(comparison.matched_skills.is_disjoint(&comparison.missing_skills));
        assert_eq!(comparison.skill_matches.len(), comparison.jd_skills.len());
    }

    #[test]
    fn test_engine_cell_retries_after_failure() {
        let cell = EngineCell::new();
        assert!(cell.get().is_none());

        let failed = cell.get_or_try_init(|| Err(SkillAlignerError::Vocabulary("broken".to_string())));
        assert!(failed.is_err());
        assert!(cell.get().is_none());

        let first = cell.get_or_try_init(|| Ok(engine())).unwrap();
        let second = cell.get_or_try_init(|| panic!("already initialized")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_engine_cell_concurrent_init() {
        let cell = EngineCell::new();
        let inits = AtomicUsize::new(0);

        let engines: Vec<Arc<SkillEngine>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        cell.get_or_try_init(|| {
                            inits.fetch_add(1, Ordering::SeqCst);
                            Ok(engine())
                        })
                        .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(engines.iter().all(|e| Arc::ptr_eq(e, &engines[0])));
    }
}
