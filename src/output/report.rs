//! Serializable alignment report assembled from one analysis pass

use crate::llm::advisor::CareerAdvice;
use crate::processing::analyzer::Analysis;
use crate::processing::comparator::SkillMatch;
use crate::processing::scorer::ScoreResult;
use crate::processing::vocabulary::SkillVocabulary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Everything the formatters render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub scores: ScoreResult,
    pub verdict: Verdict,

    pub matched_skills: BTreeSet<String>,
    pub missing_skills: BTreeSet<String>,
    pub resume_skills: BTreeSet<String>,
    pub jd_skills: BTreeSet<String>,

    /// Missing skills grouped by catalog category
    pub missing_by_category: BTreeMap<String, Vec<String>>,

    /// TF-IDF similarity of the two documents, 0 to 100
    pub keyword_similarity: f64,

    /// Best resume counterpart for each job skill
    pub skill_matches: Vec<SkillMatch>,

    /// Written feedback from the local chat model, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<CareerAdvice>,

    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Strong,
    Good,
    Partial,
    Weak,
}

impl Verdict {
    pub fn from_score(final_score: f64) -> Self {
        if final_score >= 80.0 {
            Verdict::Strong
        } else if final_score >= 60.0 {
            Verdict::Good
        } else if final_score >= 40.0 {
            Verdict::Partial
        } else {
            Verdict::Weak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Strong => "STRONG MATCH",
            Verdict::Good => "GOOD MATCH",
            Verdict::Partial => "PARTIAL MATCH",
            Verdict::Weak => "WEAK MATCH",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            Verdict::Strong => "The resume covers nearly everything the job asks for.",
            Verdict::Good => "Most required skills are present; a few gaps remain.",
            Verdict::Partial => "Some overlap, but several required skills are missing.",
            Verdict::Weak => "Little overlap between the resume and the job description.",
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub aligner_version: String,
    pub resume_file: String,
    pub job_file: String,
    pub embedding_model: String,
    pub vocabulary_size: usize,
    pub processing_time_ms: u64,
}

impl ReportMetadata {
    pub fn new(resume_file: &str, job_file: &str, embedding_model: &str, vocabulary_size: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            aligner_version: env!("CARGO_PKG_VERSION").to_string(),
            resume_file: resume_file.to_string(),
            job_file: job_file.to_string(),
            embedding_model: embedding_model.to_string(),
            vocabulary_size,
            processing_time_ms: 0,
        }
    }

    pub fn with_processing_time(mut self, processing_time_ms: u64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }
}

impl AlignmentReport {
    pub fn from_analysis(analysis: &Analysis, vocabulary: &SkillVocabulary, metadata: ReportMetadata) -> Self {
        let comparison = &analysis.comparison;

        let mut missing_by_category: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for skill in &comparison.missing_skills {
            let category = vocabulary.category_of(skill).unwrap_or("other");
            missing_by_category
                .entry(category.to_string())
                .or_default()
                .push(skill.clone());
        }

        Self {
            scores: analysis.scores,
            verdict: Verdict::from_score(analysis.scores.final_score),
            matched_skills: comparison.matched_skills.clone(),
            missing_skills: comparison.missing_skills.clone(),
            resume_skills: analysis.resume.skills.clone(),
            jd_skills: comparison.jd_skills.clone(),
            missing_by_category,
            keyword_similarity: comparison.keyword_similarity,
            skill_matches: comparison.skill_matches.clone(),
            advice: None,
            metadata,
        }
    }

    pub fn with_advice(mut self, advice: CareerAdvice) -> Self {
        self.advice = Some(advice);
        self
    }

    /// Share of job skills found in the resume, 0 to 100
    pub fn coverage_percentage(&self) -> f64 {
        if self.jd_skills.is_empty() {
            0.0
        } else {
            self.matched_skills.len() as f64 / self.jd_skills.len() as f64 * 100.0
        }
    }

    /// Resume skills the job description never asked for
    pub fn extra_skills(&self) -> Vec<&str> {
        self.resume_skills
            .difference(&self.jd_skills)
            .map(String::as_str)
            .collect()
    }
}
