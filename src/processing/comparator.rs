//! Resume vs job description skill comparison

use crate::error::{Result, SkillAlignerError};
use crate::processing::embedding_index::similarity_matrix;
use crate::processing::embeddings::Embedder;
use crate::processing::skill_extractor::{ExtractionResult, SkillExtractor};
use crate::processing::tfidf::keyword_similarity;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub matched_skills: BTreeSet<String>,
    pub missing_skills: BTreeSet<String>,
    /// TF-IDF cosine of the two documents, 0 to 100
    pub keyword_similarity: f64,
    /// Best resume skill for every job skill, in job skill order
    #[serde(default)]
    pub skill_matches: Vec<SkillMatch>,
    pub resume_skills: BTreeSet<String>,
    pub jd_skills: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub jd_skill: String,
    pub best_resume_skill: String,
    pub similarity: f32,
    pub matched: bool,
}

pub struct Comparator<'a> {
    extractor: &'a SkillExtractor<'a>,
    embedder: &'a dyn Embedder,
    threshold: f32,
}

impl<'a> Comparator<'a> {
    pub fn new(extractor: &'a SkillExtractor<'a>, embedder: &'a dyn Embedder, threshold: f32) -> Self {
        Self {
            extractor,
            embedder,
            threshold,
        }
    }

    /// Compare a resume extraction against raw job description text.
    ///
    /// Job skills are extracted here with the same pipeline as the resume.
    /// A job skill counts as matched when its best resume skill is strictly
    /// above the threshold.
    pub fn compare(&self, resume: &ExtractionResult, jd_text: &str) -> Result<ComparisonResult> {
        let jd_skills = self.extractor.extract(jd_text)?.skills;
        let resume_skills = resume.skills.clone();

        if jd_skills.is_empty() || resume_skills.is_empty() {
            debug!(
                "Nothing to compare ({} resume skills, {} job skills)",
                resume_skills.len(),
                jd_skills.len()
            );
            return Ok(ComparisonResult {
                matched_skills: BTreeSet::new(),
                missing_skills: jd_skills.clone(),
                keyword_similarity: 0.0,
                skill_matches: Vec::new(),
                resume_skills,
                jd_skills,
            });
        }

        let jd_list: Vec<String> = jd_skills.iter().cloned().collect();
        let resume_list: Vec<String> = resume_skills.iter().cloned().collect();
        let jd_vectors = self.embed_all(&jd_list)?;
        let resume_vectors = self.embed_all(&resume_list)?;

        // rows: job skills, columns: resume skills
        let matrix = similarity_matrix(&jd_vectors, &resume_vectors)?;

        let mut matched_skills = BTreeSet::new();
        let mut skill_matches = Vec::with_capacity(jd_list.len());
        for (row, jd_skill) in matrix.outer_iter().zip(jd_list.iter()) {
            let (best_column, best) = row.iter().enumerate().fold(
                (0, f32::NEG_INFINITY),
                |acc, (j, &similarity)| if similarity > acc.1 { (j, similarity) } else { acc },
            );

            let matched = best > self.threshold;
            if matched {
                matched_skills.insert(jd_skill.clone());
            }
            skill_matches.push(SkillMatch {
                jd_skill: jd_skill.clone(),
                best_resume_skill: resume_list[best_column].clone(),
                similarity: best,
                matched,
            });
        }

        let missing_skills: BTreeSet<String> = jd_skills.difference(&matched_skills).cloned().collect();
        let keyword_similarity = round2(keyword_similarity(&resume.normalized_text, jd_text) * 100.0);

        debug!(
            "{} of {} job skills matched, keyword similarity {:.2}",
            matched_skills.len(),
            jd_skills.len(),
            keyword_similarity
        );

        Ok(ComparisonResult {
            matched_skills,
            missing_skills,
            keyword_similarity,
            skill_matches,
            resume_skills,
            jd_skills,
        })
    }

    fn embed_all(&self, skills: &[String]) -> Result<Vec<Vec<f32>>> {
        let vectors = self.embedder.embed_batch(skills)?;
        if vectors.len() != skills.len() {
            return Err(SkillAlignerError::Embedding(format!(
                "Embedder returned {} vectors for {} skills",
                vectors.len(),
                skills.len()
            )));
        }
        Ok(vectors)
    }
}

/// Round half away from zero to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
