//! Semantic skill extraction: every token is mapped to its closest vocabulary skill

use crate::error::{Result, SkillAlignerError};
use crate::processing::embedding_index::SkillEmbeddingIndex;
use crate::processing::embeddings::Embedder;
use crate::processing::text_processor::normalized_tokens;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Skills recognized in one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Canonical vocabulary names, never raw tokens
    pub skills: BTreeSet<String>,
    /// The document after normalization; reused for keyword similarity
    pub normalized_text: String,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

pub struct SkillExtractor<'a> {
    embedder: &'a dyn Embedder,
    index: &'a SkillEmbeddingIndex,
    threshold: f32,
    batch_size: usize,
}

impl<'a> SkillExtractor<'a> {
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a SkillEmbeddingIndex,
        threshold: f32,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            threshold,
            batch_size: batch_size.max(1),
        }
    }

    /// A token contributes its nearest skill only when the similarity is
    /// strictly above the threshold
    pub fn extract(&self, text: &str) -> Result<ExtractionResult> {
        let (normalized_text, tokens) = normalized_tokens(text);
        let tokens: Vec<String> = tokens.into_iter().collect();

        let mut skills = BTreeSet::new();
        for batch in tokens.chunks(self.batch_size) {
            let vectors = self.embedder.embed_batch(batch)?;
            if vectors.len() != batch.len() {
                return Err(SkillAlignerError::Embedding(format!(
                    "Embedder returned {} vectors for {} tokens",
                    vectors.len(),
                    batch.len()
                )));
            }

            for (token, vector) in batch.iter().zip(vectors.iter()) {
                if let Some(hit) = self.index.nearest(vector)? {
                    if hit.similarity > self.threshold {
                        debug!("'{}' -> '{}' ({:.3})", token, self.index.name(hit.index), hit.similarity);
                        skills.insert(self.index.name(hit.index).to_string());
                    }
                }
            }
        }

        debug!("Extracted {} skills from {} tokens", skills.len(), tokens.len());
        Ok(ExtractionResult {
            skills,
            normalized_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::embeddings::LookupEmbedder;
    use crate::processing::vocabulary::SkillVocabulary;

    fn fixture() -> (LookupEmbedder, SkillEmbeddingIndex) {
        let vocabulary =
            SkillVocabulary::from_json_str(r#"{"lang": ["Python", "SQL"], "ops": ["Docker"]}"#).unwrap();
        let embedder = LookupEmbedder::one_hot(&["docker", "python", "sql"])
            .alias("py", "python")
            .alias("postgres", "sql");
        let index = SkillEmbeddingIndex::build(&vocabulary, &embedder, 8).unwrap();
        (embedder, index)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_canonical_names() {
        let (embedder, index) = fixture();
        let extractor = SkillExtractor::new(&embedder, &index, 0.75, 16);

        let result = extractor.extract("Py developer, Postgres and DOCKER.").unwrap();
        assert_eq!(result.skills, set(&["docker", "python", "sql"]));
        assert_eq!(result.normalized_text, "py developer  postgres and docker ");
    }

    #[test]
    fn test_extract_empty_text() {
        let (embedder, index) = fixture();
        let extractor = SkillExtractor::new(&embedder, &index, 0.75, 16);

        let result = extractor.extract("").unwrap();
        assert!(result.is_empty());
        assert_eq!(result.normalized_text, "");
    }

    #[test]
    fn test_batch_size_does_not_change_result() {
        let (embedder, index) = fixture();
        let text = "python sql docker cooking py gardening postgres";

        let one = SkillExtractor::new(&embedder, &index, 0.75, 1).extract(text).unwrap();
        let many = SkillExtractor::new(&embedder, &index, 0.75, 64).extract(text).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn test_threshold_is_strict() {
        let vocabulary = SkillVocabulary::from_json_str(r#"{"x": ["rust"]}"#).unwrap();
        let embedder = LookupEmbedder::new(5)
            .with("rust", vec![1.0, 0.0, 0.0, 0.0, 0.0])
            .with("exact", vec![3.0, 2.0, 1.0, 1.0, 1.0])
            .with("above", vec![3.0, 2.0, 1.0, 1.0, 0.9])
            .with("below", vec![3.0, 2.0, 1.0, 1.0, 1.1]);
        let index = SkillEmbeddingIndex::build(&vocabulary, &embedder, 8).unwrap();
        let extractor = SkillExtractor::new(&embedder, &index, 0.75, 8);

        assert!(extractor.extract("exact").unwrap().is_empty());
        assert!(extractor.extract("below").unwrap().is_empty());
        assert_eq!(extractor.extract("above").unwrap().skills, set(&["rust"]));
    }

    struct ShortEmbedder;

    impl Embedder for ShortEmbedder {
        fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]])
        }

        fn name(&self) -> &str {
            "short"
        }
    }

    #[test]
    fn test_wrong_vector_count_is_an_error() {
        let (_, index) = fixture();
        let embedder = ShortEmbedder;
        let extractor = SkillExtractor::new(&embedder, &index, 0.75, 16);

        let result = extractor.extract("python sql");
        assert!(matches!(result, Err(SkillAlignerError::Embedding(_))));
    }
}
