//! Composite fit score: 70 points for skill coverage, 30 for keyword overlap

use crate::processing::comparator::{round2, ComparisonResult};
use serde::{Deserialize, Serialize};

pub const SKILL_WEIGHT: f64 = 70.0;
pub const KEYWORD_WEIGHT: f64 = 30.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub final_score: f64,
    pub keyword_component: f64,
    pub skill_component: f64,
}

/// Score a comparison.
///
/// The skill component is 0 whenever nothing matched, including the case of
/// a job description with no recognizable skills.
pub fn score(comparison: &ComparisonResult) -> ScoreResult {
    let matched = comparison.matched_skills.len();
    let missing = comparison.missing_skills.len();

    let skill_score = if matched > 0 {
        matched as f64 / (matched + missing) as f64 * SKILL_WEIGHT
    } else {
        0.0
    };
    let keyword_score = comparison.keyword_similarity / 100.0 * KEYWORD_WEIGHT;

    ScoreResult {
        final_score: round2(skill_score + keyword_score),
        keyword_component: round2(keyword_score),
        skill_component: round2(skill_score),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn comparison(matched: &[&str], missing: &[&str], keyword_similarity: f64) -> ComparisonResult {
        let to_set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        ComparisonResult {
            matched_skills: to_set(matched),
            missing_skills: to_set(missing),
            keyword_similarity,
            ..Default::default()
        }
    }

    #[test]
    fn test_mixed_score() {
        let result = score(&comparison(&["a", "b", "c"], &["d"], 50.0));
        assert_eq!(result.skill_component, 52.5);
        assert_eq!(result.keyword_component, 15.0);
        assert_eq!(result.final_score, 67.5);
    }

    #[test]
    fn test_perfect_score() {
        let result = score(&comparison(&["python", "sql"], &[], 100.0));
        assert_eq!(result.final_score, 100.0);
    }

    #[test]
    fn test_no_matches_zeroes_skill_component() {
        let result = score(&comparison(&[], &["docker"], 40.0));
        assert_eq!(result.skill_component, 0.0);
        assert_eq!(result.final_score, 12.0);

        let empty = score(&comparison(&[], &[], 0.0));
        assert_eq!(empty, ScoreResult::default());
    }

    #[test]
    fn test_rounding() {
        let result = score(&comparison(&["a"], &["b", "c"], 33.33));
        assert_eq!(result.skill_component, 23.33);
        assert_eq!(result.keyword_component, 10.0);
        assert_eq!(result.final_score, 33.33);
    }

    #[test]
    fn test_bounds() {
        for matched in 0..4usize {
            for missing in 0..4usize {
                let names: Vec<String> = (0..matched + missing).map(|i| i.to_string()).collect();
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                let result = score(&comparison(&refs[..matched], &refs[matched..], 100.0));
                assert!((0.0..=100.0).contains(&result.final_score));
                assert!((0.0..=70.0).contains(&result.skill_component));
                assert!((0.0..=30.0).contains(&result.keyword_component));
            }
        }
    }
}
