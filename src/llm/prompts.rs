//! Career advice prompt built from the documents and one skill analysis

use crate::processing::analyzer::Analysis;
use serde::{Deserialize, Serialize};

pub const SYSTEM_PROMPT: &str = "You are an expert career advisor who evaluates resumes against job descriptions.";

/// Prompt template with `{placeholder}` slots
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub career_advice: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            career_advice: CAREER_ADVICE_TEMPLATE.to_string(),
        }
    }
}

/// Values substituted into the template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptParams {
    pub resume_content: String,
    pub job_content: String,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub fit_score: f64,
}

impl PromptParams {
    /// Documents are cut to `max_document_chars` so the prompt fits small context windows
    pub fn from_analysis(resume_text: &str, job_text: &str, analysis: &Analysis, max_document_chars: usize) -> Self {
        Self {
            resume_content: truncate_chars(resume_text.trim(), max_document_chars),
            job_content: truncate_chars(job_text.trim(), max_document_chars),
            matched_skills: analysis.comparison.matched_skills.iter().cloned().collect(),
            missing_skills: analysis.comparison.missing_skills.iter().cloned().collect(),
            fit_score: analysis.scores.final_score,
        }
    }
}

impl PromptTemplates {
    pub fn render_career_advice(&self, params: &PromptParams) -> String {
        let score = format!("{:.2}", params.fit_score);
        let matched = skill_list(&params.matched_skills);
        let missing = skill_list(&params.missing_skills);

        render(
            &self.career_advice,
            &[
                ("resume", params.resume_content.as_str()),
                ("job", params.job_content.as_str()),
                ("score", score.as_str()),
                ("matched", matched.as_str()),
                ("missing", missing.as_str()),
            ],
        )
    }
}

/// Single pass substitution, so braces inside the documents are left alone
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| values.iter().find(|(key, _)| *key == &after[..close]).map(|(_, v)| (close, *v)));

        match value {
            Some((close, value)) => {
                output.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

fn skill_list(skills: &[String]) -> String {
    if skills.is_empty() {
        "none".to_string()
    } else {
        skills.join(", ")
    }
}

/// First `max_chars` characters, marked when something was cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}\n[truncated]", &text[..byte_index]),
        None => text.to_string(),
    }
}

const CAREER_ADVICE_TEMPLATE: &str = r#"TASK: Evaluate the resume below against the job description. Write directly to the candidate, in the second person.

<RESUME>
{resume}
</RESUME>

<JOB POSTING>
{job}
</JOB POSTING>

Automated skill matching scored this resume {score}/100.
Skills found in both: {matched}
Skills the job asks for that the resume lacks: {missing}

Provide your analysis in the following format:

## KEY STRENGTHS
List 3-4 skills, experiences or achievements from the resume that directly match the job, and why each is valuable for this role.

## AREAS TO IMPROVE
Identify 3-4 skills or experiences to improve or gain, with practical suggestions such as projects or certifications.

## SKILL GAPS
A Markdown table with the columns Skill, Importance (CRITICAL / IMPORTANT / NICE-TO-HAVE) and Course. For the course give only its title and platform (Coursera, edX or Udemy). Do not invent URLs.

## CAREER ROLE ALIGNMENT
Say whether the resume fits this job. If it does not, suggest 1-2 alternative roles that fit the candidate's skills better, with a short reason for each. Do not repeat the job title from the posting.

Keep the tone supportive, clear and practical. Reference the actual resume content, not generic advice."#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::comparator::ComparisonResult;
    use crate::processing::scorer::ScoreResult;
    use crate::processing::skill_extractor::ExtractionResult;

    fn params() -> PromptParams {
        PromptParams {
            resume_content: "Software Engineer with Python experience at Tech Corp.".to_string(),
            job_content: "Senior Software Engineer role requiring Docker and Python.".to_string(),
            matched_skills: vec!["python".to_string()],
            missing_skills: vec!["docker".to_string(), "kubernetes".to_string()],
            fit_score: 48.5,
        }
    }

    #[test]
    fn test_career_advice_rendering() {
        let prompt = PromptTemplates::default().render_career_advice(&params());

        assert!(prompt.contains("<RESUME>\nSoftware Engineer with Python experience at Tech Corp.\n</RESUME>"));
        assert!(prompt.contains("requiring Docker and Python."));
        assert!(prompt.contains("scored this resume 48.50/100"));
        assert!(prompt.contains("Skills found in both: python\n"));
        assert!(prompt.contains("lacks: docker, kubernetes\n"));
        for section in ["## KEY STRENGTHS", "## AREAS TO IMPROVE", "## SKILL GAPS", "## CAREER ROLE ALIGNMENT"] {
            assert!(prompt.contains(section), "missing {}", section);
        }
        assert!(!prompt.contains("{resume}") && !prompt.contains("{missing}"));
    }

    #[test]
    fn test_empty_skill_sets_render_none() {
        let mut params = params();
        params.matched_skills.clear();
        params.missing_skills.clear();

        let prompt = PromptTemplates::default().render_career_advice(&params);
        assert!(prompt.contains("Skills found in both: none\n"));
        assert!(prompt.contains("lacks: none\n"));
    }

    #[test]
    fn test_braces_in_documents_are_kept() {
        let mut params = params();
        params.resume_content = "Wrote {job} templates and a {missing} handler in Rust {".to_string();

        let prompt = PromptTemplates::default().render_career_advice(&params);
        assert!(prompt.contains("Wrote {job} templates and a {missing} handler in Rust {"));
    }

    #[test]
    fn test_render_unknown_placeholder() {
        assert_eq!(render("a {x} {y} {", &[("x", "1")]), "a 1 {y} {");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("résumé text", 6), "résumé\n[truncated]");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn test_params_from_analysis() {
        let analysis = Analysis {
            resume: ExtractionResult::default(),
            comparison: ComparisonResult {
                matched_skills: ["sql", "python"].iter().map(|s| s.to_string()).collect(),
                missing_skills: ["docker"].iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            scores: ScoreResult {
                final_score: 61.2,
                keyword_component: 14.53,
                skill_component: 46.67,
            },
        };

        let params = PromptParams::from_analysis("  resume body  ", "job body that is long", &analysis, 8);
        assert_eq!(params.resume_content, "resume b\n[truncated]");
        assert_eq!(params.job_content, "job body\n[truncated]");
        assert_eq!(params.matched_skills, vec!["python", "sql"]);
        assert_eq!(params.missing_skills, vec!["docker"]);
        assert_eq!(params.fit_score, 61.2);
    }
}
