//! Output formatters: colored console, JSON and Markdown

use crate::config::OutputFormat;
use crate::error::{Result, SkillAlignerError};
use crate::output::report::{AlignmentReport, Verdict};
use colored::{Color, Colorize};
use std::path::Path;

/// Trait for rendering alignment reports
pub trait OutputFormatter {
    fn format_report(&self, report: &AlignmentReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

/// Console formatter with optional colors
pub struct ConsoleFormatter {
    use_colors: bool,
    detailed: bool,
}

/// JSON formatter for scripting and API integration
pub struct JsonFormatter {
    pretty: bool,
}

/// Markdown formatter for saved reports
pub struct MarkdownFormatter {
    include_metadata: bool,
}

/// Report generator that coordinates different formatters
pub struct ReportGenerator {
    formatters: Vec<Box<dyn OutputFormatter>>,
}

fn verdict_color(verdict: Verdict) -> Color {
    match verdict {
        Verdict::Strong => Color::Green,
        Verdict::Good => Color::BrightGreen,
        Verdict::Partial => Color::Yellow,
        Verdict::Weak => Color::Red,
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool, detailed: bool) -> Self {
        Self { use_colors, detailed }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let prefix = match level {
            1 => "█",
            2 => "▓",
            _ => "▒",
        };
        let color = match level {
            1 => Color::Blue,
            2 => Color::Green,
            _ => Color::Yellow,
        };

        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn format_verdict_badge(&self, verdict: Verdict) -> String {
        if self.use_colors {
            format!("[{}]", verdict.label().color(verdict_color(verdict)).bold())
        } else {
            format!("[{}]", verdict.label())
        }
    }

    fn format_skill_list(&self, skills: &[&str], color: Color) -> String {
        skills
            .iter()
            .map(|skill| self.colorize(skill, color))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_report(&self, report: &AlignmentReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header("📊 SKILL ALIGNMENT ANALYSIS", 1));
        output.push_str(&format!(
            "Generated: {} | Processing time: {}ms\n",
            report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            report.metadata.processing_time_ms
        ));

        output.push_str(&self.format_header("Summary", 2));
        output.push_str(&format!(
            "Fit Score: {:.2}/100 {}\n",
            report.scores.final_score,
            self.format_verdict_badge(report.verdict)
        ));
        output.push_str(&format!("{}\n", self.colorize(report.verdict.summary(), Color::Cyan)));

        output.push_str(&self.format_header("Score Breakdown", 3));
        output.push_str(&format!(
            "🎯 Skill coverage:     {:>6.2} / 70  ({} of {} job skills, {:.1}%)\n",
            report.scores.skill_component,
            report.matched_skills.len(),
            report.jd_skills.len(),
            report.coverage_percentage()
        ));
        output.push_str(&format!(
            "🔍 Keyword overlap:    {:>6.2} / 30  (similarity {:.2}%)\n",
            report.scores.keyword_component, report.keyword_similarity
        ));

        if !report.matched_skills.is_empty() {
            output.push_str(&self.format_header("✅ Matched Skills", 3));
            let matched: Vec<&str> = report.matched_skills.iter().map(String::as_str).collect();
            output.push_str(&format!("  {}\n", self.format_skill_list(&matched, Color::Green)));
        }

        if !report.missing_skills.is_empty() {
            output.push_str(&self.format_header("❌ Missing Skills", 3));
            for (category, skills) in &report.missing_by_category {
                let skills: Vec<&str> = skills.iter().map(String::as_str).collect();
                output.push_str(&format!(
                    "  • {}: {}\n",
                    category.replace('_', " "),
                    self.format_skill_list(&skills, Color::Red)
                ));
            }
        }

        if let Some(advice) = &report.advice {
            output.push_str(&self.format_header("💡 Career Advice", 2));
            output.push_str(advice.text.trim());
            output.push('\n');
        }

        if self.detailed {
            output.push_str(&self.format_header("🔬 Skill Matches", 3));
            if report.skill_matches.is_empty() {
                output.push_str("  (no pairwise comparison: one side has no skills)\n");
            }
            for skill_match in &report.skill_matches {
                let marker = if skill_match.matched {
                    self.colorize("✓", Color::Green)
                } else {
                    self.colorize("✗", Color::Red)
                };
                output.push_str(&format!(
                    "  {} {:<24} → {:<24} {:.3}\n",
                    marker, skill_match.jd_skill, skill_match.best_resume_skill, skill_match.similarity
                ));
            }

            let extra = report.extra_skills();
            if !extra.is_empty() {
                output.push_str(&self.format_header("➕ Additional Resume Skills", 3));
                output.push_str(&format!("  {}\n", self.format_skill_list(&extra, Color::Blue)));
            }

            if let Some(advice) = &report.advice {
                output.push_str(&format!(
                    "Advice model: {} | {} tokens in {}ms\n",
                    advice.model_used, advice.token_count, advice.processing_time_ms
                ));
            }

            output.push_str(&self.format_header("Metadata", 3));
            output.push_str(&format!("Resume: {}\n", report.metadata.resume_file));
            output.push_str(&format!("Job: {}\n", report.metadata.job_file));
            output.push_str(&format!(
                "Embedding model: {} | Vocabulary: {} skills | Version: {}\n",
                report.metadata.embedding_model, report.metadata.vocabulary_size, report.metadata.aligner_version
            ));
        }

        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &AlignmentReport) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(report)?)
        } else {
            Ok(serde_json::to_string(report)?)
        }
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

impl MarkdownFormatter {
    pub fn new(include_metadata: bool) -> Self {
        Self { include_metadata }
    }

    fn markdown_badge(verdict: Verdict) -> &'static str {
        match verdict {
            Verdict::Strong => "🟢",
            Verdict::Good => "🟡",
            Verdict::Partial => "🟠",
            Verdict::Weak => "🔴",
        }
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format_report(&self, report: &AlignmentReport) -> Result<String> {
        let mut output = String::new();

        output.push_str("# 📊 Skill Alignment Report\n\n");

        if self.include_metadata {
            output.push_str(&format!(
                "**Generated:** {} | **Processing Time:** {}ms\n",
                report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.metadata.processing_time_ms
            ));
            output.push_str(&format!(
                "**Resume:** `{}` | **Job:** `{}`\n\n",
                file_name(&report.metadata.resume_file),
                file_name(&report.metadata.job_file)
            ));
        }

        output.push_str("## Summary\n\n");
        output.push_str(&format!(
            "**Fit Score:** {:.2}/100 {} {}\n\n",
            report.scores.final_score,
            Self::markdown_badge(report.verdict),
            report.verdict.label()
        ));
        output.push_str(&format!("{}\n\n", report.verdict.summary()));

        output.push_str("### Score Breakdown\n\n");
        output.push_str("| Component | Points | Max |\n");
        output.push_str("|-----------|--------|-----|\n");
        output.push_str(&format!("| 🎯 Skill coverage | {:.2} | 70 |\n", report.scores.skill_component));
        output.push_str(&format!("| 🔍 Keyword overlap | {:.2} | 30 |\n", report.scores.keyword_component));
        output.push_str(&format!("| **Total** | **{:.2}** | 100 |\n\n", report.scores.final_score));

        output.push_str("## Skills\n\n");
        output.push_str(&format!(
            "{} of {} job skills found in the resume ({:.1}% coverage).\n\n",
            report.matched_skills.len(),
            report.jd_skills.len(),
            report.coverage_percentage()
        ));

        if !report.matched_skills.is_empty() {
            output.push_str("### ✅ Matched\n\n");
            for skill in &report.matched_skills {
                output.push_str(&format!("- {}\n", skill));
            }
            output.push('\n');
        }

        if !report.missing_skills.is_empty() {
            output.push_str("### ❌ Missing\n\n");
            for (category, skills) in &report.missing_by_category {
                output.push_str(&format!("- **{}**: {}\n", category.replace('_', " "), skills.join(", ")));
            }
            output.push('\n');
        }

        if !report.skill_matches.is_empty() {
            output.push_str("### Closest Resume Skill per Job Skill\n\n");
            output.push_str("| Job skill | Resume skill | Similarity | Matched |\n");
            output.push_str("|-----------|--------------|------------|---------|\n");
            for skill_match in &report.skill_matches {
                output.push_str(&format!(
                    "| {} | {} | {:.3} | {} |\n",
                    skill_match.jd_skill,
                    skill_match.best_resume_skill,
                    skill_match.similarity,
                    if skill_match.matched { "✅" } else { "❌" }
                ));
            }
            output.push('\n');
        }

        if let Some(advice) = &report.advice {
            output.push_str("## 💡 Career Advice\n\n");
            output.push_str(advice.text.trim());
            output.push_str("\n\n");
            if self.include_metadata {
                output.push_str(&format!("*Generated by {} in {}ms*\n\n", advice.model_used, advice.processing_time_ms));
            }
        }

        if self.include_metadata {
            output.push_str("---\n\n");
            output.push_str(&format!(
                "*Embedding model: {} · Vocabulary: {} skills · skill-aligner v{}*\n",
                report.metadata.embedding_model, report.metadata.vocabulary_size, report.metadata.aligner_version
            ));
        }

        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}

impl ReportGenerator {
    pub fn new() -> Self {
        Self::with_options(true, false, true, true)
    }

    pub fn with_options(use_colors: bool, detailed: bool, pretty_json: bool, include_metadata: bool) -> Self {
        Self::from_formatters(vec![
            Box::new(ConsoleFormatter::new(use_colors, detailed)),
            Box::new(JsonFormatter::new(pretty_json)),
            Box::new(MarkdownFormatter::new(include_metadata)),
        ])
    }

    /// The first formatter supporting a format renders it
    pub fn from_formatters(formatters: Vec<Box<dyn OutputFormatter>>) -> Self {
        Self { formatters }
    }

    pub fn generate_report(&self, report: &AlignmentReport, format: &OutputFormat) -> Result<String> {
        self.formatters
            .iter()
            .find(|formatter| formatter.supports_format() == *format)
            .ok_or_else(|| SkillAlignerError::OutputFormatting(format!("No formatter registered for {:?}", format)))?
            .format_report(report)
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub fn save_report_to_file(content: &str, file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file_path, content)?;
    Ok(())
}

pub fn suggest_filename(format: &OutputFormat, resume_name: &str, timestamp: bool) -> String {
    let base_name = Path::new(resume_name)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();

    let timestamp_suffix = if timestamp {
        format!("_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"))
    } else {
        String::new()
    };

    let extension = match format {
        OutputFormat::Console => "txt",
        OutputFormat::Json => "json",
        OutputFormat::Markdown => "md",
    };
    format!("{}_skills{}.{}", base_name, timestamp_suffix, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::advisor::CareerAdvice;
    use crate::output::report::tests::sample_report;
    use tempfile::TempDir;

    #[test]
    fn test_console_plain() {
        let formatter = ConsoleFormatter::new(false, false);
        let output = formatter.format_report(&sample_report()).unwrap();

        assert!(output.contains("Fit Score: 59.42/100 [PARTIAL MATCH]"));
        assert!(output.contains("(2 of 3 job skills, 66.7%)"));
        assert!(!output.contains("Career Advice"));
        assert!(output.contains("python, sql"));
        assert!(output.contains("devops: docker"));
        assert!(!output.contains("Skill Matches"));
        assert!(!output.contains('\u{1b}'));
    }

    #[test]
    fn test_console_detailed() {
        let formatter = ConsoleFormatter::new(false, true);
        let output = formatter.format_report(&sample_report()).unwrap();

        assert!(output.contains("Skill Matches"));
        assert!(output.contains("docker"));
        assert!(output.contains("Additional Resume Skills"));
        assert!(output.contains("Embedding model: potion-base-8M"));
    }

    #[test]
    fn test_json_round_trip() {
        let report = sample_report();
        let compact = JsonFormatter::new(false).format_report(&report).unwrap();
        assert!(!compact.contains('\n'));

        let parsed: AlignmentReport = serde_json::from_str(&compact).unwrap();
        assert_eq!(parsed.missing_skills, report.missing_skills);
        assert_eq!(parsed.verdict, Verdict::Partial);
    }

    #[test]
    fn test_markdown() {
        let output = MarkdownFormatter::new(true).format_report(&sample_report()).unwrap();
        assert!(output.starts_with("# 📊 Skill Alignment Report"));
        assert!(output.contains("**Resume:** `resume.md`"));
        assert!(output.contains("| 🎯 Skill coverage | 46.67 | 70 |"));
        assert!(output.contains("- **devops**: docker"));
        assert!(output.contains("| docker | go | 0.120 | ❌ |"));
        assert!(output.contains("2 of 3 job skills found in the resume (66.7% coverage)."));
    }

    fn advice() -> CareerAdvice {
        CareerAdvice {
            text: "## KEY STRENGTHS\nStrong SQL.\n\n## SKILL GAPS\n| Skill | Importance | Course |\n".to_string(),
            model_used: "tinyllama".to_string(),
            token_count: 21,
            processing_time_ms: 900,
        }
    }

    #[test]
    fn test_advice_sections() {
        let report = sample_report().with_advice(advice());

        let console = ConsoleFormatter::new(false, true).format_report(&report).unwrap();
        assert!(console.contains("💡 Career Advice"));
        assert!(console.contains("## KEY STRENGTHS\nStrong SQL."));
        assert!(console.contains("Advice model: tinyllama | 21 tokens in 900ms"));

        let markdown = MarkdownFormatter::new(true).format_report(&report).unwrap();
        assert!(markdown.contains("## 💡 Career Advice\n\n## KEY STRENGTHS"));
        assert!(markdown.contains("*Generated by tinyllama in 900ms*"));

        let json = JsonFormatter::new(false).format_report(&report).unwrap();
        assert!(json.contains("\"model_used\":\"tinyllama\""));
    }

    #[test]
    fn test_generator_dispatch() {
        let generator = ReportGenerator::with_options(false, false, true, false);
        let report = sample_report();

        let json = generator.generate_report(&report, &OutputFormat::Json).unwrap();
        assert!(json.trim_start().starts_with('{'));
        let markdown = generator.generate_report(&report, &OutputFormat::Markdown).unwrap();
        assert!(!markdown.contains("**Generated:**"));
        let console = generator.generate_report(&report, &OutputFormat::Console).unwrap();
        assert!(console.contains("Fit Score"));
    }

    #[test]
    fn test_generator_without_matching_formatter() {
        let generator = ReportGenerator::from_formatters(vec![Box::new(JsonFormatter::new(false))]);
        let report = sample_report();

        assert!(generator.generate_report(&report, &OutputFormat::Json).is_ok());
        let result = generator.generate_report(&report, &OutputFormat::Markdown);
        assert!(matches!(result, Err(SkillAlignerError::OutputFormatting(_))));
    }

    #[test]
    fn test_save_report_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("out.md");
        save_report_to_file("# hi", &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# hi");
    }

    #[test]
    fn test_suggest_filename() {
        assert_eq!(suggest_filename(&OutputFormat::Json, "docs/jane_resume.pdf", false), "jane_resume_skills.json");
        assert_eq!(suggest_filename(&OutputFormat::Markdown, "cv.md", false), "cv_skills.md");
        assert!(suggest_filename(&OutputFormat::Console, "cv.txt", true).starts_with("cv_skills_"));
    }
}
