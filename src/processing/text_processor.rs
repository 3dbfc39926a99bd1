//! Text normalization and skill-aware tokenization

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// A run of ASCII letters, digits and the symbols that appear inside skill
/// names (`c++`, `c#`, `node.js`, `ci-cd`). Runs start on a letter or digit.
static TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9][A-Za-z0-9+#.\-]*").expect("Invalid token regex"));

/// Lowercase and replace every character that is not an ASCII letter, ASCII
/// digit or whitespace with a single space.
///
/// Accented letters and other non-ASCII symbols are stripped like punctuation,
/// so `café` becomes `caf `. Character count is preserved apart from case
/// mapping.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect()
}

/// Extract the deduplicated, lowercased token set of a text.
///
/// Trailing `.` and `-` are dropped so sentence punctuation does not stick to
/// the preceding word.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    TOKEN_REGEX
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(['.', '-']).to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Normalize then tokenize, the way the skill extractor reads documents
pub fn normalized_tokens(text: &str) -> (String, BTreeSet<String>) {
    let normalized = normalize_text(text);
    let tokens = tokenize(&normalized);
    (normalized, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_strips_punctuation() {
        assert_eq!(normalize_text("Hello, World!"), "hello  world ");
        assert_eq!(normalize_text("C++ / Node.js"), "c     node js");
    }

    #[test]
    fn test_normalize_keeps_whitespace_and_digits() {
        assert_eq!(normalize_text("Python 3\n\tSQL"), "python 3\n\tsql");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("!!!"), "   ");
    }

    #[test]
    fn test_tokenize_keeps_symbolic_skills() {
        let tokens = tokenize("C++ and C# with Node.js.");
        assert_eq!(tokens, set(&["and", "c#", "c++", "node.js", "with"]));
    }

    #[test]
    fn test_tokenize_deduplicates_case_insensitively() {
        let tokens = tokenize("Rust rust RUST, rust-lang");
        assert_eq!(tokens, set(&["rust", "rust-lang"]));
    }

    #[test]
    fn test_tokenize_degenerate_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n\t ").is_empty());
        assert!(tokenize("... --- +++").is_empty());
    }

    #[test]
    fn test_normalized_tokens_pipeline() {
        let (normalized, tokens) = normalized_tokens("Python, SQL & Docker!");
        assert_eq!(normalized, "python  sql   docker ");
        assert_eq!(tokens, set(&["docker", "python", "sql"]));
    }

    #[test]
    fn test_non_ascii_characters_are_stripped() {
        let (normalized, tokens) = normalized_tokens("Café Résumé ² naïve");
        assert_eq!(normalized, "caf  r sum    na ve");
        assert_eq!(tokens, set(&["caf", "na", "r", "sum", "ve"]));
    }

    #[test]
    fn test_tokenize_skips_non_ascii_runs() {
        assert_eq!(tokenize("Go² and Ruby"), set(&["and", "go", "ruby"]));
    }
}
