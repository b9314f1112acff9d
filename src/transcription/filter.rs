//! Output cleaning and the low-information heuristic for the accuracy retry.

use regex::Regex;
use std::sync::LazyLock;

/// Bracketed or bare artifact tokens whisper.cpp emits for non-speech audio.
static ARTIFACT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[?\(?\b(BLANK_AUDIO|NOISE|MUSIC|SILENCE)\b\)?\]?").unwrap()
});

static MULTI_SPACE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Strip artifact tokens and collapse resulting whitespace.
pub fn clean_output(raw: &str) -> String {
    let stripped = ARTIFACT_PATTERN.replace_all(raw, " ");
    MULTI_SPACE_PATTERN
        .replace_all(stripped.trim(), " ")
        .trim()
        .to_string()
}

/// Trimmed character count below which text is low-information.
const MIN_TRIMMED_CHARS: usize = 8;
/// Alphabetic character count below which text is low-information.
const MIN_ALPHA_CHARS: usize = 4;
/// A single dominant word accounting for more than this fraction of
/// whitespace-split tokens makes text low-information.
const REPEATED_WORD_DOMINANCE: f64 = 0.6;

/// Heuristic deciding whether `text` looks low-confidence enough to warrant
/// re-running at higher accuracy.
pub fn is_low_information(text: &str) -> bool {
    if text.trim().chars().count() < MIN_TRIMMED_CHARS {
        return true;
    }

    let alpha_count = text.chars().filter(|c| c.is_alphabetic()).count();
    if alpha_count < MIN_ALPHA_CHARS {
        return true;
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if !words.is_empty() && dominant_word_fraction(&words) > REPEATED_WORD_DOMINANCE {
        return true;
    }

    false
}

/// Fraction of tokens accounted for by the most common word, after
/// lowercasing and stripping punctuation from each token.
fn dominant_word_fraction(words: &[&str]) -> f64 {
    use std::collections::HashMap;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for w in words {
        let stripped: String = w
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        if stripped.is_empty() {
            continue;
        }
        *counts.entry(stripped).or_insert(0) += 1;
    }
    let max_count = counts.values().copied().max().unwrap_or(0);
    max_count as f64 / words.len() as f64
}

/// Coverage score used to pick between the fast-pass and retry candidates.
pub fn coverage_score(text: &str) -> f64 {
    use std::collections::HashSet;
    let distinct = text
        .split_whitespace()
        .map(|w| w.to_ascii_lowercase())
        .collect::<HashSet<_>>()
        .len() as f64;
    let total_chars = text.chars().count() as f64;
    distinct * (1.0 + total_chars / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bracketed_artifact_case_insensitive() {
        assert_eq!(clean_output("[BLANK_AUDIO]"), "");
        assert_eq!(clean_output("[blank_audio]"), "");
    }

    #[test]
    fn strips_bare_artifact_without_brackets() {
        assert_eq!(clean_output("NOISE"), "");
    }

    #[test]
    fn strips_artifact_inside_sentence_and_collapses_whitespace() {
        let cleaned = clean_output("Hello   [MUSIC]   world.");
        assert_eq!(cleaned, "Hello world.");
    }

    #[test]
    fn leaves_clean_text_untouched() {
        assert_eq!(clean_output("Hello world."), "Hello world.");
    }

    #[test]
    fn empty_input_after_cleaning_is_empty() {
        assert_eq!(clean_output("   [SILENCE]  "), "");
    }

    #[test]
    fn short_text_is_low_information() {
        assert!(is_low_information("ok"));
        assert!(is_low_information(""));
    }

    #[test]
    fn repeated_single_word_is_low_information() {
        assert!(is_low_information("the the the the the"));
    }

    #[test]
    fn varied_long_text_is_not_low_information() {
        assert!(!is_low_information(
            "The quick brown fox jumps over the lazy dog near the river"
        ));
    }

    #[test]
    fn coverage_score_prefers_more_distinct_words() {
        let short = coverage_score("the the the");
        let long = coverage_score("the quick brown fox jumps over the lazy dog");
        assert!(long > short);
    }
}
