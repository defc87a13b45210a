use serde::{Deserialize, Serialize};

use parimate_types::MatchingConfig;

use crate::fuzzy::{bigram_jaccard, ratio};

/// Lower-case words with punctuation stripped.
pub fn normalize_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Best window found for a phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseMatch {
    pub matched: bool,
    /// Text window that scored best.
    pub window: Option<String>,
    pub ratio: f64,
    pub jaccard: f64,
    /// Words in the searched text.
    pub words: usize,
}

/// Fuzzy phrase search over a transcript.
///
/// The transcript is scanned with a window as long as the phrase; a window
/// matches when both its edit ratio and its bigram Jaccard clear their
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhraseMatcher {
    pub fuzzy_threshold: f64,
    pub jaccard_threshold: f64,
}

impl Default for PhraseMatcher {
    fn default() -> Self {
        Self::from_config(&MatchingConfig::default())
    }
}

impl PhraseMatcher {
    pub fn from_config(config: &MatchingConfig) -> Self {
        Self {
            fuzzy_threshold: config.fuzzy_threshold,
            jaccard_threshold: config.jaccard_threshold,
        }
    }

    pub fn find(&self, text: &str, phrase: &str) -> PhraseMatch {
        let words = normalize_words(text);
        let target = normalize_words(phrase);
        let mut best = PhraseMatch {
            matched: false,
            window: None,
            ratio: 0.0,
            jaccard: 0.0,
            words: words.len(),
        };
        if target.is_empty() || words.len() < target.len() {
            return best;
        }

        let target = target.join(" ");
        let span = target.split(' ').count();
        for window in words.windows(span) {
            let candidate = window.join(" ");
            let r = ratio(&target, &candidate);
            let j = bigram_jaccard(&target, &candidate);
            let matched = r >= self.fuzzy_threshold && j >= self.jaccard_threshold;

            let better = match (matched, best.matched) {
                (true, false) => true,
                (false, true) => false,
                _ => r > best.ratio,
            };
            if better {
                best.matched = matched;
                best.window = Some(candidate);
                best.ratio = r;
                best.jaccard = j;
            }
        }
        best
    }

    pub fn matches(&self, text: &str, phrase: &str) -> bool {
        self.find(text, phrase).matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSCRIPT: &str = "Кодовое слово харизма, я начала читать новую книгу. \
        Это книга по переговорам: сначала скажите нет.";

    #[test]
    fn test_normalize_words() {
        assert_eq!(
            normalize_words("Hello, World!  It's"),
            vec!["hello", "world", "it", "s"]
        );
    }

    #[test]
    fn test_single_word_in_long_transcript() {
        let m = PhraseMatcher::default().find(TRANSCRIPT, "Харизма");
        assert!(m.matched);
        assert_eq!(m.window.as_deref(), Some("харизма"));
        assert_eq!(m.ratio, 100.0);
    }

    #[test]
    fn test_misrecognised_word_still_matches() {
        let m = PhraseMatcher::default().find("кодовое слово харезма", "харизма");
        assert!(m.matched, "{m:?}");
    }

    #[test]
    fn test_multi_word_phrase() {
        let matcher = PhraseMatcher::default();
        assert!(matcher.matches(TRANSCRIPT, "новую книгу"));
        assert!(!matcher.matches(TRANSCRIPT, "синий трактор"));
    }

    #[test]
    fn test_empty_inputs_never_match() {
        let matcher = PhraseMatcher::default();
        assert!(!matcher.matches("", "hello"));
        assert!(!matcher.matches("hello there", ""));
        assert!(!matcher.matches("hello", "hello there"));
    }
}
