//! Query/document tokenizer for keyword matching

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Runs of two or more word characters (Unicode letters, digits, underscore)
fn word_pattern() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"\w{2,}").expect("word pattern is valid"))
}

/// Lowercase `text` and collect its distinct words of at least two characters
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    word_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}
