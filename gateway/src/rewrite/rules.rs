//! Deterministic rule-based rewriting, used whenever the model is
//! unavailable.

use regex::{Captures, Regex};

// ASCII-only matching: word boundaries and case folding ignore non-ASCII
// letters, so "éhi" still contains the word "hi".
const REPLACEMENTS: [(&str, &str); 8] = [
    (r"(?i-u)can't", "cannot"),
    (r"(?i-u)won't", "will not"),
    (r"(?i-u)don't", "do not"),
    (r"(?i-u)\bhey\b", "Hello"),
    (r"(?i-u)\bhi\b", "Hello"),
    (r"(?i-u)\bthanks\b", "Thank you"),
    (r"(?i-u)\byeah\b", "yes"),
    (r"(?i-u)\bgonna\b", "going to"),
];

pub struct RuleRewriter {
    replacements: Vec<(Regex, &'static str)>,
    sentence_start: Regex,
}

impl RuleRewriter {
    pub fn new() -> Result<Self, regex::Error> {
        let replacements = REPLACEMENTS
            .iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, *replacement)))
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            replacements,
            sentence_start: Regex::new(r"(^|\. )([a-z])")?,
        })
    }

    /// Expands contractions, formalises greetings and capitalises the start
    /// of the text and of every sentence following ". ".
    pub fn rewrite(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (pattern, replacement) in &self.replacements {
            result = pattern.replace_all(&result, *replacement).into_owned();
        }

        self.sentence_start
            .replace_all(&result, |caps: &Captures| {
                format!("{}{}", &caps[1], caps[2].to_uppercase())
            })
            .into_owned()
    }
}
