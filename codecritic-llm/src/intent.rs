//! Intent-match score: TF-IDF cosine similarity between the tokenized
//! prompt and the code's identifier stream.
//!
//! Reported alongside findings, never as a finding itself. Scores below
//! roughly 0.40 suggest the code does not address the request.

use codecritic_core::parse::identifier_words;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
    static ref STOPWORDS: HashSet<&'static str> = [
        "a", "an", "the", "of", "to", "and", "or", "in", "is", "it", "for", "that", "with", "by",
        "be", "as", "on", "at", "this", "eg", "ie", "each", "all", "any", "from", "into",
    ]
    .into_iter()
    .collect();
    static ref PYTHON_KEYWORDS: HashSet<&'static str> = [
        "def", "return", "if", "else", "elif", "for", "while", "in", "not", "and", "or", "pass",
        "import", "from", "as", "class", "try", "except", "finally", "raise", "with", "lambda",
        "yield", "global", "nonlocal", "del", "assert", "break", "continue", "is", "none", "true",
        "false", "print", "self",
    ]
    .into_iter()
    .collect();
}

/// Normalized word tokens of a natural-language prompt.
fn prompt_tokens(prompt: &str) -> Vec<String> {
    WORD.find_iter(prompt)
        .flat_map(|m| identifier_words(m.as_str()))
        .filter(|w| !STOPWORDS.contains(w.as_str()))
        .collect()
}

/// Normalized tokens of the code's identifier stream, keywords excluded.
fn code_identifier_tokens(code: &str) -> Vec<String> {
    WORD.find_iter(code)
        .flat_map(|m| identifier_words(m.as_str()))
        .filter(|w| !PYTHON_KEYWORDS.contains(w.as_str()) && !STOPWORDS.contains(w.as_str()))
        .collect()
}

fn term_frequencies(tokens: &[String]) -> HashMap<&str, f64> {
    let mut counts: HashMap<&str, f64> = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0.0) += 1.0;
    }
    let total = tokens.len() as f64;
    if total > 0.0 {
        for value in counts.values_mut() {
            *value /= total;
        }
    }
    counts
}

/// TF-IDF cosine over the two-document corpus `{prompt, code}`.
/// Degenerate cases: `score(p, p) == 1.0`; disjoint vocabularies score 0.0.
pub fn intent_match_score(prompt: &str, code: &str) -> f64 {
    let prompt_tokens = prompt_tokens(prompt);
    let prompt_tf = term_frequencies(&prompt_tokens);
    let code_tokens = code_identifier_tokens(code);
    let code_tf = term_frequencies(&code_tokens);
    if prompt_tf.is_empty() || code_tf.is_empty() {
        return 0.0;
    }

    // Smoothed IDF over the two documents.
    let idf = |term: &str| -> f64 {
        let df = usize::from(prompt_tf.contains_key(term)) + usize::from(code_tf.contains_key(term));
        ((1.0 + 2.0) / (1.0 + df as f64)).ln() + 1.0
    };

    let mut dot = 0.0;
    let mut prompt_norm = 0.0;
    let mut code_norm = 0.0;
    let vocabulary: HashSet<&str> = prompt_tf.keys().chain(code_tf.keys()).copied().collect();
    for term in vocabulary {
        let weight = idf(term);
        let p = prompt_tf.get(term).copied().unwrap_or(0.0) * weight;
        let c = code_tf.get(term).copied().unwrap_or(0.0) * weight;
        dot += p * c;
        prompt_norm += p * p;
        code_norm += c * c;
    }
    if prompt_norm == 0.0 || code_norm == 0.0 {
        return 0.0;
    }
    dot / (prompt_norm.sqrt() * code_norm.sqrt())
}
