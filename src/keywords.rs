//! Keyword tables for the word clouds: plain term frequencies (overall and
//! per month) and a TF-IDF ranking over unigrams and bigrams.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use stop_words::{get, LANGUAGE};

use crate::paper::Paper;

const MIN_TOKEN_LEN: usize = 3;
const TFIDF_SCALE: f64 = 100.0;

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Alphabetic}+").expect("valid word regex"));
static TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b[a-zA-Z_][a-zA-Z0-9_]+\b").expect("valid term regex"));
static STOP_WORDS: Lazy<HashSet<String>> =
    Lazy::new(|| get(LANGUAGE::English).into_iter().collect());

/// `{ "text": ..., "value": ... }`, the shape the word cloud consumes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordCount {
    pub text: String,
    pub value: u64,
}

/// Lower-cased alphabetic words longer than two characters, stop words
/// removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|mat| mat.as_str())
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(*token))
        .map(str::to_string)
        .collect()
}

pub fn term_frequencies<'a, I>(texts: I) -> HashMap<String, u64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts = HashMap::new();
    for text in texts {
        for token in tokenize(text) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts
}

/// Highest counts first; equal counts fall back to alphabetical order.
pub fn top_k(counts: HashMap<String, u64>, k: usize) -> Vec<KeywordCount> {
    let mut pairs: Vec<(String, u64)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    pairs
        .into_iter()
        .take(k)
        .map(|(text, value)| KeywordCount { text, value })
        .collect()
}

pub fn paper_keywords(papers: &[Paper], k: usize) -> Vec<KeywordCount> {
    let texts: Vec<String> = papers.iter().map(Paper::searchable_text).collect();
    top_k(term_frequencies(texts.iter().map(String::as_str)), k)
}

/// Top-K table per month from `(month, text)` pairs.
pub fn monthly_keywords<I>(entries: I, k: usize) -> BTreeMap<String, Vec<KeywordCount>>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut by_month: BTreeMap<String, HashMap<String, u64>> = BTreeMap::new();
    for (month, text) in entries {
        let counts = by_month.entry(month).or_default();
        for token in tokenize(&text) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    by_month
        .into_iter()
        .map(|(month, counts)| (month, top_k(counts, k)))
        .collect()
}

fn tfidf_tokens(text: &str) -> Vec<String> {
    TERM_RE
        .find_iter(text)
        .map(|mat| mat.as_str().to_lowercase())
        .filter(|token| !STOP_WORDS.contains(token))
        .collect()
}

fn extract_terms(text: &str) -> Vec<String> {
    let tokens = tfidf_tokens(text);
    let mut terms = Vec::with_capacity(tokens.len() * 2);
    terms.extend(tokens.iter().cloned());
    for window in tokens.windows(2) {
        if let [first, second] = window {
            terms.push(format!("{first} {second}"));
        }
    }
    terms
}

/// Rank unigrams and bigrams by TF-IDF summed over all documents.
///
/// The vocabulary is the `k` most frequent terms across the corpus. Each
/// document vector uses raw term counts times the smoothed idf
/// `ln((1 + n) / (1 + df)) + 1` and is L2-normalised before summing. Scores
/// are reported as `floor(score * 100)`.
pub fn tfidf_keywords<'a, I>(documents: I, k: usize) -> Vec<KeywordCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let docs: Vec<Vec<String>> = documents.into_iter().map(extract_terms).collect();
    if docs.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut term_counts: HashMap<&str, usize> = HashMap::new();
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for terms in &docs {
        let mut seen: HashSet<&str> = HashSet::new();
        for term in terms {
            *term_counts.entry(term.as_str()).or_insert(0) += 1;
            if seen.insert(term.as_str()) {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
            }
        }
    }

    let mut vocab: Vec<(&str, usize)> = term_counts.into_iter().collect();
    vocab.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    vocab.truncate(k);
    let index: HashMap<&str, usize> = vocab
        .iter()
        .enumerate()
        .map(|(idx, (term, _))| (*term, idx))
        .collect();

    let doc_count = docs.len() as f64;
    let idf: Vec<f64> = vocab
        .iter()
        .map(|(term, _)| {
            let df = *doc_freq.get(term).unwrap_or(&0) as f64;
            ((1.0 + doc_count) / (1.0 + df)).ln() + 1.0
        })
        .collect();

    let mut totals = vec![0.0f64; vocab.len()];
    for terms in &docs {
        let mut vector = vec![0.0f64; vocab.len()];
        for term in terms {
            if let Some(&idx) = index.get(term.as_str()) {
                vector[idx] += 1.0;
            }
        }
        for (idx, value) in vector.iter_mut().enumerate() {
            *value *= idf[idx];
        }
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (idx, value) in vector.iter().enumerate() {
                totals[idx] += value / norm;
            }
        }
    }

    let mut scored: Vec<(&str, f64)> = vocab
        .iter()
        .zip(totals)
        .map(|((term, _), score)| (*term, score))
        .collect();
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });
    scored
        .into_iter()
        .map(|(term, score)| KeywordCount {
            text: term.to_string(),
            value: (score * TFIDF_SCALE).floor() as u64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_stop_words_short_and_non_alpha() {
        let tokens = tokenize("The 3D adversarial attacks, and the REWARD hacking!");
        assert_eq!(tokens, vec!["adversarial", "attacks", "reward", "hacking"]);
    }

    #[test]
    fn tokenize_keeps_accented_words_whole() {
        assert_eq!(tokenize("Naïve Bayes régime"), vec!["naïve", "bayes", "régime"]);
    }

    #[test]
    fn monthly_tables_group_texts_by_month() {
        let tables = monthly_keywords(
            [
                ("2025-01".to_string(), "alignment benchmarks".to_string()),
                ("2025-01".to_string(), "alignment evaluation".to_string()),
                ("2025-02".to_string(), "robotics".to_string()),
            ],
            1,
        );
        assert_eq!(tables["2025-01"], vec![KeywordCount { text: "alignment".into(), value: 2 }]);
        assert_eq!(tables["2025-02"][0].text, "robotics");
    }

    #[test]
    fn top_k_breaks_ties_alphabetically() {
        let counts = HashMap::from([
            ("zeta".to_string(), 2),
            ("alpha".to_string(), 2),
            ("mid".to_string(), 5),
            ("beta".to_string(), 1),
        ]);
        let top = top_k(counts, 3);
        let texts: Vec<&str> = top.iter().map(|k| k.text.as_str()).collect();
        assert_eq!(texts, vec!["mid", "alpha", "zeta"]);
    }

    #[test]
    fn frequencies_accumulate_across_texts() {
        let counts = term_frequencies(["alignment benchmarks", "alignment evaluation"]);
        assert_eq!(counts["alignment"], 2);
        assert_eq!(counts["evaluation"], 1);
    }

    #[test]
    fn tfidf_ranks_terms_and_includes_bigrams() {
        let docs = [
            "reward hacking in reinforcement learning",
            "reward hacking detection",
            "protein structure prediction",
        ];
        let ranked = tfidf_keywords(docs, 50);
        let texts: Vec<&str> = ranked.iter().map(|k| k.text.as_str()).collect();
        assert!(texts.contains(&"reward hacking"));
        assert!(ranked.windows(2).all(|w| w[0].value >= w[1].value));
        let reward = ranked.iter().find(|k| k.text == "reward").unwrap();
        let protein = ranked.iter().find(|k| k.text == "protein").unwrap();
        assert!(reward.value > protein.value);
    }

    #[test]
    fn tfidf_vocabulary_is_capped() {
        let docs = ["alpha beta gamma delta epsilon zeta", "theta iota kappa lambda"];
        assert_eq!(tfidf_keywords(docs, 4).len(), 4);
        assert!(tfidf_keywords(Vec::<&str>::new(), 10).is_empty());
    }
}
