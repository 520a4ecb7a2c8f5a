use crate::config::{TermRanking, VocabularyConfig};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type TermId = u32;

/// Fixed term → column mapping. Columns are assigned in the order terms were
/// first seen while scanning the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "VocabularyRepr")]
pub struct Vocabulary {
    terms: Vec<String>,
    ngram_range: (usize, usize),
    #[serde(skip)]
    lookup: HashMap<String, TermId>,
}

#[derive(Deserialize)]
struct VocabularyRepr {
    terms: Vec<String>,
    ngram_range: (usize, usize),
}

impl From<VocabularyRepr> for Vocabulary {
    fn from(repr: VocabularyRepr) -> Self { Vocabulary::from_terms(repr.terms, repr.ngram_range) }
}

impl Vocabulary {
    pub(crate) fn from_terms(terms: Vec<String>, ngram_range: (usize, usize)) -> Self {
        let lookup = terms.iter().enumerate().map(|(i, t)| (t.clone(), i as TermId)).collect();
        Self { terms, ngram_range, lookup }
    }

    pub fn get(&self, term: &str) -> Option<TermId> { self.lookup.get(term).copied() }

    pub fn term(&self, id: TermId) -> Option<&str> { self.terms.get(id as usize).map(String::as_str) }

    pub fn terms(&self) -> &[String] { &self.terms }

    pub fn ngram_range(&self) -> (usize, usize) { self.ngram_range }

    pub fn len(&self) -> usize { self.terms.len() }

    pub fn is_empty(&self) -> bool { self.terms.is_empty() }

    /// False when two terms share a column, which can only happen with a
    /// hand-crafted or corrupted term list.
    pub(crate) fn is_consistent(&self) -> bool { self.lookup.len() == self.terms.len() }
}

/// Smoothed inverse document frequency per vocabulary column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdfTable {
    weights: Vec<f32>,
    num_docs: u32,
}

impl IdfTable {
    pub fn get(&self, id: TermId) -> f32 { self.weights.get(id as usize).copied().unwrap_or(0.0) }

    pub fn weights(&self) -> &[f32] { &self.weights }

    pub fn num_docs(&self) -> u32 { self.num_docs }

    pub fn len(&self) -> usize { self.weights.len() }

    pub fn is_empty(&self) -> bool { self.weights.is_empty() }
}

/// `ln((1 + N) / (1 + df)) + 1`, always strictly positive.
pub fn smoothed_idf(num_docs: u32, df: u32) -> f32 {
    (((1.0 + num_docs as f64) / (1.0 + df as f64)).ln() + 1.0) as f32
}

/// Enumerate n-grams position-major: at each token position, every length in
/// `range` that fits, shortest first. Tokens are joined with a single space.
pub fn ngrams(tokens: &[String], range: (usize, usize)) -> impl Iterator<Item = String> + '_ {
    let (lo, hi) = range;
    (0..tokens.len()).flat_map(move |i| {
        (lo..=hi).filter(move |n| i + n <= tokens.len()).map(move |n| tokens[i..i + n].join(" "))
    })
}

struct TermStats {
    term: String,
    df: u32,
    cf: u64,
}

/// Derive the vocabulary and IDF table from normalized documents.
pub fn build<I>(documents: I, config: &VocabularyConfig) -> Result<(Vocabulary, IdfTable)>
where
    I: IntoIterator,
    I::Item: AsRef<[String]>,
{
    config.validate()?;

    // stats are kept in first-occurrence order
    let mut num_docs: u32 = 0;
    let mut index_of: HashMap<String, usize> = HashMap::new();
    let mut stats: Vec<TermStats> = Vec::new();
    for tokens in documents {
        num_docs += 1;
        let mut seen_in_doc: HashSet<usize> = HashSet::new();
        for term in ngrams(tokens.as_ref(), config.ngram_range) {
            let idx = match index_of.get(&term) {
                Some(&idx) => idx,
                None => {
                    let idx = stats.len();
                    index_of.insert(term.clone(), idx);
                    stats.push(TermStats { term, df: 0, cf: 0 });
                    idx
                }
            };
            stats[idx].cf += 1;
            if seen_in_doc.insert(idx) {
                stats[idx].df += 1;
            }
        }
    }
    if num_docs == 0 {
        return Err(Error::InsufficientCorpus("corpus has no documents".into()));
    }
    let seen_terms = stats.len();

    let max_df = config.max_df_ratio * num_docs as f64;
    let mut candidates: Vec<usize> = (0..stats.len())
        .filter(|&i| stats[i].df >= config.min_df && (stats[i].df as f64) <= max_df)
        .collect();
    if candidates.is_empty() {
        return Err(Error::InsufficientCorpus(format!(
            "no terms survived filtering ({seen_terms} distinct terms seen in {num_docs} documents)"
        )));
    }

    let importance = |i: usize| -> u64 {
        match config.ranking {
            TermRanking::DocumentFrequency => stats[i].df as u64,
            TermRanking::CorpusFrequency => stats[i].cf,
        }
    };
    // Sort is stable and candidates start in first-occurrence order, so ties
    // keep that order.
    candidates.sort_by(|&a, &b| importance(b).cmp(&importance(a)));
    candidates.truncate(config.max_terms);
    candidates.sort_unstable();

    let mut terms = Vec::with_capacity(candidates.len());
    let mut weights = Vec::with_capacity(candidates.len());
    for i in candidates {
        weights.push(smoothed_idf(num_docs, stats[i].df));
        terms.push(std::mem::take(&mut stats[i].term));
    }
    tracing::debug!(num_docs, seen_terms, kept = terms.len(), "vocabulary built");

    Ok((Vocabulary::from_terms(terms, config.ngram_range), IdfTable { weights, num_docs }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(raw: &[&str]) -> Vec<Vec<String>> {
        raw.iter().map(|d| d.split_whitespace().map(str::to_string).collect()).collect()
    }

    #[test]
    fn enumerates_unigrams_and_bigrams_position_major() {
        let toks: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let grams: Vec<String> = ngrams(&toks, (1, 2)).collect();
        assert_eq!(grams, vec!["a", "a b", "b", "b c", "c"]);
    }

    #[test]
    fn columns_follow_first_occurrence() {
        let (vocab, idf) = build(&docs(&["x y", "y z"]), &VocabularyConfig::default()).unwrap();
        assert_eq!(vocab.terms(), &["x", "x y", "y", "y z", "z"]);
        assert_eq!(vocab.get("y"), Some(2));
        assert_eq!(idf.len(), vocab.len());
        assert_eq!(idf.num_docs(), 2);
    }

    #[test]
    fn idf_is_smoothed_and_positive() {
        let (vocab, idf) = build(&docs(&["x y", "y z"]), &VocabularyConfig::default()).unwrap();
        let y = vocab.get("y").unwrap();
        let x = vocab.get("x").unwrap();
        assert!((idf.get(y) - 1.0).abs() < 1e-6);
        let expected = ((3.0f64 / 2.0).ln() + 1.0) as f32;
        assert!((idf.get(x) - expected).abs() < 1e-6);
        assert!(idf.weights().iter().all(|w| *w > 0.0));
    }

    #[test]
    fn max_terms_keeps_most_frequent_with_stable_ties() {
        let config = VocabularyConfig { max_terms: 2, ngram_range: (1, 1), ..VocabularyConfig::default() };
        let (vocab, _) = build(&docs(&["a b c", "c b", "d c"]), &config).unwrap();
        // df: a=1 b=2 c=3 d=1
        assert_eq!(vocab.terms(), &["b", "c"]);

        let config = VocabularyConfig { max_terms: 3, ngram_range: (1, 1), ..VocabularyConfig::default() };
        let (vocab, _) = build(&docs(&["a b c", "c b", "d c"]), &config).unwrap();
        // a beats d on first occurrence
        assert_eq!(vocab.terms(), &["a", "b", "c"]);
    }

    #[test]
    fn corpus_frequency_ranking() {
        let config = VocabularyConfig {
            max_terms: 1,
            ngram_range: (1, 1),
            ranking: TermRanking::CorpusFrequency,
            ..VocabularyConfig::default()
        };
        let (vocab, _) = build(&docs(&["a a a b", "b"]), &config).unwrap();
        assert_eq!(vocab.terms(), &["a"]);
    }

    #[test]
    fn max_df_ratio_drops_ubiquitous_terms() {
        let config = VocabularyConfig { max_df_ratio: 0.5, ngram_range: (1, 1), ..VocabularyConfig::default() };
        let (vocab, _) = build(&docs(&["common a", "common b"]), &config).unwrap();
        assert_eq!(vocab.get("common"), None);
        assert!(vocab.get("a").is_some());
    }

    #[test]
    fn empty_corpus_is_insufficient() {
        let err = build(Vec::<Vec<String>>::new(), &VocabularyConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientCorpus(_)));
    }

    #[test]
    fn corpus_without_terms_is_insufficient() {
        let err = build(vec![Vec::<String>::new(), Vec::new()], &VocabularyConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientCorpus(_)));
    }

    #[test]
    fn deserialized_vocabulary_rebuilds_lookup() {
        let (vocab, _) = build(&docs(&["x y"]), &VocabularyConfig::default()).unwrap();
        let bytes = bincode::serialize(&vocab).unwrap();
        let back: Vocabulary = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, vocab);
        assert_eq!(back.get("x y"), Some(1));
    }
}
