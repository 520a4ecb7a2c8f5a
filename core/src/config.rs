use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Full configuration surface. Every field has a default so a partial JSON
/// file (or none at all) is enough.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub normalizer: NormalizerConfig,
    pub vocabulary: VocabularyConfig,
    pub vectorizer: VectorizerConfig,
    pub corpus: CorpusConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Keep combining marks and compatibility-normalize (NFKC). When false,
    /// text is decomposed and marks are dropped, folding accents away.
    pub preserve_script: bool,
    /// Width, in character clusters, of the n-grams emitted for scripts
    /// written without spaces between words.
    pub char_ngram: usize,
    pub stopwords: bool,
    pub stem: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { preserve_script: true, char_ngram: 3, stopwords: true, stem: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermRanking {
    /// Number of documents containing the term.
    #[default]
    DocumentFrequency,
    /// Total occurrences across the corpus.
    CorpusFrequency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub max_terms: usize,
    pub ngram_range: (usize, usize),
    pub ranking: TermRanking,
    pub min_df: u32,
    /// Terms present in more than this share of documents are dropped.
    pub max_df_ratio: f64,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            max_terms: 5000,
            ngram_range: (1, 2),
            ranking: TermRanking::DocumentFrequency,
            min_df: 1,
            max_df_ratio: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Use `1 + ln(tf)` instead of the raw count.
    pub sublinear_tf: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Index `"{title} {raw_text}"` instead of the raw text alone.
    pub index_title: bool,
    /// Records whose indexed text is shorter than this (in chars) are skipped.
    pub min_text_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub top_k: usize,
    pub min_confidence: f32,
    /// Drop results whose similarity is exactly zero.
    pub exclude_unmatched: bool,
    pub snippet_chars: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { top_k: 5, min_confidence: 0.0, exclude_unmatched: false, snippet_chars: 300 }
    }
}

impl Config {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path)?;
        let config: Config = serde_json::from_reader(BufReader::new(f))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.normalizer.validate()?;
        self.vocabulary.validate()?;
        self.query.validate()
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.char_ngram == 0 {
            return Err(Error::invalid("char_ngram must be at least 1"));
        }
        Ok(())
    }
}

impl VocabularyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_terms == 0 {
            return Err(Error::invalid("max_terms must be greater than 0"));
        }
        validate_ngram_range(self.ngram_range)?;
        if self.min_df == 0 {
            return Err(Error::invalid("min_df must be at least 1"));
        }
        if !(self.max_df_ratio > 0.0 && self.max_df_ratio <= 1.0) {
            return Err(Error::invalid(format!("max_df_ratio {} must lie in (0, 1]", self.max_df_ratio)));
        }
        Ok(())
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<()> {
        validate_k(self.top_k)?;
        validate_min_confidence(self.min_confidence)
    }
}

/// Longest word n-gram a vocabulary may use.
pub const MAX_NGRAM: usize = 8;

pub(crate) fn validate_ngram_range((lo, hi): (usize, usize)) -> Result<()> {
    if lo == 0 || lo > hi || hi > MAX_NGRAM {
        return Err(Error::invalid(format!("ngram_range ({lo}, {hi}) must satisfy 1 <= min <= max <= {MAX_NGRAM}")));
    }
    Ok(())
}

pub(crate) fn validate_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::invalid("k must be greater than 0"));
    }
    Ok(())
}

pub(crate) fn validate_min_confidence(min_confidence: f32) -> Result<()> {
    // NaN fails the range check as well
    if !(0.0..=1.0).contains(&min_confidence) {
        return Err(Error::invalid(format!("min_confidence {min_confidence} must lie in [0, 1]")));
    }
    Ok(())
}
