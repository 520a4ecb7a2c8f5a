//! Text normalization shared by indexing and querying.
//!
//! Documents and queries go through the same [`Normalizer`]; the settings
//! used at build time are stored in the index and reused for every query.

use crate::config::NormalizerConfig;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}][\p{L}\p{M}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

fn is_stopword(token: &str) -> bool { STOPWORDS.contains(token) }

/// Scripts that do not separate words with spaces. Runs in these scripts are
/// split into overlapping character n-grams instead of whole-run tokens.
fn is_unspaced(c: char) -> bool {
    matches!(c,
        '\u{0E00}'..='\u{0E7F}'   // Thai
        | '\u{0E80}'..='\u{0EFF}' // Lao
        | '\u{1000}'..='\u{109F}' // Myanmar
        | '\u{1780}'..='\u{17FF}' // Khmer
        | '\u{3040}'..='\u{309F}' // Hiragana
        | '\u{30A0}'..='\u{30FF}' // Katakana
        | '\u{3400}'..='\u{4DBF}' // CJK extension A
        | '\u{4E00}'..='\u{9FFF}' // CJK unified
    )
}

/// Split a word run into clusters: a base character followed by any
/// combining marks attached to it.
fn clusters(run: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in run.char_indices() {
        if i > start && !is_combining_mark(c) {
            out.push(&run[start..i]);
            start = i;
        }
    }
    if start < run.len() {
        out.push(&run[start..]);
    }
    out
}

fn cluster_is_unspaced(cluster: &str) -> bool {
    cluster.chars().next().map(is_unspaced).unwrap_or(false)
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self { Self { config } }

    pub fn config(&self) -> &NormalizerConfig { &self.config }

    /// Canonicalize `text` into an ordered token stream.
    pub fn normalize(&self, text: &str) -> Vec<String> {
        let folded: String = if self.config.preserve_script {
            text.nfkc().collect()
        } else {
            text.nfkd().filter(|c| !is_combining_mark(*c)).collect()
        };
        let lowered = folded.to_lowercase();
        let mut tokens = Vec::new();
        for mat in RE.find_iter(&lowered) {
            self.push_run(mat.as_str(), &mut tokens);
        }
        tokens
    }

    fn push_run(&self, run: &str, out: &mut Vec<String>) {
        let clusters = clusters(run);
        let mut start = 0;
        while start < clusters.len() {
            let unspaced = cluster_is_unspaced(clusters[start]);
            let mut end = start + 1;
            while end < clusters.len() && cluster_is_unspaced(clusters[end]) == unspaced {
                end += 1;
            }
            let segment = &clusters[start..end];
            if unspaced {
                self.push_char_ngrams(segment, out);
            } else {
                self.push_word(segment.concat(), out);
            }
            start = end;
        }
    }

    fn push_char_ngrams(&self, segment: &[&str], out: &mut Vec<String>) {
        let n = self.config.char_ngram.max(1);
        if segment.len() <= n {
            out.push(segment.concat());
            return;
        }
        out.extend(segment.windows(n).map(|w| w.concat()));
    }

    fn push_word(&self, word: String, out: &mut Vec<String>) {
        if self.config.stopwords && is_stopword(&word) {
            return;
        }
        if self.config.stem {
            out.push(STEMMER.stem(&word).into_owned());
        } else {
            out.push(word);
        }
    }
}

/// Normalize with default settings apart from script preservation.
pub fn normalize(text: &str, preserve_script: bool) -> Vec<String> {
    Normalizer::new(NormalizerConfig { preserve_script, ..NormalizerConfig::default() }).normalize(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thai_runs_become_cluster_trigrams() {
        let t = normalize("ปวดหัว", true);
        assert_eq!(t, vec!["ปวด", "วดหั", "ดหัว"]);
    }

    #[test]
    fn short_unspaced_run_is_kept_whole() {
        assert_eq!(normalize("ไข้", true), vec!["ไข้"]);
    }

    #[test]
    fn punctuation_and_whitespace_are_separators() {
        let t = normalize("  Hello,\t\tWORLD!!  (rust)  ", true);
        assert_eq!(t, vec!["hello", "world", "rust"]);
    }

    #[test]
    fn mixed_script_run_is_split_by_script() {
        let t = normalize("covidโควิด", true);
        assert_eq!(t[0], "covid");
        assert!(t[1..].iter().all(|tok| tok.chars().all(is_unspaced_or_mark)));
    }

    fn is_unspaced_or_mark(c: char) -> bool { is_unspaced(c) || is_combining_mark(c) }

    #[test]
    fn folding_strips_accents_only_when_not_preserving() {
        assert!(normalize("The café menu", false).contains(&"cafe".to_string()));
        assert!(normalize("The café menu", true).contains(&"café".to_string()));
    }

    #[test]
    fn stemming_is_opt_in() {
        let n = Normalizer::new(NormalizerConfig { stem: true, ..NormalizerConfig::default() });
        let t = n.normalize("Running, runner's run!");
        assert!(t.iter().any(|w| w == "run"));
        assert!(!normalize("Running", true).contains(&"run".to_string()));
    }
}
