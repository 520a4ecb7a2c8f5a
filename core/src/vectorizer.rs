use crate::config::VectorizerConfig;
use crate::vocabulary::{ngrams, IdfTable, TermId, Vocabulary};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Sparse L2-normalized tf-idf vector. Entries are sorted by column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentVector {
    entries: Vec<(TermId, f32)>,
    /// Euclidean norm before normalization; zero for an empty vector.
    norm: f32,
    dim: u32,
}

impl DocumentVector {
    pub fn entries(&self) -> &[(TermId, f32)] { &self.entries }

    pub fn norm(&self) -> f32 { self.norm }

    /// Dimensionality, equal to the vocabulary size.
    pub fn dim(&self) -> usize { self.dim as usize }

    /// True when no vocabulary term was present. Such a vector scores zero
    /// against everything.
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, column: TermId) -> f32 {
        self.entries
            .binary_search_by_key(&column, |(c, _)| *c)
            .map(|i| self.entries[i].1)
            .unwrap_or(0.0)
    }

    /// Dot product by merging the two sorted entry lists. Products are summed
    /// in ascending column order.
    pub fn dot(&self, other: &DocumentVector) -> f32 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f32;
        while i < self.entries.len() && j < other.entries.len() {
            let (ca, wa) = self.entries[i];
            let (cb, wb) = other.entries[j];
            match ca.cmp(&cb) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    sum += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Every column is inside the vocabulary and columns strictly increase.
    pub(crate) fn is_well_formed(&self, vocab_len: usize) -> bool {
        self.dim as usize == vocab_len
            && self.entries.iter().all(|(c, w)| (*c as usize) < vocab_len && w.is_finite())
            && self.entries.windows(2).all(|w| w[0].0 < w[1].0)
    }
}

/// Map a token stream onto the vocabulary with raw term frequencies.
pub fn vectorize(tokens: &[String], vocabulary: &Vocabulary, idf: &IdfTable) -> DocumentVector {
    vectorize_with(tokens, vocabulary, idf, &VectorizerConfig::default())
}

pub fn vectorize_with(
    tokens: &[String],
    vocabulary: &Vocabulary,
    idf: &IdfTable,
    config: &VectorizerConfig,
) -> DocumentVector {
    let dim = vocabulary.len() as u32;
    let mut tf: BTreeMap<TermId, u32> = BTreeMap::new();
    for term in ngrams(tokens, vocabulary.ngram_range()) {
        if let Some(id) = vocabulary.get(&term) {
            *tf.entry(id).or_insert(0) += 1;
        }
    }
    if tf.is_empty() {
        return DocumentVector { entries: Vec::new(), norm: 0.0, dim };
    }

    let raw: Vec<(TermId, f64)> = tf
        .into_iter()
        .map(|(id, count)| {
            let tf = if config.sublinear_tf { 1.0 + (count as f64).ln() } else { count as f64 };
            (id, tf * idf.get(id) as f64)
        })
        .collect();
    let norm = raw.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    let entries = raw.into_iter().map(|(id, w)| (id, (w / norm) as f32)).collect();
    DocumentVector { entries, norm: norm as f32, dim }
}
