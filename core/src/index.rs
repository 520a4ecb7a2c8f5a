use crate::config::{validate_k, validate_ngram_range, Config, NormalizerConfig, VectorizerConfig};
use crate::corpus::{CorpusProvider, RawDocument};
use crate::error::{Error, Result};
use crate::tokenizer::Normalizer;
use crate::vectorizer::{vectorize_with, DocumentVector};
use crate::vocabulary::{self, IdfTable, TermId, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type DocId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Text as supplied by the corpus, kept for snippets.
    pub raw_text: String,
    pub timestamp: Option<String>,
    pub normalized_tokens: Vec<String>,
}

/// Settings that must be identical for documents and queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub normalizer: NormalizerConfig,
    pub vectorizer: VectorizerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocId,
    pub weight: f32, // normalized tf-idf weight
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexStats {
    pub num_docs: usize,
    pub num_terms: usize,
    pub empty_vectors: usize,
}

/// A stored document paired with its cosine similarity to a query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    /// Insertion position of the document in the index.
    pub position: usize,
    pub document: &'a Document,
    pub similarity: f32,
}

/// Immutable retrieval index. `Index::default()` is the unbuilt state; the
/// only way to get a queryable index is a successful [`Index::build`] or a
/// successful deserialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Index {
    settings: IndexSettings,
    vocabulary: Vocabulary,
    idf: IdfTable,
    documents: Vec<Document>,
    vectors: Vec<DocumentVector>,
    // derived: per-column postings sorted by doc_id, and external id lookup
    postings: Vec<Vec<Posting>>,
    positions: HashMap<String, usize>,
}

impl Index {
    pub fn new() -> Self { Self::default() }

    /// One-shot build over the whole corpus. Nothing is observable unless
    /// every step succeeds.
    pub fn build(records: &[RawDocument], config: &Config) -> Result<Index> {
        config.validate()?;
        let normalizer = Normalizer::new(config.normalizer.clone());

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut documents: Vec<Document> = Vec::with_capacity(records.len());
        for record in records {
            if !seen_ids.insert(record.id.as_str()) {
                return Err(Error::DuplicateDocument(record.id.clone()));
            }
            let text = if config.corpus.index_title {
                format!("{} {}", record.title, record.raw_text)
            } else {
                record.raw_text.clone()
            };
            if text.chars().count() < config.corpus.min_text_chars {
                tracing::debug!(id = %record.id, "skipping short document");
                continue;
            }
            documents.push(Document {
                id: record.id.clone(),
                title: record.title.clone(),
                url: record.url.clone(),
                raw_text: record.raw_text.clone(),
                timestamp: record.timestamp.clone(),
                normalized_tokens: normalizer.normalize(&text),
            });
        }

        let (vocabulary, idf) =
            vocabulary::build(documents.iter().map(|d| d.normalized_tokens.as_slice()), &config.vocabulary)?;
        let vectors: Vec<DocumentVector> = documents
            .iter()
            .map(|d| vectorize_with(&d.normalized_tokens, &vocabulary, &idf, &config.vectorizer))
            .collect();

        let settings = IndexSettings { normalizer: config.normalizer.clone(), vectorizer: config.vectorizer.clone() };
        let index = Index::from_parts(settings, vocabulary, idf, documents, vectors)?;
        let stats = index.stats();
        tracing::info!(
            num_docs = stats.num_docs,
            num_terms = stats.num_terms,
            empty_vectors = stats.empty_vectors,
            skipped = records.len() - stats.num_docs,
            "index built"
        );
        Ok(index)
    }

    pub fn from_provider(provider: &dyn CorpusProvider, config: &Config) -> Result<Index> {
        let records = provider.documents()?;
        Index::build(&records, config)
    }

    /// Assemble an index from stored parts, checking every structural
    /// invariant and deriving the lookup tables.
    pub(crate) fn from_parts(
        settings: IndexSettings,
        vocabulary: Vocabulary,
        idf: IdfTable,
        documents: Vec<Document>,
        vectors: Vec<DocumentVector>,
    ) -> Result<Index> {
        if documents.is_empty() {
            return Err(Error::InsufficientCorpus("index has no documents".into()));
        }
        if vocabulary.is_empty() || !vocabulary.is_consistent() {
            return Err(Error::Corrupt("vocabulary is empty or has duplicate terms".into()));
        }
        if idf.len() != vocabulary.len() || idf.num_docs() as usize != documents.len() {
            return Err(Error::Corrupt(format!(
                "idf table ({} terms, {} docs) does not match vocabulary ({} terms, {} docs)",
                idf.len(),
                idf.num_docs(),
                vocabulary.len(),
                documents.len()
            )));
        }
        if let Some(col) = idf.weights().iter().position(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(Error::Corrupt(format!("idf weight for column {col} is not a positive finite number")));
        }
        validate_ngram_range(vocabulary.ngram_range()).map_err(|e| Error::Corrupt(e.to_string()))?;
        settings.normalizer.validate().map_err(|e| Error::Corrupt(e.to_string()))?;
        if vectors.len() != documents.len() {
            return Err(Error::Corrupt(format!("{} vectors for {} documents", vectors.len(), documents.len())));
        }
        if let Some(pos) = vectors.iter().position(|v| !v.is_well_formed(vocabulary.len())) {
            return Err(Error::Corrupt(format!("vector {pos} does not fit the vocabulary")));
        }

        let mut positions = HashMap::with_capacity(documents.len());
        for (pos, doc) in documents.iter().enumerate() {
            if positions.insert(doc.id.clone(), pos).is_some() {
                return Err(Error::DuplicateDocument(doc.id.clone()));
            }
        }

        let mut postings: Vec<Vec<Posting>> = vec![Vec::new(); vocabulary.len()];
        for (doc_id, vector) in vectors.iter().enumerate() {
            for &(column, weight) in vector.entries() {
                postings[column as usize].push(Posting { doc_id: doc_id as DocId, weight });
            }
        }

        Ok(Index { settings, vocabulary, idf, documents, vectors, postings, positions })
    }

    pub fn is_built(&self) -> bool { !self.documents.is_empty() }

    pub fn settings(&self) -> &IndexSettings { &self.settings }

    pub fn vocabulary(&self) -> &Vocabulary { &self.vocabulary }

    pub fn idf(&self) -> &IdfTable { &self.idf }

    pub fn documents(&self) -> &[Document] { &self.documents }

    pub fn vectors(&self) -> &[DocumentVector] { &self.vectors }

    pub fn document(&self, id: &str) -> Option<&Document> { self.positions.get(id).map(|&pos| &self.documents[pos]) }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            num_docs: self.documents.len(),
            num_terms: self.vocabulary.len(),
            empty_vectors: self.vectors.iter().filter(|v| v.is_empty()).count(),
        }
    }

    /// Normalize and vectorize query text exactly the way documents were.
    pub fn vectorize_query(&self, text: &str) -> Result<DocumentVector> {
        if !self.is_built() {
            return Err(Error::IndexNotBuilt);
        }
        let tokens = Normalizer::new(self.settings.normalizer.clone()).normalize(text);
        Ok(vectorize_with(&tokens, &self.vocabulary, &self.idf, &self.settings.vectorizer))
    }

    /// Top `k` documents by cosine similarity, highest first; equal scores
    /// keep insertion order.
    ///
    /// Scores are accumulated through the postings lists in ascending column
    /// order, which adds exactly the same products in the same order as the
    /// pairwise merge in [`Index::search_exhaustive`].
    pub fn search(&self, query: &DocumentVector, k: usize) -> Result<Vec<Neighbor<'_>>> {
        self.check_query(query, k)?;
        let mut scores = vec![0.0f32; self.documents.len()];
        for &(column, q_w) in query.entries() {
            for p in &self.postings[column as usize] {
                scores[p.doc_id as usize] += q_w * p.weight;
            }
        }
        Ok(self.top_k(&scores, k))
    }

    /// Brute-force baseline: one dot product per stored vector.
    pub fn search_exhaustive(&self, query: &DocumentVector, k: usize) -> Result<Vec<Neighbor<'_>>> {
        self.check_query(query, k)?;
        let scores: Vec<f32> = self.vectors.iter().map(|v| query.dot(v)).collect();
        Ok(self.top_k(&scores, k))
    }

    fn check_query(&self, query: &DocumentVector, k: usize) -> Result<()> {
        if !self.is_built() {
            return Err(Error::IndexNotBuilt);
        }
        validate_k(k)?;
        if query.dim() != self.vocabulary.len() {
            return Err(Error::InvalidConfiguration(format!(
                "query vector has dimension {} but the vocabulary has {} terms",
                query.dim(),
                self.vocabulary.len()
            )));
        }
        Ok(())
    }

    fn top_k(&self, scores: &[f32], k: usize) -> Vec<Neighbor<'_>> {
        let by_rank = |a: &(usize, f32), b: &(usize, f32)| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0));
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        if k < ranked.len() {
            ranked.select_nth_unstable_by(k - 1, by_rank);
            ranked.truncate(k);
        }
        ranked.sort_by(by_rank);
        ranked
            .into_iter()
            .map(|(position, similarity)| Neighbor { position, document: &self.documents[position], similarity })
            .collect()
    }

    /// Postings list of one vocabulary column.
    pub fn postings(&self, column: TermId) -> &[Posting] {
        self.postings.get(column as usize).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> Vec<RawDocument> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| RawDocument::new(format!("doc{i}"), format!("Doc {i}"), format!("https://forum.example/{i}"), *t))
            .collect()
    }

    #[test]
    fn unbuilt_index_refuses_search() {
        let index = Index::new();
        assert!(!index.is_built());
        let err = index.search(&DocumentVector::default(), 3).unwrap_err();
        assert!(matches!(err, Error::IndexNotBuilt));
        assert!(matches!(index.vectorize_query("anything"), Err(Error::IndexNotBuilt)));
    }

    #[test]
    fn empty_corpus_produces_no_index() {
        let err = Index::build(&[], &Config::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientCorpus(_)));
    }

    #[test]
    fn stopword_only_corpus_is_insufficient() {
        let err = Index::build(&corpus(&["the and of", "is it to"]), &Config::default()).unwrap_err();
        assert!(matches!(err, Error::InsufficientCorpus(_)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut docs = corpus(&["rust systems", "rust web"]);
        docs[1].id = docs[0].id.clone();
        let err = Index::build(&docs, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateDocument(id) if id == "doc0"));
    }

    #[test]
    fn postings_are_sorted_by_doc_id() {
        let index = Index::build(&corpus(&["rust web", "rust cli", "rust"]), &Config::default()).unwrap();
        let rust = index.vocabulary().get("rust").unwrap();
        let ids: Vec<DocId> = index.postings(rust).iter().map(|p| p.doc_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let index = Index::build(&corpus(&["apple pie", "banana", "apple pie", "apple pie"]), &Config::default()).unwrap();
        let q = index.vectorize_query("apple pie").unwrap();
        let hits = index.search(&q, 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["doc0", "doc2"]);
    }

    #[test]
    fn postings_and_exhaustive_search_agree() {
        let index = Index::build(
            &corpus(&["fever at night", "headache for three days", "stomach ache after dinner", "night sweats and fever"]),
            &Config::default(),
        )
        .unwrap();
        for q in ["fever", "night fever", "ache", "three days headache", "nothing"] {
            let v = index.vectorize_query(q).unwrap();
            let fast = index.search(&v, 4).unwrap();
            let slow = index.search_exhaustive(&v, 4).unwrap();
            let fast: Vec<(usize, u32)> = fast.iter().map(|n| (n.position, n.similarity.to_bits())).collect();
            let slow: Vec<(usize, u32)> = slow.iter().map(|n| (n.position, n.similarity.to_bits())).collect();
            assert_eq!(fast, slow, "query {q}");
        }
    }

    #[test]
    fn k_larger_than_corpus_returns_everything() {
        let index = Index::build(&corpus(&["alpha", "beta"]), &Config::default()).unwrap();
        let v = index.vectorize_query("alpha").unwrap();
        let hits = index.search(&v, 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id, "doc0");
        assert_eq!(hits[1].similarity, 0.0);
    }

    #[test]
    fn zero_k_is_invalid() {
        let index = Index::build(&corpus(&["alpha"]), &Config::default()).unwrap();
        let v = index.vectorize_query("alpha").unwrap();
        assert!(matches!(index.search(&v, 0), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn documents_without_vocabulary_terms_stay_in_the_index() {
        let mut config = Config::default();
        config.vocabulary.max_terms = 1;
        config.vocabulary.ngram_range = (1, 1);
        let index = Index::build(&corpus(&["shared one", "shared two", "lonely"]), &config).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.stats().empty_vectors, 1);
        let v = index.vectorize_query("lonely").unwrap();
        assert!(v.is_empty());
        let hits = index.search(&v, 3).unwrap();
        assert!(hits.iter().all(|h| h.similarity == 0.0));
    }

    #[test]
    fn short_documents_are_skipped_when_configured() {
        let mut config = Config::default();
        config.corpus.min_text_chars = 10;
        let index = Index::build(&corpus(&["tiny", "long enough text here"]), &config).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.document("doc0").is_none());
        assert!(index.document("doc1").is_some());
    }

    #[test]
    fn titles_are_indexed_when_configured() {
        let mut docs = corpus(&["body words"]);
        docs[0].title = "Insomnia".into();
        let mut config = Config::default();
        config.corpus.index_title = true;
        let index = Index::build(&docs, &config).unwrap();
        assert!(index.vocabulary().get("insomnia").is_some());
        assert_eq!(index.documents()[0].raw_text, "body words");
    }
}
