use crate::config::{validate_k, validate_min_confidence, Config};
use crate::corpus::CorpusProvider;
use crate::error::{Error, Result};
use crate::index::{Document, Index};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_id: String,
    /// Clamped cosine similarity in `[0, 1]`.
    pub score: f32,
    /// 1-based position in the returned sequence.
    pub rank: u32,
}

/// Attributed result handed to a presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub document_id: String,
    pub title: String,
    pub url: String,
    pub content_snippet: String,
    pub confidence: f32,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub query: String,
    /// Confidence of the best source, or 0 when nothing matched.
    pub confidence: f32,
    pub sources: Vec<Source>,
}

/// Options for a single query; `None` falls back to the engine config.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryOptions {
    pub k: Option<usize>,
    pub min_confidence: Option<f32>,
}

/// Rank `query_text` against one index snapshot.
///
/// Results under `min_confidence` are dropped; an empty result is the normal
/// "nothing relevant" answer, not an error.
pub fn answer<'a>(
    index: &'a Index,
    query_text: &str,
    k: usize,
    min_confidence: f32,
    exclude_unmatched: bool,
) -> Result<Vec<(SearchResult, &'a Document)>> {
    validate_k(k)?;
    validate_min_confidence(min_confidence)?;
    let query = index.vectorize_query(query_text)?;
    let hits = index.search(&query, k)?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let confidence = hit.similarity.clamp(0.0, 1.0);
        if confidence < min_confidence || (exclude_unmatched && confidence == 0.0) {
            continue;
        }
        let rank = results.len() as u32 + 1;
        results.push((SearchResult { document_id: hit.document.id.clone(), score: confidence, rank }, hit.document));
    }
    tracing::debug!(query = query_text, k, min_confidence, hits = results.len(), "answered query");
    Ok(results)
}

/// Truncate to at most `max_chars` characters, marking the cut with `...`.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Query front end over a swappable, read-only index.
///
/// Rebuilds construct a complete new [`Index`] before swapping it in, so
/// readers holding a snapshot keep a valid index for as long as they need.
pub struct QueryEngine {
    config: Config,
    index: RwLock<Arc<Index>>,
}

impl QueryEngine {
    /// Engine in the uninitialized state.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, index: RwLock::new(Arc::new(Index::new())) })
    }

    pub fn with_index(config: Config, index: Index) -> Result<Self> {
        let engine = Self::new(config)?;
        engine.install(index)?;
        Ok(engine)
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn is_built(&self) -> bool { self.index.read().is_built() }

    /// Current index. Holding the returned `Arc` pins that version.
    pub fn snapshot(&self) -> Arc<Index> { self.index.read().clone() }

    /// Build a fresh index from `provider` and swap it in. On failure the
    /// previous index stays in place untouched.
    pub fn rebuild(&self, provider: &dyn CorpusProvider) -> Result<Arc<Index>> {
        let built = Index::from_provider(provider, &self.config)?;
        self.install(built)
    }

    pub fn install(&self, index: Index) -> Result<Arc<Index>> {
        if !index.is_built() {
            return Err(Error::IndexNotBuilt);
        }
        let index = Arc::new(index);
        let previous = std::mem::replace(&mut *self.index.write(), index.clone());
        tracing::info!(num_docs = index.len(), previous_docs = previous.len(), "index swapped in");
        Ok(index)
    }

    /// Top `k` results at or above `min_confidence`.
    pub fn answer(&self, query_text: &str, k: usize, min_confidence: f32) -> Result<Vec<SearchResult>> {
        let index = self.snapshot();
        let ranked = answer(&index, query_text, k, min_confidence, self.config.query.exclude_unmatched)?;
        Ok(ranked.into_iter().map(|(r, _)| r).collect())
    }

    /// [`QueryEngine::answer`] with the configured `top_k` and `min_confidence`.
    pub fn search(&self, query_text: &str) -> Result<Vec<SearchResult>> {
        self.answer(query_text, self.config.query.top_k, self.config.query.min_confidence)
    }

    /// Attributed sources plus overall confidence, all from one snapshot.
    pub fn respond(&self, query_text: &str, options: QueryOptions) -> Result<Response> {
        let q = &self.config.query;
        let k = options.k.unwrap_or(q.top_k);
        let min_confidence = options.min_confidence.unwrap_or(q.min_confidence);
        let index = self.snapshot();
        let ranked = answer(&index, query_text, k, min_confidence, q.exclude_unmatched)?;
        let sources: Vec<Source> = ranked
            .into_iter()
            .map(|(r, doc)| Source {
                document_id: r.document_id,
                title: doc.title.clone(),
                url: doc.url.clone(),
                content_snippet: snippet(&doc.raw_text, q.snippet_chars),
                confidence: r.score,
                rank: r.rank,
            })
            .collect();
        let confidence = sources.first().map(|s| s.confidence).unwrap_or(0.0);
        Ok(Response { query: query_text.to_string(), confidence, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::RawDocument;

    fn corpus() -> Vec<RawDocument> {
        vec![
            RawDocument::new("a", "Migraine", "https://forum.example/a", "migraine headache with nausea"),
            RawDocument::new("b", "Fever", "https://forum.example/b", "high fever at night"),
            RawDocument::new("c", "Stomach", "https://forum.example/c", "stomach pain after eating"),
        ]
    }

    #[test]
    fn uninitialized_engine_reports_not_built() {
        let engine = QueryEngine::new(Config::default()).unwrap();
        assert!(!engine.is_built());
        assert!(matches!(engine.answer("fever", 3, 0.0), Err(Error::IndexNotBuilt)));
        assert!(matches!(engine.respond("fever", QueryOptions::default()), Err(Error::IndexNotBuilt)));
    }

    #[test]
    fn ranks_are_one_based_and_scores_descend() {
        let engine = QueryEngine::new(Config::default()).unwrap();
        engine.rebuild(&corpus()).unwrap();
        let results = engine.answer("fever at night", 3, 0.0).unwrap();
        assert_eq!(results[0].document_id, "b");
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.rank as usize, i + 1);
            assert!((0.0..=1.0).contains(&r.score));
        }
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn min_confidence_filters_to_empty() {
        let engine = QueryEngine::new(Config::default()).unwrap();
        engine.rebuild(&corpus()).unwrap();
        let results = engine.answer("fever pain", 3, 0.9).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let engine = QueryEngine::new(Config::default()).unwrap();
        engine.rebuild(&corpus()).unwrap();
        assert!(matches!(engine.answer("fever", 0, 0.0), Err(Error::InvalidConfiguration(_))));
        assert!(matches!(engine.answer("fever", 3, 1.5), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn unmatched_results_can_be_excluded() {
        let mut config = Config::default();
        config.query.exclude_unmatched = true;
        let engine = QueryEngine::new(config).unwrap();
        engine.rebuild(&corpus()).unwrap();
        let results = engine.search("fever").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "b");
    }

    #[test]
    fn failed_rebuild_keeps_previous_index() {
        let engine = QueryEngine::new(Config::default()).unwrap();
        engine.rebuild(&corpus()).unwrap();
        let before = engine.snapshot();
        let err = engine.rebuild(&Vec::<RawDocument>::new()).unwrap_err();
        assert!(matches!(err, Error::InsufficientCorpus(_)));
        assert!(Arc::ptr_eq(&before, &engine.snapshot()));
        assert_eq!(engine.answer("fever", 1, 0.0).unwrap()[0].document_id, "b");
    }

    #[test]
    fn snapshots_survive_a_rebuild() {
        let engine = QueryEngine::new(Config::default()).unwrap();
        engine.rebuild(&corpus()).unwrap();
        let pinned = engine.snapshot();
        engine.rebuild(&vec![RawDocument::new("z", "Other", "u", "completely different corpus")]).unwrap();
        assert!(pinned.document("a").is_some());
        assert!(engine.snapshot().document("a").is_none());
    }

    #[test]
    fn respond_attributes_sources() {
        let mut config = Config::default();
        config.query.snippet_chars = 8;
        let engine = QueryEngine::new(config).unwrap();
        engine.rebuild(&corpus()).unwrap();
        let resp = engine.respond("migraine", QueryOptions { k: Some(2), min_confidence: None }).unwrap();
        assert_eq!(resp.sources.len(), 2);
        let top = &resp.sources[0];
        assert_eq!(top.document_id, "a");
        assert_eq!(top.title, "Migraine");
        assert_eq!(top.url, "https://forum.example/a");
        assert_eq!(top.content_snippet, "migraine...");
        assert_eq!(resp.confidence, top.confidence);
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        assert_eq!(snippet("ปวดหัวมาก", 3), "ปวด...");
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("exact", 5), "exact");
    }

    #[test]
    fn installing_an_unbuilt_index_is_refused() {
        let engine = QueryEngine::new(Config::default()).unwrap();
        assert!(matches!(engine.install(Index::new()), Err(Error::IndexNotBuilt)));
    }
}
