//! Retrieval core: turns a corpus of forum threads into an immutable tf-idf
//! index and answers free-text queries with scored, attributed results.
//!
//! ```text
//! RawDocument ─► Normalizer ─► vocabulary::build ─► vectorize ─► Index
//! query text  ─► Normalizer ─► vectorize (same vocabulary) ─► Index::search ─► QueryEngine
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod tokenizer;
pub mod vectorizer;
pub mod vocabulary;

pub use config::{Config, TermRanking};
pub use corpus::{CorpusProvider, RawDocument};
pub use error::{Error, Result};
pub use index::{DocId, Document, Index, IndexSettings, IndexStats, Neighbor, Posting};
pub use query::{QueryEngine, QueryOptions, Response, SearchResult, Source};
pub use tokenizer::Normalizer;
pub use vectorizer::DocumentVector;
pub use vocabulary::{IdfTable, TermId, Vocabulary};
