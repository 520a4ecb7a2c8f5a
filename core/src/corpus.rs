use crate::error::Result;
use serde::{Deserialize, Serialize};

/// One record handed over by whatever discovered the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub id: String,
    pub title: String,
    pub url: String,
    pub raw_text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), url: url.into(), raw_text: raw_text.into(), timestamp: None }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

/// Source of the finite, ordered record sequence an index is built from.
pub trait CorpusProvider {
    fn documents(&self) -> Result<Vec<RawDocument>>;
}

impl CorpusProvider for Vec<RawDocument> {
    fn documents(&self) -> Result<Vec<RawDocument>> { Ok(self.clone()) }
}
