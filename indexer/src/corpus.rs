use serde::Deserialize;
use sha1::{Digest, Sha1};
use threadseek_core::{CorpusProvider, RawDocument, Result};
use walkdir::WalkDir;

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// One scraped thread as written by the scraper. Older dumps carry the text
/// under `content` or `body` and have no `id`.
#[derive(Debug, Deserialize)]
struct InputDoc {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "content", alias = "body")]
    raw_text: String,
    #[serde(default)]
    timestamp: Option<String>,
    /// Set by the scraper when fetching the page failed.
    #[serde(default)]
    error: Option<String>,
}

/// Corpus read from a `.json`/`.jsonl` file or a directory of them.
pub struct JsonCorpus {
    root: PathBuf,
}

impl JsonCorpus {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = Vec::new();
        if self.root.is_dir() {
            for entry in WalkDir::new(&self.root).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
                let p = entry.path();
                if p.is_file() {
                    if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                        if matches!(ext, "json" | "jsonl") {
                            files.push(p.to_path_buf());
                        }
                    }
                }
            }
        } else if self.root.is_file() {
            files.push(self.root.clone());
        }
        files
    }
}

impl CorpusProvider for JsonCorpus {
    fn documents(&self) -> Result<Vec<RawDocument>> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut skipped = 0usize;
        for file in self.files() {
            let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                read_jsonl(&file)?
            } else {
                read_json(&file)?
            };
            for doc in docs {
                let Some(raw) = into_raw(doc) else {
                    skipped += 1;
                    continue;
                };
                // the same thread scraped twice: first record wins
                if !seen.insert(raw.id.clone()) {
                    tracing::warn!(doc = %raw.id, file = %file.display(), "skipping duplicate record");
                    skipped += 1;
                    continue;
                }
                out.push(raw);
            }
        }
        tracing::info!(root = %self.root.display(), documents = out.len(), skipped, "corpus loaded");
        Ok(out)
    }
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        docs.push(serde_json::from_str(&line)?);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => {
            arr.into_iter().map(serde_json::from_value).collect::<std::result::Result<Vec<_>, _>>()?
        }
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}

/// Id for a record with neither `id` nor `url`: sha1 of title and text, so
/// it stays the same across rebuilds.
fn content_id(title: &str, raw_text: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(raw_text.as_bytes());
    format!("sha1:{:x}", hasher.finalize())
}

fn into_raw(doc: InputDoc) -> Option<RawDocument> {
    let label = doc.id.clone().or_else(|| doc.url.clone()).unwrap_or_default();
    if let Some(err) = &doc.error {
        tracing::warn!(doc = %label, error = %err, "skipping record with scrape error");
        return None;
    }
    if doc.raw_text.trim().is_empty() {
        tracing::warn!(doc = %label, "skipping record without text");
        return None;
    }
    let url = doc.url.unwrap_or_default();
    let id = match doc.id {
        Some(id) => id,
        None if !url.is_empty() => url.clone(),
        None => content_id(&doc.title, &doc.raw_text),
    };
    Some(RawDocument { id, title: doc.title, url, raw_text: doc.raw_text, timestamp: doc.timestamp })
}
