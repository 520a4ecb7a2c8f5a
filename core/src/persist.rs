use crate::error::{Error, Result};
use crate::index::{Document, Index, IndexSettings};
use crate::vectorizer::DocumentVector;
use crate::vocabulary::{IdfTable, Vocabulary};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 4] = b"TSIX";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub num_terms: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.bin") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    fn staging(&self) -> PathBuf { self.root.join("index.bin.tmp") }
}

#[derive(Serialize)]
struct PayloadRef<'a> {
    settings: &'a IndexSettings,
    vocabulary: &'a Vocabulary,
    idf: &'a IdfTable,
    documents: &'a [Document],
    vectors: &'a [DocumentVector],
}

#[derive(Deserialize)]
struct Payload {
    settings: IndexSettings,
    vocabulary: Vocabulary,
    idf: IdfTable,
    documents: Vec<Document>,
    vectors: Vec<DocumentVector>,
}

/// Encode a built index: magic, little-endian format version, bincode payload.
pub fn serialize(index: &Index) -> Result<Vec<u8>> {
    if !index.is_built() {
        return Err(Error::IndexNotBuilt);
    }
    let payload = PayloadRef {
        settings: index.settings(),
        vocabulary: index.vocabulary(),
        idf: index.idf(),
        documents: index.documents(),
        vectors: index.vectors(),
    };
    let mut out = Vec::with_capacity(HEADER_LEN);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bincode::serialize_into(&mut out, &payload)?;
    Ok(out)
}

pub fn deserialize(bytes: &[u8]) -> Result<Index> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(Error::InvalidMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..HEADER_LEN]);
    let found = u32::from_le_bytes(version);
    if found != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion { expected: FORMAT_VERSION, found });
    }
    let p: Payload = bincode::deserialize(&bytes[HEADER_LEN..])?;
    Index::from_parts(p.settings, p.vocabulary, p.idf, p.documents, p.vectors)
}

/// Write `index.bin` (via a staging file and rename) and `meta.json`.
pub fn save_index(paths: &IndexPaths, index: &Index) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    let bytes = serialize(index)?;
    let mut f = File::create(paths.staging())?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    fs::rename(paths.staging(), paths.index())?;

    let stats = index.stats();
    let meta = MetaFile {
        num_docs: stats.num_docs as u32,
        num_terms: stats.num_terms as u32,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "".into()),
        version: FORMAT_VERSION,
    };
    save_meta(paths, &meta)?;
    tracing::info!(path = %paths.index().display(), bytes = bytes.len(), "index saved");
    Ok(meta)
}

pub fn load_index(paths: &IndexPaths) -> Result<Index> {
    let mut f = File::open(paths.index())?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    let index = deserialize(&buf)?;
    tracing::info!(path = %paths.index().display(), num_docs = index.len(), "index loaded");
    Ok(index)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}
