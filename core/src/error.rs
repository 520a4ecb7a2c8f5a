use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The corpus has no documents, or no term survived vocabulary filtering.
    #[error("insufficient corpus: {0}")]
    InsufficientCorpus(String),

    /// A search was attempted before any index was built or installed.
    #[error("index has not been built")]
    IndexNotBuilt,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("duplicate document id `{0}`")]
    DuplicateDocument(String),

    #[error("invalid index file: expected TSIX magic bytes")]
    InvalidMagic,

    #[error("unsupported index format version {found} (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    /// A deserialized index violates a structural invariant.
    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error("bincode error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }
}
