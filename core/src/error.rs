use crate::SeqId;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("cannot build an index from an empty sequence collection")]
    EmptyCollection,
    #[error("record {index} cannot be archived: {reason}")]
    InvalidRecord { index: usize, reason: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("sequence {0} not found")]
    NotFound(SeqId),
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("corrupt index: {0}")]
    Corrupt(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("fasta parse error: {0}")]
    Fasta(String),
    #[error("search cancelled")]
    Cancelled,
    #[error("remote index error: {0}")]
    Remote(String),
}

pub type Result<T> = std::result::Result<T, Error>;
