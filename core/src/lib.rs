use serde::{Deserialize, Serialize};

pub mod align;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod fasta;
pub mod index;
pub mod persist;
pub mod search;
pub mod sequences;
pub mod sketch;
pub mod sled_index;

pub use error::{BuildError, Error, Result};

pub type SeqId = u32;

/// A k-mer is compared byte-wise, so `Vec<u8>` ordering is the lexicographic order we need.
pub type Kmer = Vec<u8>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub id: SeqId,
    pub description: String,
    pub residues: Vec<u8>,
}

/// Persisted unit locating one minimizer's posting list inside the flat posting array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub kmer: Kmer,
    pub offset: u64,
    pub length: u32,
}

impl IndexEntry {
    /// Slice bounds of this entry's postings; `None` when `offset + length`
    /// does not fit in `usize`.
    pub fn range(&self) -> Option<std::ops::Range<usize>> {
        posting_range(self.offset, self.length)
    }
}

pub(crate) fn posting_range(offset: u64, length: u32) -> Option<std::ops::Range<usize>> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(length).ok()?)?;
    Some(start..end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchParams {
    pub k: usize,
    pub w: usize,
}

impl SketchParams {
    pub const DEFAULT_K: usize = 5;
    pub const DEFAULT_W: usize = 10;

    pub fn new(k: usize, w: usize) -> Result<Self> {
        if k == 0 || w == 0 {
            return Err(Error::InvalidParams(format!("k and w must be >= 1 (k={k}, w={w})")));
        }
        Ok(Self { k, w })
    }

    /// Number of k-mers kept in the sliding buffer.
    pub fn window_len(&self) -> usize {
        self.w + self.k - 1
    }
}

impl Default for SketchParams {
    fn default() -> Self {
        Self { k: Self::DEFAULT_K, w: Self::DEFAULT_W }
    }
}
