//! Minimizer → posting list lookup.

use crate::{posting_range, Error, IndexEntry, Result, SeqId};
use std::borrow::Cow;

/// Read-only minimizer index. Implementations never mutate after construction;
/// a rebuild produces a new value that replaces the old one wholesale.
pub trait IndexStore: Send + Sync {
    /// Posting list for `kmer`, or `None` when the minimizer is not indexed.
    fn lookup(&self, kmer: &[u8]) -> Result<Option<Cow<'_, [SeqId]>>>;

    /// Length of the posting list without materializing it.
    fn posting_len(&self, kmer: &[u8]) -> Result<Option<usize>> {
        Ok(self.lookup(kmer)?.map(|p| p.len()))
    }

    /// Number of distinct queryable minimizers.
    fn size(&self) -> usize;
}

/// Sorted entry table over one flat posting array.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    entries: Vec<IndexEntry>,
    postings: Vec<SeqId>,
}

impl FlatIndex {
    /// Validates the table invariants: entries strictly sorted by kmer and
    /// every range inside the posting array.
    pub fn new(entries: Vec<IndexEntry>, postings: Vec<SeqId>) -> Result<Self> {
        check_ranges(entries.iter(), &postings)?;
        if entries.windows(2).any(|w| w[0].kmer >= w[1].kmer) {
            return Err(Error::Corrupt("index entries are not strictly sorted by kmer".into()));
        }
        Ok(Self { entries, postings })
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn postings(&self) -> &[SeqId] {
        &self.postings
    }

    fn entry(&self, kmer: &[u8]) -> Option<&IndexEntry> {
        self.entries
            .binary_search_by(|e| e.kmer.as_slice().cmp(kmer))
            .ok()
            .map(|i| &self.entries[i])
    }
}

pub(crate) fn check_ranges<'a>(entries: impl Iterator<Item = &'a IndexEntry>, postings: &[SeqId]) -> Result<()> {
    for e in entries {
        posting_slice(postings, e.offset, e.length)?;
    }
    Ok(())
}

/// The postings an `(offset, length)` pair points at, or `Error::Corrupt`
/// when the range overflows or runs past the array.
pub(crate) fn posting_slice(postings: &[SeqId], offset: u64, length: u32) -> Result<&[SeqId]> {
    posting_range(offset, length)
        .and_then(|r| postings.get(r))
        .ok_or_else(|| {
            Error::Corrupt(format!(
                "posting range {offset}+{length} exceeds posting array of {}",
                postings.len()
            ))
        })
}

impl IndexStore for FlatIndex {
    fn lookup(&self, kmer: &[u8]) -> Result<Option<Cow<'_, [SeqId]>>> {
        match self.entry(kmer) {
            Some(e) => Ok(Some(Cow::Borrowed(posting_slice(&self.postings, e.offset, e.length)?))),
            None => Ok(None),
        }
    }

    fn posting_len(&self, kmer: &[u8]) -> Result<Option<usize>> {
        Ok(self.entry(kmer).map(|e| e.length as usize))
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}
