//! Offline index construction.

use crate::index::FlatIndex;
use crate::sequences::SequenceStore;
use crate::{fasta, sketch, BuildError, IndexEntry, Kmer, Result, SeqId, SketchParams};
use std::collections::BTreeMap;

/// Accumulates sequences in ingestion order, assigning dense zero-based ids.
pub struct IndexBuilder {
    params: SketchParams,
    postings: BTreeMap<Kmer, Vec<SeqId>>,
    archive: Vec<u8>,
    offsets: Vec<u64>,
    next_id: SeqId,
}

impl IndexBuilder {
    pub fn new(params: SketchParams) -> Self {
        Self { params, postings: BTreeMap::new(), archive: Vec::new(), offsets: vec![0], next_id: 0 }
    }

    /// Build both stores from an ordered collection of `(description, residues)`.
    pub fn build<I, D, R>(params: SketchParams, records: I) -> Result<(FlatIndex, SequenceStore)>
    where
        I: IntoIterator<Item = (D, R)>,
        D: AsRef<str>,
        R: AsRef<[u8]>,
    {
        let mut builder = Self::new(params);
        for (description, residues) in records {
            builder.add(description.as_ref(), residues.as_ref())?;
        }
        builder.finish()
    }

    pub fn num_sequences(&self) -> usize {
        self.next_id as usize
    }

    /// Archive one record and post its minimizers. A rejected record leaves the
    /// builder unchanged.
    pub fn add(&mut self, description: &str, residues: &[u8]) -> std::result::Result<SeqId, BuildError> {
        let index = self.next_id as usize;
        fasta::write_record(&mut self.archive, description, residues)
            .map_err(|reason| BuildError::InvalidRecord { index, reason })?;
        self.offsets.push(self.archive.len() as u64);

        let id = self.next_id;
        self.next_id += 1;
        // sketch is a set, so each minimizer posts this id at most once
        for kmer in sketch::compute(residues, self.params) {
            self.postings.entry(kmer).or_default().push(id);
        }
        Ok(id)
    }

    /// Flatten postings in kmer order and produce the read-only stores.
    pub fn finish(self) -> Result<(FlatIndex, SequenceStore)> {
        if self.next_id == 0 {
            return Err(BuildError::EmptyCollection.into());
        }
        let total: usize = self.postings.values().map(Vec::len).sum();
        let mut entries = Vec::with_capacity(self.postings.len());
        let mut flat = Vec::with_capacity(total);
        for (kmer, ids) in self.postings {
            entries.push(IndexEntry { kmer, offset: flat.len() as u64, length: ids.len() as u32 });
            flat.extend(ids);
        }
        tracing::info!(
            num_sequences = self.next_id,
            num_minimizers = entries.len(),
            num_postings = flat.len(),
            k = self.params.k,
            w = self.params.w,
            "built minimizer index"
        );
        let index = FlatIndex::new(entries, flat)?;
        let sequences = SequenceStore::from_parts(self.archive, self.offsets)?;
        Ok((index, sequences))
    }
}
