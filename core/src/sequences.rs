//! Random access to archived sequence records through an offset table.

use crate::{fasta, Error, Result, SeqId, SequenceRecord};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

#[derive(Debug)]
enum Archive {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl AsRef<[u8]> for Archive {
    fn as_ref(&self) -> &[u8] {
        match self {
            Archive::Owned(v) => v,
            Archive::Mapped(m) => m,
        }
    }
}

/// Resolves a [`SeqId`] to its record. `offsets` has one more entry than there
/// are records; record `i` lives in `archive[offsets[i]..offsets[i + 1]]`.
#[derive(Debug)]
pub struct SequenceStore {
    archive: Archive,
    offsets: Vec<u64>,
}

impl SequenceStore {
    pub fn from_parts(archive: Vec<u8>, offsets: Vec<u64>) -> Result<Self> {
        Self::validated(Archive::Owned(archive), offsets)
    }

    /// Memory-map an archive file. The offset table must describe that file.
    pub fn open(archive_path: &Path, offsets: Vec<u64>) -> Result<Self> {
        let file = File::open(archive_path)?;
        let archive = if file.metadata()?.len() == 0 {
            // mapping a zero-length file fails on some platforms
            Archive::Owned(Vec::new())
        } else {
            // SAFETY: index directories are replaced by rename, never rewritten in place
            Archive::Mapped(unsafe { Mmap::map(&file)? })
        };
        Self::validated(archive, offsets)
    }

    fn validated(archive: Archive, offsets: Vec<u64>) -> Result<Self> {
        let len = archive.as_ref().len() as u64;
        if offsets.first() != Some(&0) {
            return Err(Error::Corrupt("offset table must start at 0".into()));
        }
        if offsets.windows(2).any(|w| w[0] > w[1]) || offsets.last() != Some(&len) {
            return Err(Error::Corrupt(format!("offset table does not describe an archive of {len} bytes")));
        }
        Ok(Self { archive, offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn archive(&self) -> &[u8] {
        self.archive.as_ref()
    }

    /// Raw bytes of record `id`.
    pub fn record_bytes(&self, id: SeqId) -> Result<&[u8]> {
        let i = id as usize;
        if i >= self.len() {
            return Err(Error::NotFound(id));
        }
        let (start, end) = (self.offsets[i] as usize, self.offsets[i + 1] as usize);
        Ok(&self.archive.as_ref()[start..end])
    }

    pub fn resolve(&self, id: SeqId) -> Result<SequenceRecord> {
        let bytes = self.record_bytes(id)?;
        let (description, residues) = fasta::parse_record(bytes).map_err(|e| match e {
            Error::Corrupt(reason) => Error::Corrupt(format!("record {id}: {reason}")),
            other => other,
        })?;
        Ok(SequenceRecord { id, description, residues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SequenceStore {
        let mut archive = Vec::new();
        let mut offsets = vec![0];
        for (d, r) in [("first", &b"MKV"[..]), ("second", b"ACDE")] {
            fasta::write_record(&mut archive, d, r).unwrap();
            offsets.push(archive.len() as u64);
        }
        SequenceStore::from_parts(archive, offsets).unwrap()
    }

    #[test]
    fn resolves_each_record_from_its_range() {
        let s = store();
        assert_eq!(s.len(), 2);
        let rec = s.resolve(1).unwrap();
        assert_eq!(rec.description, "second");
        assert_eq!(rec.residues, b"ACDE");
        assert_eq!(s.record_bytes(0).unwrap(), b">first\nMKV\n");
    }

    #[test]
    fn garbled_record_is_corrupt() {
        let s = SequenceStore::from_parts(b"MKV\n".to_vec(), vec![0, 4]).unwrap();
        assert!(matches!(s.resolve(0), Err(Error::Corrupt(_))));
    }

    #[test]
    fn unknown_id_is_not_found() {
        assert!(matches!(store().resolve(2), Err(Error::NotFound(2))));
    }

    #[test]
    fn rejects_offsets_that_overrun_the_archive() {
        let err = SequenceStore::from_parts(b">a\nM\n".to_vec(), vec![0, 9]);
        assert!(matches!(err, Err(Error::Corrupt(_))));
        assert!(SequenceStore::from_parts(Vec::new(), vec![]).is_err());
    }
}
