//! Entry table held in an embedded sled database, posting array in memory.

use crate::index::{check_ranges, posting_slice, IndexStore};
use crate::persist::{load_postings, IndexPaths};
use crate::{Error, IndexEntry, Result, SeqId};
use std::borrow::Cow;

pub(crate) const TREE: &str = "kmer_index_offsets";

pub struct SledIndex {
    tree: sled::Tree,
    postings: Vec<SeqId>,
    size: usize,
    _db: sled::Db,
}

impl SledIndex {
    pub fn open(paths: &IndexPaths) -> Result<Self> {
        let path = paths.sled();
        if !path.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no sled table at {}", path.display()),
            )));
        }
        let db = sled::open(&path)?;
        let tree = db.open_tree(TREE)?;
        let postings = load_postings(paths)?;

        let mut entries = Vec::with_capacity(tree.len());
        for kv in tree.iter() {
            let (k, v) = kv?;
            let (offset, length) = decode(&v)?;
            entries.push(IndexEntry { kmer: k.to_vec(), offset, length });
        }
        check_ranges(entries.iter(), &postings)?;
        tracing::info!(path = %path.display(), num_minimizers = entries.len(), "opened sled index");
        Ok(Self { size: entries.len(), tree, postings, _db: db })
    }
}

fn decode(v: &[u8]) -> Result<(u64, u32)> {
    Ok(bincode::deserialize(v)?)
}

impl IndexStore for SledIndex {
    fn lookup(&self, kmer: &[u8]) -> Result<Option<Cow<'_, [SeqId]>>> {
        let Some(v) = self.tree.get(kmer)? else { return Ok(None) };
        let (offset, length) = decode(&v)?;
        Ok(Some(Cow::Borrowed(posting_slice(&self.postings, offset, length)?)))
    }

    fn posting_len(&self, kmer: &[u8]) -> Result<Option<usize>> {
        match self.tree.get(kmer)? {
            Some(v) => Ok(Some(decode(&v)?.1 as usize)),
            None => Ok(None),
        }
    }

    fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::IndexBuilder;
    use crate::persist::write_index;
    use crate::SketchParams;

    #[test]
    fn agrees_with_flat_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("idx");
        let params = SketchParams::new(2, 2).unwrap();
        let (flat, seqs) = IndexBuilder::build(params, [("a", "MKVLAA"), ("b", "AAKVLM"), ("c", "MKWWW")]).unwrap();
        write_index(&root, &flat, &seqs, params, true).unwrap();

        let sled_idx = SledIndex::open(&IndexPaths::new(&root)).unwrap();
        assert_eq!(sled_idx.size(), flat.size());
        for e in flat.entries() {
            assert_eq!(sled_idx.lookup(&e.kmer).unwrap(), flat.lookup(&e.kmer).unwrap());
            assert_eq!(sled_idx.posting_len(&e.kmer).unwrap(), Some(e.length as usize));
        }
        assert!(sled_idx.lookup(b"ZZ").unwrap().is_none());
    }

    #[test]
    fn missing_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(SledIndex::open(&IndexPaths::new(dir.path())), Err(Error::Io(_))));
    }
}
