use crate::index::FlatIndex;
use crate::sequences::SequenceStore;
use crate::{sketch, Error, IndexEntry, Result, SeqId, SketchParams};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_sequences: u32,
    pub num_minimizers: u64,
    pub k: usize,
    pub w: usize,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn params(&self) -> Result<SketchParams> {
        SketchParams::new(self.k, self.w)
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn minimizers(&self) -> PathBuf { self.root.join("minimizers.bin") }
    pub fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    pub fn offsets(&self) -> PathBuf { self.root.join("offsets.bin") }
    pub fn archive(&self) -> PathBuf { self.root.join("sequences.fa") }
    pub fn sled(&self) -> PathBuf { self.root.join("minimizers.sled") }
}

fn save_bin<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut f, value)?;
    f.flush()?;
    Ok(())
}

fn load_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(f)?)
}

pub fn save_entries(paths: &IndexPaths, entries: &[IndexEntry]) -> Result<()> {
    save_bin(&paths.minimizers(), entries)
}

pub fn load_entries(paths: &IndexPaths) -> Result<Vec<IndexEntry>> {
    load_bin(&paths.minimizers())
}

pub fn save_postings(paths: &IndexPaths, postings: &[SeqId]) -> Result<()> {
    save_bin(&paths.postings(), postings)
}

pub fn load_postings(paths: &IndexPaths) -> Result<Vec<SeqId>> {
    load_bin(&paths.postings())
}

pub fn save_offsets(paths: &IndexPaths, offsets: &[u64]) -> Result<()> {
    save_bin(&paths.offsets(), offsets)
}

pub fn load_offsets(paths: &IndexPaths) -> Result<Vec<u64>> {
    load_bin(&paths.offsets())
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
    if meta.version != FORMAT_VERSION {
        return Err(Error::Corrupt(format!("unsupported index version {}", meta.version)));
    }
    Ok(meta)
}

/// Write the entry table into an embedded sled tree, keyed by kmer.
pub fn save_sled_entries(paths: &IndexPaths, entries: &[IndexEntry]) -> Result<()> {
    let db = sled::open(paths.sled())?;
    let tree = db.open_tree(crate::sled_index::TREE)?;
    let mut batch = sled::Batch::default();
    for e in entries {
        batch.insert(e.kmer.as_slice(), bincode::serialize(&(e.offset, e.length))?);
    }
    tree.apply_batch(batch)?;
    db.flush()?;
    Ok(())
}

/// Persist a freshly built index. Files are written to a staging directory next
/// to `root` and moved into place only once all of them are complete, so a
/// failure leaves any previous index untouched.
pub fn write_index(
    root: impl AsRef<Path>,
    index: &FlatIndex,
    sequences: &SequenceStore,
    params: SketchParams,
    with_sled: bool,
) -> Result<MetaFile> {
    let root = root.as_ref();
    let name = root
        .file_name()
        .ok_or_else(|| Error::InvalidParams(format!("index path {} has no directory name", root.display())))?
        .to_string_lossy()
        .into_owned();
    let staging = root.with_file_name(format!(".{name}.staging-{}", std::process::id()));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    create_dir_all(&staging)?;

    let meta = MetaFile {
        num_sequences: sequences.len() as u32,
        num_minimizers: index.entries().len() as u64,
        k: params.k,
        w: params.w,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
    };
    let written = write_files(&IndexPaths::new(&staging), index, sequences, &meta, with_sled);
    if let Err(e) = written {
        let _ = fs::remove_dir_all(&staging);
        return Err(e);
    }

    let retired = root.with_file_name(format!(".{name}.old-{}", std::process::id()));
    swap_into_place(&staging, root, &retired)?;
    tracing::info!(path = %root.display(), num_sequences = meta.num_sequences, num_minimizers = meta.num_minimizers, "index written");
    Ok(meta)
}

/// Move `staging` to `root`, parking any existing `root` at `retired` first.
/// If the second rename fails the previous index is moved back.
fn swap_into_place(staging: &Path, root: &Path, retired: &Path) -> Result<()> {
    if !root.exists() {
        return Ok(fs::rename(staging, root)?);
    }
    fs::rename(root, retired)?;
    if let Err(e) = fs::rename(staging, root) {
        if let Err(restore) = fs::rename(retired, root) {
            tracing::error!(path = %root.display(), retired = %retired.display(), error = %restore, "could not restore previous index");
        }
        let _ = fs::remove_dir_all(staging);
        return Err(e.into());
    }
    if let Err(e) = fs::remove_dir_all(retired) {
        tracing::warn!(path = %retired.display(), error = %e, "could not remove previous index");
    }
    Ok(())
}

fn write_files(paths: &IndexPaths, index: &FlatIndex, sequences: &SequenceStore, meta: &MetaFile, with_sled: bool) -> Result<()> {
    save_entries(paths, index.entries())?;
    save_postings(paths, index.postings())?;
    save_offsets(paths, sequences.offsets())?;
    fs::write(paths.archive(), sequences.archive())?;
    if with_sled {
        save_sled_entries(paths, index.entries())?;
    }
    // meta last: a directory without meta.json is never a loadable index
    save_meta(paths, meta)
}

pub fn load_flat_index(paths: &IndexPaths) -> Result<FlatIndex> {
    FlatIndex::new(load_entries(paths)?, load_postings(paths)?)
}

pub fn load_sequence_store(paths: &IndexPaths) -> Result<SequenceStore> {
    SequenceStore::open(&paths.archive(), load_offsets(paths)?)
}

/// One document per sequence as held by a remote full-text index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinimizerDoc {
    pub id: SeqId,
    pub minimizers: Vec<String>,
}

/// Write a [`MinimizerDoc`] per stored sequence as JSON lines, sketching each
/// sequence with `params`. Returns the number of documents written.
pub fn write_documents<W: Write>(sequences: &SequenceStore, params: SketchParams, out: W) -> Result<usize> {
    let mut out = BufWriter::new(out);
    for id in 0..sequences.len() as SeqId {
        let record = sequences.resolve(id)?;
        let minimizers = sketch::compute(&record.residues, params)
            .into_iter()
            .map(|m| String::from_utf8_lossy(&m).into_owned())
            .collect();
        serde_json::to_writer(&mut out, &MinimizerDoc { id, minimizers })?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(sequences.len())
}
