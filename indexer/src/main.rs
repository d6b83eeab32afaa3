use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use minblast_core::builder::IndexBuilder;
use minblast_core::fasta::for_each_record;
use minblast_core::index::IndexStore;
use minblast_core::persist::{load_flat_index, load_meta, load_sequence_store, write_documents, write_index, IndexPaths};
use minblast_core::search::search;
use minblast_core::SketchParams;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputSeq {
    description: String,
    sequence: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect minimizer sequence indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from FASTA or JSONL files, or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// k-mer length
        #[arg(long, default_value_t = SketchParams::DEFAULT_K)]
        k: usize,
        /// Minimizer window, in k-mers
        #[arg(long, default_value_t = SketchParams::DEFAULT_W)]
        w: usize,
        /// Also write the entry table into an embedded sled database
        #[arg(long, default_value_t = false)]
        sled: bool,
    },
    /// Print index metadata and posting-list statistics
    Inspect {
        #[arg(long)]
        index: String,
    },
    /// Write one `{id, minimizers}` JSON line per sequence, for loading into a
    /// remote full-text index
    Export {
        #[arg(long)]
        index: String,
        /// Output JSONL file
        #[arg(long)]
        jsonl: String,
    },
    /// Rank candidates for one query without alignment
    Query {
        #[arg(long)]
        index: String,
        /// Query residues
        #[arg(long)]
        seq: String,
        #[arg(long, default_value_t = 0.5)]
        results_frac: f64,
        #[arg(long, default_value_t = 10)]
        min_to_check: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, k, w, sled } => build_index(&input, &output, SketchParams::new(k, w)?, sled),
        Commands::Inspect { index } => inspect(&index),
        Commands::Export { index, jsonl } => export(&index, &jsonl),
        Commands::Query { index, seq, results_frac, min_to_check, limit } => {
            query(&index, &seq, results_frac, min_to_check, limit)
        }
    }
}

fn build_index(input: &str, output: &str, params: SketchParams, with_sled: bool) -> Result<()> {
    let files = input_files(Path::new(input))?;
    if files.is_empty() {
        bail!("no .fa/.fasta/.faa/.jsonl/.json files under {input}");
    }

    let mut builder = IndexBuilder::new(params);
    for file in files {
        let before = builder.num_sequences();
        match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => ingest_jsonl(&file, &mut builder)?,
            Some("json") => ingest_json(&file, &mut builder)?,
            _ => ingest_fasta(&file, &mut builder)?,
        }
        tracing::info!(file = %file.display(), sequences = builder.num_sequences() - before, "ingested");
    }

    let (index, sequences) = builder.finish()?;
    let meta = write_index(output, &index, &sequences, params, with_sled)?;
    tracing::info!(output, num_sequences = meta.num_sequences, num_minimizers = meta.num_minimizers, "index build complete");
    Ok(())
}

fn input_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && is_sequence_file(p) {
                files.push(p.to_path_buf());
            }
        }
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }
    Ok(files)
}

fn is_sequence_file(p: &Path) -> bool {
    matches!(
        p.extension().and_then(|s| s.to_str()),
        Some("fa" | "fasta" | "faa" | "fas" | "jsonl" | "json")
    )
}

fn ingest_fasta(file: &Path, builder: &mut IndexBuilder) -> Result<()> {
    if file.metadata()?.len() == 0 {
        tracing::warn!(file = %file.display(), "skipping empty fasta file");
        return Ok(());
    }
    let reader = BufReader::new(File::open(file)?);
    for_each_record(reader, |description, residues| {
        if residues.is_empty() {
            tracing::warn!(file = %file.display(), %description, "skipping record without residues");
            return Ok(());
        }
        builder.add(&description, &residues)?;
        Ok(())
    })
    .with_context(|| format!("in {}", file.display()))
}

fn ingest_jsonl(file: &Path, builder: &mut IndexBuilder) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let rec: InputSeq = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        ingest_seq(rec, builder)?;
    }
    Ok(())
}

fn ingest_json(file: &Path, builder: &mut IndexBuilder) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                ingest_seq(serde_json::from_value(v)?, builder)?;
            }
        }
        serde_json::Value::Object(_) => ingest_seq(serde_json::from_value(json)?, builder)?,
        _ => tracing::warn!(file = %file.display(), "skipping json that is neither an object nor an array"),
    }
    Ok(())
}

fn ingest_seq(rec: InputSeq, builder: &mut IndexBuilder) -> Result<()> {
    let residues: Vec<u8> = rec.sequence.bytes().filter(|b| !b.is_ascii_whitespace()).map(|b| b.to_ascii_uppercase()).collect();
    if residues.is_empty() {
        tracing::warn!(description = %rec.description, "skipping record without residues");
        return Ok(());
    }
    builder.add(&rec.description, &residues)?;
    Ok(())
}

fn inspect(index: &str) -> Result<()> {
    let paths = IndexPaths::new(index);
    let meta = load_meta(&paths)?;
    let idx = load_flat_index(&paths)?;
    let store = load_sequence_store(&paths)?;
    let mut lengths: Vec<u32> = idx.entries().iter().map(|e| e.length).collect();
    lengths.sort_unstable();
    let median = lengths.get(lengths.len() / 2).copied().unwrap_or(0);
    let max = lengths.last().copied().unwrap_or(0);
    println!("{}", serde_json::to_string_pretty(&meta)?);
    println!("sequences: {}", store.len());
    println!("minimizers: {}", idx.size());
    println!("postings: {} (median list {median}, longest {max})", idx.postings().len());
    Ok(())
}

fn export(index: &str, jsonl: &str) -> Result<()> {
    let paths = IndexPaths::new(index);
    let params = load_meta(&paths)?.params()?;
    let store = load_sequence_store(&paths)?;
    let out = File::create(jsonl).with_context(|| format!("creating {jsonl}"))?;
    let n = write_documents(&store, params, out)?;
    tracing::info!(index, jsonl, documents = n, "export complete");
    Ok(())
}

fn query(index: &str, seq: &str, results_frac: f64, min_to_check: usize, limit: usize) -> Result<()> {
    let paths = IndexPaths::new(index);
    let params = load_meta(&paths)?.params()?;
    let idx = load_flat_index(&paths)?;
    let store = load_sequence_store(&paths)?;
    let query = seq.trim().to_ascii_uppercase();
    let out = search(query.as_bytes(), &idx, params, results_frac, min_to_check)?;
    tracing::info!(retained = out.retained, checked = out.checked, hits = out.hits.len(), "query done");
    for hit in out.hits.iter().take(limit) {
        let rec = store.resolve(hit.seq_id)?;
        println!("{}\t{}\t{}", hit.seq_id, hit.votes, rec.description);
    }
    Ok(())
}
