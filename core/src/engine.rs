//! Query orchestration: retrieve candidates, resolve them, align them.

use crate::align::{Aligner, SmithWaterman};
use crate::config::SearchConfig;
use crate::index::IndexStore;
use crate::search::{check_cancelled, search_cancellable, Hit};
use crate::sequences::SequenceStore;
use crate::{Result, SeqId, SequenceRecord, SketchParams};
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct AlignedHit {
    pub id: SeqId,
    pub description: String,
    /// Header of the matched target; the same text as `description`.
    pub target_description: String,
    pub target_seq: String,
    pub aligned_query: String,
    pub aligned_target: String,
    pub score: i32,
    pub minimizer_matches: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    /// Candidates with at least one vote, before truncation to `max_results`.
    pub total_hits: usize,
    pub results: Vec<AlignedHit>,
}

/// Everything needed to answer a query. Built once per loaded index and shared
/// read-only between requests.
pub struct SearchEngine {
    index: Arc<dyn IndexStore>,
    sequences: Arc<SequenceStore>,
    aligner: Arc<dyn Aligner>,
    params: SketchParams,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(
        index: Arc<dyn IndexStore>,
        sequences: Arc<SequenceStore>,
        params: SketchParams,
        config: SearchConfig,
    ) -> Result<Self> {
        Self::with_aligner(index, sequences, Arc::new(SmithWaterman::default()), params, config)
    }

    pub fn with_aligner(
        index: Arc<dyn IndexStore>,
        sequences: Arc<SequenceStore>,
        aligner: Arc<dyn Aligner>,
        params: SketchParams,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { index, sequences, aligner, params, config })
    }

    pub fn params(&self) -> SketchParams {
        self.params
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn index(&self) -> &dyn IndexStore {
        self.index.as_ref()
    }

    pub fn num_sequences(&self) -> usize {
        self.sequences.len()
    }

    /// Ranked candidates without resolving or aligning them.
    pub fn candidates(&self, query: &[u8]) -> Result<Vec<Hit>> {
        self.candidates_cancellable(query, &AtomicBool::new(false))
    }

    fn candidates_cancellable(&self, query: &[u8], cancel: &AtomicBool) -> Result<Vec<Hit>> {
        let outcome = search_cancellable(
            query,
            self.index.as_ref(),
            self.params,
            self.config.results_frac,
            self.config.min_to_check,
            cancel,
        )?;
        Ok(outcome.hits)
    }

    pub fn resolve(&self, id: SeqId) -> Result<SequenceRecord> {
        self.sequences.resolve(id)
    }

    /// Top `max_results` candidates in vote order, each aligned against the query.
    pub fn query(&self, query: &[u8]) -> Result<QueryResult> {
        self.query_cancellable(query, &AtomicBool::new(false))
    }

    /// [`query`](Self::query) that stops with `Error::Cancelled` once `cancel`
    /// is set, checked between index calls and between alignments.
    pub fn query_cancellable(&self, query: &[u8], cancel: &AtomicBool) -> Result<QueryResult> {
        let hits = self.candidates_cancellable(query, cancel)?;
        let total_hits = hits.len();
        let mut results = Vec::with_capacity(total_hits.min(self.config.max_results));
        for hit in hits.into_iter().take(self.config.max_results) {
            check_cancelled(cancel)?;
            let record = self.sequences.resolve(hit.seq_id)?;
            let aln = self.aligner.align(query, &record.residues);
            results.push(AlignedHit {
                id: record.id,
                target_description: record.description.clone(),
                description: record.description,
                target_seq: String::from_utf8_lossy(&record.residues).into_owned(),
                aligned_query: aln.aligned_query,
                aligned_target: aln.aligned_target,
                score: aln.score,
                minimizer_matches: hit.votes,
            });
        }
        Ok(QueryResult { total_hits, results })
    }
}
