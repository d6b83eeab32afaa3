//! Candidate retrieval by minimizer voting.
//!
//! Rare minimizers are checked first and only a budgeted number of them is
//! checked at all, so this is a bounded-work heuristic rather than an exact
//! top-k. `results_frac = 1.0` checks every retained minimizer.

use crate::config::validate_results_frac;
use crate::index::IndexStore;
use crate::{sketch, Error, Kmer, Result, SeqId, SketchParams};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hit {
    pub seq_id: SeqId,
    pub votes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Sorted by descending votes, then ascending `seq_id`.
    pub hits: Vec<Hit>,
    /// Query minimizers present in the index.
    pub retained: usize,
    /// Minimizers whose postings were actually counted.
    pub checked: usize,
}

/// `max(floor(retained * results_frac), min_to_check)`, capped at `retained`.
pub fn num_to_check(retained: usize, results_frac: f64, min_to_check: usize) -> usize {
    let by_frac = (retained as f64 * results_frac).floor() as usize;
    by_frac.max(min_to_check).min(retained)
}

pub fn search(
    query: &[u8],
    index: &dyn IndexStore,
    params: SketchParams,
    results_frac: f64,
    min_to_check: usize,
) -> Result<SearchOutcome> {
    search_cancellable(query, index, params, results_frac, min_to_check, &AtomicBool::new(false))
}

/// [`search`] that gives up with [`Error::Cancelled`] once `cancel` is set.
/// The flag is checked before every index call.
pub fn search_cancellable(
    query: &[u8],
    index: &dyn IndexStore,
    params: SketchParams,
    results_frac: f64,
    min_to_check: usize,
    cancel: &AtomicBool,
) -> Result<SearchOutcome> {
    validate_results_frac(results_frac)?;
    let mins = sketch::compute(query, params);
    if mins.is_empty() {
        return Ok(SearchOutcome::default());
    }

    let mut retained: Vec<(usize, Kmer)> = Vec::with_capacity(mins.len());
    for kmer in mins {
        check_cancelled(cancel)?;
        if let Some(len) = index.posting_len(&kmer)? {
            retained.push((len, kmer));
        }
    }
    // mins iterates in kmer order, so equal lengths stay kmer-ordered
    retained.sort_by_key(|(len, _)| *len);

    let checked = num_to_check(retained.len(), results_frac, min_to_check);
    tracing::debug!(
        query_len = query.len(),
        retained = retained.len(),
        checked,
        "checking rarest minimizers"
    );

    let mut votes: HashMap<SeqId, u32> = HashMap::new();
    for (_, kmer) in &retained[..checked] {
        check_cancelled(cancel)?;
        if let Some(postings) = index.lookup(kmer)? {
            for &id in postings.iter() {
                *votes.entry(id).or_insert(0) += 1;
            }
        }
    }

    let mut hits: Vec<Hit> = votes.into_iter().map(|(seq_id, votes)| Hit { seq_id, votes }).collect();
    hits.sort_unstable_by(|a, b| b.votes.cmp(&a.votes).then(a.seq_id.cmp(&b.seq_id)));
    Ok(SearchOutcome { hits, retained: retained.len(), checked })
}

pub(crate) fn check_cancelled(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        return Err(Error::Cancelled);
    }
    Ok(())
}
