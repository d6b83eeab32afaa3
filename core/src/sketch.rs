//! Minimizer sketches.
//!
//! For every step `i` in `0..len - k` the k-mer starting at `i` is pushed into a
//! buffer holding at most `w + k - 1` k-mers, and the lexicographically smallest
//! k-mer in the buffer is selected. The sketch is the set of selected k-mers.

use crate::{Kmer, SketchParams};
use std::collections::{BTreeSet, VecDeque};

/// Compute the minimizer sketch of `sequence`.
///
/// Sequences with `len <= k` produce an empty sketch. Ties are resolved in
/// favour of the oldest k-mer in the buffer, although the returned set does not
/// expose which position won.
pub fn compute(sequence: &[u8], params: SketchParams) -> BTreeSet<Kmer> {
    let SketchParams { k, .. } = params;
    let mut minimizers = BTreeSet::new();
    if k == 0 || sequence.len() <= k {
        return minimizers;
    }
    let cap = params.window_len();
    let mut buffer: VecDeque<&[u8]> = VecDeque::with_capacity(cap + 1);
    for i in 0..sequence.len() - k {
        buffer.push_back(&sequence[i..i + k]);
        if buffer.len() > cap {
            buffer.pop_front();
        }
        let mut best = buffer[0];
        for &kmer in buffer.iter().skip(1) {
            if kmer < best {
                best = kmer;
            }
        }
        if !minimizers.contains(best) {
            minimizers.insert(best.to_vec());
        }
    }
    minimizers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: usize, w: usize) -> SketchParams {
        SketchParams::new(k, w).unwrap()
    }

    #[test]
    fn short_sequences_have_no_minimizers() {
        assert!(compute(b"", params(5, 10)).is_empty());
        assert!(compute(b"AAAAM", params(5, 10)).is_empty());
    }

    #[test]
    fn one_past_k_yields_single_kmer() {
        let s = compute(b"MKVLA", params(4, 3));
        assert_eq!(s.into_iter().collect::<Vec<_>>(), vec![b"MKVL".to_vec()]);
    }

    #[test]
    fn last_kmer_is_never_considered() {
        // the final k-mer "AAA" would win if the loop reached it
        let s = compute(b"ZZZAAA", params(3, 10));
        assert!(!s.contains(&b"AAA".to_vec()));
        assert!(s.contains(&b"ZAA".to_vec()));
    }

    #[test]
    fn old_kmers_leave_the_window() {
        // w + k - 1 = 2 k-mers in the buffer
        let s = compute(b"ACDEFGH", params(1, 2));
        let got: Vec<Kmer> = s.into_iter().collect();
        assert_eq!(got, vec![b"A".to_vec(), b"C".to_vec(), b"D".to_vec(), b"E".to_vec(), b"F".to_vec()]);
    }
}
