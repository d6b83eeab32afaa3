//! Local alignment used to score retrieved candidates.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alignment {
    pub aligned_query: String,
    pub aligned_target: String,
    /// Higher is better.
    pub score: i32,
}

pub trait Aligner: Send + Sync {
    fn align(&self, query: &[u8], target: &[u8]) -> Alignment;
}

const AMINO: &[u8; 23] = b"ARNDCQEGHILKMFPSTWYVBZX";

#[rustfmt::skip]
const BLOSUM62: [[i8; 23]; 23] = [
    //A  R  N  D  C  Q  E  G  H  I  L  K  M  F  P  S  T  W  Y  V  B  Z  X
    [ 4,-1,-2,-2, 0,-1,-1, 0,-2,-1,-1,-1,-1,-2,-1, 1, 0,-3,-2, 0,-2,-1, 0], // A
    [-1, 5, 0,-2,-3, 1, 0,-2, 0,-3,-2, 2,-1,-3,-2,-1,-1,-3,-2,-3,-1, 0,-1], // R
    [-2, 0, 6, 1,-3, 0, 0, 0, 1,-3,-3, 0,-2,-3,-2, 1, 0,-4,-2,-3, 3, 0,-1], // N
    [-2,-2, 1, 6,-3, 0, 2,-1,-1,-3,-4,-1,-3,-3,-1, 0,-1,-4,-3,-3, 4, 1,-1], // D
    [ 0,-3,-3,-3, 9,-3,-4,-3,-3,-1,-1,-3,-1,-2,-3,-1,-1,-2,-2,-1,-3,-3,-2], // C
    [-1, 1, 0, 0,-3, 5, 2,-2, 0,-3,-2, 1, 0,-3,-1, 0,-1,-2,-1,-2, 0, 3,-1], // Q
    [-1, 0, 0, 2,-4, 2, 5,-2, 0,-3,-3, 1,-2,-3,-1, 0,-1,-3,-2,-2, 1, 4,-1], // E
    [ 0,-2, 0,-1,-3,-2,-2, 6,-2,-4,-4,-2,-3,-3,-2, 0,-2,-2,-3,-3,-1,-2,-1], // G
    [-2, 0, 1,-1,-3, 0, 0,-2, 8,-3,-3,-1,-2,-1,-2,-1,-2,-2, 2,-3, 0, 0,-1], // H
    [-1,-3,-3,-3,-1,-3,-3,-4,-3, 4, 2,-3, 1, 0,-3,-2,-1,-3,-1, 3,-3,-3,-1], // I
    [-1,-2,-3,-4,-1,-2,-3,-4,-3, 2, 4,-2, 2, 0,-3,-2,-1,-2,-1, 1,-4,-3,-1], // L
    [-1, 2, 0,-1,-3, 1, 1,-2,-1,-3,-2, 5,-1,-3,-1, 0,-1,-3,-2,-2, 0, 1,-1], // K
    [-1,-1,-2,-3,-1, 0,-2,-3,-2, 1, 2,-1, 5, 0,-2,-1,-1,-1,-1, 1,-3,-1,-1], // M
    [-2,-3,-3,-3,-2,-3,-3,-3,-1, 0, 0,-3, 0, 6,-4,-2,-2, 1, 3,-1,-3,-3,-1], // F
    [-1,-2,-2,-1,-3,-1,-1,-2,-2,-3,-3,-1,-2,-4, 7,-1,-1,-4,-3,-2,-2,-1,-2], // P
    [ 1,-1, 1, 0,-1, 0, 0, 0,-1,-2,-2, 0,-1,-2,-1, 4, 1,-3,-2,-2, 0, 0, 0], // S
    [ 0,-1, 0,-1,-1,-1,-1,-2,-2,-1,-1,-1,-1,-2,-1, 1, 5,-2,-2, 0,-1,-1, 0], // T
    [-3,-3,-4,-4,-2,-2,-3,-2,-2,-3,-2,-3,-1, 1,-4,-3,-2,11, 2,-3,-4,-3,-2], // W
    [-2,-2,-2,-3,-2,-1,-2,-3, 2,-1,-1,-2,-1, 3,-3,-2,-2, 2, 7,-1,-3,-2,-1], // Y
    [ 0,-3,-3,-3,-1,-2,-2,-3,-3, 3, 1,-2, 1,-1,-2,-2, 0,-3,-1, 4,-3,-2,-1], // V
    [-2,-1, 3, 4,-3, 0, 1,-1, 0,-3,-4, 0,-3,-3,-2, 0,-1,-4,-3,-3, 4, 1,-1], // B
    [-1, 0, 0, 1,-3, 3, 4,-2, 0,-3,-3, 1,-1,-3,-1, 0,-1,-3,-2,-2, 1, 4,-1], // Z
    [ 0,-1,-1,-1,-2,-1,-1,-1,-1,-1,-1,-1,-1,-1,-2, 0, 0,-2,-1,-1,-1,-1,-1], // X
];

/// BLOSUM62 as a 256x256 byte lookup. `*` scores 1 against everything;
/// other bytes outside the table score -4.
#[derive(Clone)]
pub struct SubstitutionMatrix {
    scores: Box<[[i8; 256]; 256]>,
}

impl SubstitutionMatrix {
    pub fn blosum62() -> Self {
        let mut scores = Box::new([[-4i8; 256]; 256]);
        for (i, &a) in AMINO.iter().enumerate() {
            for (j, &b) in AMINO.iter().enumerate() {
                for x in [a, a.to_ascii_lowercase()] {
                    for y in [b, b.to_ascii_lowercase()] {
                        scores[x as usize][y as usize] = BLOSUM62[i][j];
                    }
                }
            }
        }
        for other in 0..256 {
            scores[b'*' as usize][other] = 1;
            scores[other][b'*' as usize] = 1;
        }
        Self { scores }
    }

    #[inline]
    pub fn score(&self, a: u8, b: u8) -> i32 {
        self.scores[a as usize][b as usize] as i32
    }
}

impl std::fmt::Debug for SubstitutionMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SubstitutionMatrix")
    }
}

/// Smith-Waterman with affine gaps: a gap of length `L` costs
/// `gap_open + (L - 1) * gap_extend`.
#[derive(Debug, Clone)]
pub struct SmithWaterman {
    pub matrix: SubstitutionMatrix,
    pub gap_open: i32,
    pub gap_extend: i32,
}

impl Default for SmithWaterman {
    fn default() -> Self {
        Self { matrix: SubstitutionMatrix::blosum62(), gap_open: 5, gap_extend: 2 }
    }
}

// traceback cell layout: low two bits pick the H source, then open flags for E and F
const FROM_STOP: u8 = 0;
const FROM_DIAG: u8 = 1;
const FROM_E: u8 = 2;
const FROM_F: u8 = 3;
const E_OPENED: u8 = 4;
const F_OPENED: u8 = 8;

#[derive(Clone, Copy)]
enum State {
    H,
    E,
    F,
}

impl Aligner for SmithWaterman {
    fn align(&self, query: &[u8], target: &[u8]) -> Alignment {
        let (n, m) = (query.len(), target.len());
        let neg = i32::MIN / 4;
        let mut h_prev = vec![0i32; m + 1];
        let mut h_cur = vec![0i32; m + 1];
        let mut f = vec![neg; m + 1];
        let mut tb = vec![0u8; (n + 1) * (m + 1)];
        let (mut best, mut best_i, mut best_j) = (0i32, 0usize, 0usize);

        for i in 1..=n {
            let mut e = neg;
            h_cur[0] = 0;
            for j in 1..=m {
                let mut cell = 0u8;
                // E: target residue against a gap in the query
                let (e_open, e_ext) = (h_cur[j - 1] - self.gap_open, e - self.gap_extend);
                if e_open >= e_ext {
                    cell |= E_OPENED;
                }
                e = e_open.max(e_ext);
                // F: query residue against a gap in the target
                let (f_open, f_ext) = (h_prev[j] - self.gap_open, f[j] - self.gap_extend);
                if f_open >= f_ext {
                    cell |= F_OPENED;
                }
                f[j] = f_open.max(f_ext);

                let diag = h_prev[j - 1] + self.matrix.score(query[i - 1], target[j - 1]);
                let (mut h, mut from) = (0, FROM_STOP);
                for (v, src) in [(diag, FROM_DIAG), (e, FROM_E), (f[j], FROM_F)] {
                    if v > h {
                        h = v;
                        from = src;
                    }
                }
                h_cur[j] = h;
                tb[i * (m + 1) + j] = cell | from;
                if h > best {
                    (best, best_i, best_j) = (h, i, j);
                }
            }
            std::mem::swap(&mut h_prev, &mut h_cur);
        }

        let (mut q_out, mut t_out) = (Vec::new(), Vec::new());
        let (mut i, mut j) = (best_i, best_j);
        let mut state = State::H;
        while i > 0 && j > 0 {
            let cell = tb[i * (m + 1) + j];
            state = match state {
                State::H => match cell & 3 {
                    FROM_DIAG => {
                        q_out.push(query[i - 1]);
                        t_out.push(target[j - 1]);
                        i -= 1;
                        j -= 1;
                        State::H
                    }
                    FROM_E => State::E,
                    FROM_F => State::F,
                    _ => break,
                },
                State::E => {
                    q_out.push(b'-');
                    t_out.push(target[j - 1]);
                    j -= 1;
                    if cell & E_OPENED != 0 { State::H } else { State::E }
                }
                State::F => {
                    q_out.push(query[i - 1]);
                    t_out.push(b'-');
                    i -= 1;
                    if cell & F_OPENED != 0 { State::H } else { State::F }
                }
            };
        }
        q_out.reverse();
        t_out.reverse();
        Alignment {
            aligned_query: String::from_utf8_lossy(&q_out).into_owned(),
            aligned_target: String::from_utf8_lossy(&t_out).into_owned(),
            score: best,
        }
    }
}
