//! Global pairwise alignment with affine gap penalties (Gotoh).

use super::{blosum62, Column, PairAlignment, SequenceAligner};
use crate::error::{QsError, Result};
use crate::structure::Chain;

const NEG_INF: i32 = i32::MIN / 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Match,
    GapB,
    GapA,
}

/// Needleman-Wunsch alignment with BLOSUM62 scores and affine gaps.
#[derive(Clone, Copy, Debug)]
pub struct GlobalAligner {
    /// Score of the first position of a gap
    pub gap_open: i32,
    /// Score of every further position of a gap
    pub gap_extend: i32,
}

impl Default for GlobalAligner {
    fn default() -> Self {
        Self {
            gap_open: -11,
            gap_extend: -1,
        }
    }
}

impl GlobalAligner {
    /// Align two one-letter sequences, returning the alignment columns.
    pub fn align_sequences(&self, seq_a: &str, seq_b: &str) -> Result<Vec<Column>> {
        let a: Vec<usize> = seq_a.chars().map(blosum62::index).collect();
        let b: Vec<usize> = seq_b.chars().map(blosum62::index).collect();
        if a.is_empty() || b.is_empty() {
            return Err(QsError::AlignmentFailure(
                "Cannot align an empty sequence".to_string(),
            ));
        }

        let (n, m) = (a.len(), b.len());
        let width = m + 1;
        let idx = |i: usize, j: usize| i * width + j;

        // Best scores ending in a match, a gap in `b`, or a gap in `a`
        let mut mat = vec![NEG_INF; (n + 1) * width];
        let mut gap_b = vec![NEG_INF; (n + 1) * width];
        let mut gap_a = vec![NEG_INF; (n + 1) * width];
        // Predecessor state of each cell
        let mut tb_mat = vec![State::Match; (n + 1) * width];
        let mut tb_gap_b = vec![State::GapB; (n + 1) * width];
        let mut tb_gap_a = vec![State::GapA; (n + 1) * width];

        mat[idx(0, 0)] = 0;
        for i in 1..=n {
            gap_b[idx(i, 0)] = self.gap_open + (i as i32 - 1) * self.gap_extend;
            if i == 1 {
                tb_gap_b[idx(i, 0)] = State::Match;
            }
        }
        for j in 1..=m {
            gap_a[idx(0, j)] = self.gap_open + (j as i32 - 1) * self.gap_extend;
            if j == 1 {
                tb_gap_a[idx(0, j)] = State::Match;
            }
        }

        for i in 1..=n {
            for j in 1..=m {
                let (prev, state) = best_of(
                    mat[idx(i - 1, j - 1)],
                    gap_b[idx(i - 1, j - 1)],
                    gap_a[idx(i - 1, j - 1)],
                );
                mat[idx(i, j)] = prev.saturating_add(blosum62::score(a[i - 1], b[j - 1]));
                tb_mat[idx(i, j)] = state;

                let (prev, state) = best_of(
                    mat[idx(i - 1, j)] + self.gap_open,
                    gap_b[idx(i - 1, j)] + self.gap_extend,
                    gap_a[idx(i - 1, j)] + self.gap_open,
                );
                gap_b[idx(i, j)] = prev;
                tb_gap_b[idx(i, j)] = state;

                let (prev, state) = best_of(
                    mat[idx(i, j - 1)] + self.gap_open,
                    gap_b[idx(i, j - 1)] + self.gap_open,
                    gap_a[idx(i, j - 1)] + self.gap_extend,
                );
                gap_a[idx(i, j)] = prev;
                tb_gap_a[idx(i, j)] = state;
            }
        }

        let (_, mut state) = best_of(mat[idx(n, m)], gap_b[idx(n, m)], gap_a[idx(n, m)]);
        let (mut i, mut j) = (n, m);
        let mut columns = Vec::with_capacity(n.max(m));
        while i > 0 || j > 0 {
            match state {
                State::Match => {
                    columns.push((Some(i - 1), Some(j - 1)));
                    state = tb_mat[idx(i, j)];
                    i -= 1;
                    j -= 1;
                }
                State::GapB => {
                    columns.push((Some(i - 1), None));
                    state = tb_gap_b[idx(i, j)];
                    i -= 1;
                }
                State::GapA => {
                    columns.push((None, Some(j - 1)));
                    state = tb_gap_a[idx(i, j)];
                    j -= 1;
                }
            }
        }
        columns.reverse();
        Ok(columns)
    }
}

impl SequenceAligner for GlobalAligner {
    fn align(&self, a: &Chain, b: &Chain) -> Result<PairAlignment> {
        let columns = self
            .align_sequences(&a.sequence(), &b.sequence())
            .map_err(|e| QsError::AlignmentFailure(format!("{} vs {}: {e}", a.name(), b.name())))?;
        Ok(PairAlignment::from_columns(columns, a, b))
    }
}

/// Highest of the three scores; ties prefer match, then gap in `b`.
fn best_of(m: i32, gb: i32, ga: i32) -> (i32, State) {
    if m >= gb && m >= ga {
        (m, State::Match)
    } else if gb >= ga {
        (gb, State::GapB)
    } else {
        (ga, State::GapA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{helix_chain, SEQ_1, SEQ_2};

    #[test]
    fn identical_sequences_align_without_gaps() {
        let cols = GlobalAligner::default()
            .align_sequences("MKTAYIAKQR", "MKTAYIAKQR")
            .unwrap();
        assert_eq!(cols.len(), 10);
        assert!(cols.iter().enumerate().all(|(k, c)| *c == (Some(k), Some(k))));
    }

    #[test]
    fn internal_deletion_is_a_single_gap() {
        let cols = GlobalAligner::default()
            .align_sequences("MKTAYIAKQRQISFVKSHFSRQ", "MKTAYIAKQRSHFSRQ")
            .unwrap();
        let gaps: Vec<_> = cols.iter().filter(|c| c.1.is_none()).collect();
        assert_eq!(gaps.len(), 6);
        // All gap columns are consecutive
        let first = cols.iter().position(|c| c.1.is_none()).unwrap();
        assert!(cols[first..first + 6].iter().all(|c| c.1.is_none()));
        assert_eq!(cols.len(), 22);
    }

    #[test]
    fn chain_identity() {
        let aligner = GlobalAligner::default();
        let a = helix_chain("A", SEQ_1);
        let same = aligner.align(&a, &helix_chain("B", SEQ_1)).unwrap();
        assert!((same.identity() - 1.0).abs() < 1e-12);

        let other = aligner.align(&a, &helix_chain("C", SEQ_2)).unwrap();
        assert!(other.identity() < 0.5, "Got identity {}", other.identity());

        let truncated = aligner.align(&a, &helix_chain("D", &SEQ_1[3..])).unwrap();
        assert!((truncated.identity() - 1.0).abs() < 1e-12);
        assert_eq!(truncated.aligned_pairs().count(), SEQ_1.len() - 3);
    }

    #[test]
    fn empty_sequence_fails() {
        assert!(matches!(
            GlobalAligner::default().align_sequences("", "MK"),
            Err(QsError::AlignmentFailure(_))
        ));
    }
}
