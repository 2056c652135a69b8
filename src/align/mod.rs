//! Sequence alignment adapter.
//!
//! The scorer only consumes column-wise residue correspondences, so every
//! aligner returns alignments as columns of residue indices into the aligned
//! chains. Any aligner can be plugged in through [`SequenceAligner`]; the
//! crate ships a Needleman-Wunsch/Gotoh aligner and a residue-number aligner.

pub mod blosum62;
mod global;

pub use global::GlobalAligner;

use crate::error::{QsError, Result};
use crate::structure::Chain;
use std::collections::HashMap;

/// One alignment column: residue indices of the first and second chain.
pub type Column = (Option<usize>, Option<usize>);

/// Pairwise alignment of two chains.
#[derive(Debug, Clone, PartialEq)]
pub struct PairAlignment {
    columns: Vec<Column>,
    identity: f64,
}

impl PairAlignment {
    /// Build an alignment from its columns, scoring identity against the
    /// one-letter codes of the aligned chains.
    pub fn from_columns(columns: Vec<Column>, a: &Chain, b: &Chain) -> Self {
        let (identical, aligned) = columns
            .iter()
            .filter_map(|col| match col {
                (Some(i), Some(j)) => Some((a.residues()[*i].olc, b.residues()[*j].olc)),
                _ => None,
            })
            .fold((0usize, 0usize), |(same, n), (x, y)| {
                (same + usize::from(x.eq_ignore_ascii_case(&y)), n + 1)
            });
        let identity = if aligned == 0 {
            0.0
        } else {
            identical as f64 / aligned as f64
        };
        Self { columns, identity }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Fraction (0-1) of identical residues among the columns where both
    /// chains have a residue.
    pub fn identity(&self) -> f64 {
        self.identity
    }

    /// Residue index pairs of all columns without gaps.
    pub fn aligned_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.columns.iter().filter_map(|col| match col {
            (Some(i), Some(j)) => Some((*i, *j)),
            _ => None,
        })
    }
}

/// Alignment of several chains; `rows[k][c]` is the residue index of chain `k`
/// in column `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipleAlignment {
    rows: Vec<Vec<Option<usize>>>,
}

impl MultipleAlignment {
    pub fn new(rows: Vec<Vec<Option<usize>>>) -> Result<Self> {
        let n_cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != n_cols) {
            return Err(QsError::AlignmentFailure(
                "Rows of a multiple alignment must have the same length".to_string(),
            ));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<Option<usize>>] {
        &self.rows
    }

    pub fn n_columns(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    /// Indices of the columns in which every chain has a residue.
    pub fn complete_columns(&self) -> Vec<usize> {
        (0..self.n_columns())
            .filter(|&c| self.rows.iter().all(|r| r[c].is_some()))
            .collect()
    }
}

/// Source of residue correspondences between chains.
pub trait SequenceAligner: Send + Sync {
    /// Globally align two chains.
    fn align(&self, a: &Chain, b: &Chain) -> Result<PairAlignment>;

    /// Align several chains into common columns. The default is a star
    /// alignment: every chain is aligned to the first one and the columns
    /// follow the residues of the first chain. Residues inserted relative to
    /// the first chain are dropped, which does not affect columns in which
    /// all chains have a residue.
    fn align_multiple(&self, chains: &[&Chain]) -> Result<MultipleAlignment> {
        let Some(master) = chains.first() else {
            return MultipleAlignment::new(vec![]);
        };
        let rows = chains
            .iter()
            .enumerate()
            .map(|(k, chain)| {
                if k == 0 {
                    return Ok((0..master.len()).map(Some).collect());
                }
                let aln = self.align(master, chain)?;
                let mut row = vec![None; master.len()];
                for (i, j) in aln.aligned_pairs() {
                    row[i] = Some(j);
                }
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;
        MultipleAlignment::new(rows)
    }
}

/// Aligns chains by matching residue numbers, for structures that share a
/// numbering scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResidueNumberAligner;

impl SequenceAligner for ResidueNumberAligner {
    fn align(&self, a: &Chain, b: &Chain) -> Result<PairAlignment> {
        let b_index: HashMap<_, _> = b
            .residues()
            .iter()
            .enumerate()
            .map(|(j, r)| (r.number, j))
            .collect();
        let mut used_b = vec![false; b.len()];
        let mut columns: Vec<Column> = a
            .residues()
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let j = b_index.get(&r.number).copied();
                if let Some(j) = j {
                    used_b[j] = true;
                }
                (Some(i), j)
            })
            .collect();
        columns.extend(
            used_b
                .iter()
                .enumerate()
                .filter(|(_, used)| !**used)
                .map(|(j, _)| (None, Some(j))),
        );
        if columns.iter().all(|c| c.0.is_none() || c.1.is_none()) {
            return Err(QsError::AlignmentFailure(format!(
                "Chains {} and {} share no residue numbers",
                a.name(),
                b.name()
            )));
        }
        Ok(PairAlignment::from_columns(columns, a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Residue, ResidueNumber};
    use crate::testing::{helix_chain, SEQ_1};

    fn renumbered(chain: &Chain, offset: isize) -> Chain {
        let residues = chain
            .residues()
            .iter()
            .map(|r| {
                Residue::new(
                    r.olc,
                    ResidueNumber::new(r.number.num + offset, None),
                    r.main_pos,
                    r.ca_pos,
                )
            })
            .collect();
        Chain::new(chain.name(), residues)
    }

    #[test]
    fn star_alignment_keeps_complete_columns() {
        let full = helix_chain("A", SEQ_1);
        let truncated = helix_chain("B", &SEQ_1[5..50]);
        let msa = GlobalAligner::default()
            .align_multiple(&[&full, &truncated, &full])
            .unwrap();
        assert_eq!(msa.rows().len(), 3);
        assert_eq!(msa.n_columns(), full.len());
        let complete = msa.complete_columns();
        assert_eq!(complete.len(), 45);
        assert_eq!(complete[0], 5);
        assert_eq!(msa.rows()[1][5], Some(0));
    }

    #[test]
    fn residue_number_alignment() {
        let a = helix_chain("A", SEQ_1);
        let b = renumbered(&helix_chain("B", SEQ_1), 10);
        let aln = ResidueNumberAligner.align(&a, &b).unwrap();
        let pairs: Vec<_> = aln.aligned_pairs().collect();
        assert_eq!(pairs.len(), SEQ_1.len() - 10);
        assert_eq!(pairs[0], (10, 0));
        assert!(aln.identity() < 0.5, "Shifted numbering should misalign");

        let far = renumbered(&b, 1000);
        assert!(matches!(
            ResidueNumberAligner.align(&a, &far),
            Err(QsError::AlignmentFailure(_))
        ));
    }

    #[test]
    fn empty_multiple_alignment() {
        let msa = GlobalAligner::default().align_multiple(&[]).unwrap();
        assert_eq!(msa.n_columns(), 0);
        assert!(msa.complete_columns().is_empty());
        let ragged = MultipleAlignment::new(vec![vec![Some(0)], vec![]]);
        assert!(ragged.is_err());
    }
}
