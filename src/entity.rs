//! Reduced comparison entities.
//!
//! For every mapped chemical group pair, all member chains of both groups are
//! aligned into common columns. Only columns resolved in every chain are kept,
//! so chains of the same group pair end up with CA sets of identical size and
//! residue order. These sets feed every superposition in symmetry detection
//! and chain mapping.

use crate::align::SequenceAligner;
use crate::chem::ChemMapping;
use crate::error::{QsError, Result};
use crate::settings::MIN_ALIGNED_POSITIONS;
use crate::structure::{centroid, Complex};
use nalgebra::Point3;
use tracing::{debug, warn};

/// CA positions of one chain restricted to the aligned columns.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityChain {
    pub name: String,
    /// Index of the chemical group pair the chain belongs to
    pub pair_idx: usize,
    pub coords: Vec<Point3<f64>>,
}

impl EntityChain {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn center(&self) -> Point3<f64> {
        centroid(self.coords.iter())
    }
}

/// Reduced view of one complex. Chains are ordered by chemical group pair,
/// then by their order within the group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReducedEntity {
    chains: Vec<EntityChain>,
}

impl ReducedEntity {
    pub fn new(chains: Vec<EntityChain>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &[EntityChain] {
        &self.chains
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.chains.iter().position(|c| c.name == name)
    }

    pub fn chain(&self, name: &str) -> Option<&EntityChain> {
        self.chains.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.chains.iter().map(|c| c.name.as_str()).collect()
    }

    /// The chains named in `names`, in entity order.
    pub fn subset(&self, names: &[String]) -> Self {
        Self::new(
            self.chains
                .iter()
                .filter(|c| names.contains(&c.name))
                .cloned()
                .collect(),
        )
    }

    /// Number of chemical group pairs with at least one chain.
    pub fn n_pairs(&self) -> usize {
        self.chains.iter().map(|c| c.pair_idx + 1).max().unwrap_or(0)
    }

    /// Chain indices grouped by chemical group pair.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.n_pairs()];
        for (k, chain) in self.chains.iter().enumerate() {
            groups[chain.pair_idx].push(k);
        }
        groups
    }
}

/// The reduced entities of both complexes.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonEntities {
    pub a: ReducedEntity,
    pub b: ReducedEntity,
}

impl ComparisonEntities {
    /// Align every mapped group pair and keep at most `max_ca_per_chain`
    /// evenly spaced columns.
    ///
    /// Group pairs whose chains cannot be aligned are logged and left out.
    /// Fewer than [`MIN_ALIGNED_POSITIONS`] complete columns is an error.
    pub fn build(
        complex_a: &Complex,
        complex_b: &Complex,
        mapping: &ChemMapping,
        aligner: &dyn SequenceAligner,
        max_ca_per_chain: usize,
    ) -> Result<Self> {
        let mut a_chains = Vec::new();
        let mut b_chains = Vec::new();

        for (pair_idx, pair) in mapping.pairs().iter().enumerate() {
            let members_a = pair
                .group_a
                .chains()
                .iter()
                .map(|name| lookup(complex_a, name))
                .collect::<Result<Vec<_>>>()?;
            let members_b = pair
                .group_b
                .chains()
                .iter()
                .map(|name| lookup(complex_b, name))
                .collect::<Result<Vec<_>>>()?;
            let all: Vec<_> = members_a.iter().chain(members_b.iter()).copied().collect();

            let msa = match aligner.align_multiple(&all) {
                Ok(msa) => msa,
                Err(e) => {
                    warn!(
                        "Chemical groups {:?} and {:?} left out of the comparison: {e}",
                        pair.group_a.chains(),
                        pair.group_b.chains()
                    );
                    continue;
                }
            };

            let complete = msa.complete_columns();
            if complete.len() < MIN_ALIGNED_POSITIONS {
                return Err(QsError::InvalidInput(format!(
                    "Only {} aligned positions for chemical groups {:?} and {:?}; at least {MIN_ALIGNED_POSITIONS} are required",
                    complete.len(),
                    pair.group_a.chains(),
                    pair.group_b.chains()
                )));
            }
            let columns = subsample(&complete, max_ca_per_chain);
            debug!(
                "Group pair {pair_idx}: {} complete columns, {} kept",
                complete.len(),
                columns.len()
            );

            for (k, (chain, row)) in all.iter().zip(msa.rows()).enumerate() {
                let coords = columns
                    .iter()
                    .filter_map(|&c| row[c].map(|i| chain.residues()[i].ca_pos))
                    .collect();
                let entity_chain = EntityChain {
                    name: chain.name().to_string(),
                    pair_idx,
                    coords,
                };
                if k < members_a.len() {
                    a_chains.push(entity_chain);
                } else {
                    b_chains.push(entity_chain);
                }
            }
        }

        // Pair indices must stay dense after skipped pairs
        let kept: Vec<usize> = {
            let mut idx: Vec<usize> = a_chains.iter().map(|c| c.pair_idx).collect();
            idx.dedup();
            idx
        };
        for chain in a_chains.iter_mut().chain(b_chains.iter_mut()) {
            chain.pair_idx = kept.iter().position(|&p| p == chain.pair_idx).unwrap_or(0);
        }

        if a_chains.is_empty() || b_chains.is_empty() {
            return Err(QsError::NoChemMapping(
                complex_a.name().to_string(),
                complex_b.name().to_string(),
            ));
        }

        Ok(Self {
            a: ReducedEntity::new(a_chains),
            b: ReducedEntity::new(b_chains),
        })
    }
}

fn lookup<'a>(complex: &'a Complex, name: &str) -> Result<&'a crate::structure::Chain> {
    complex.chain(name).ok_or_else(|| {
        QsError::InvalidInput(format!("{} has no chain named {name}", complex.name()))
    })
}

/// Pick `cap` evenly spaced entries when there are more.
fn subsample(columns: &[usize], cap: usize) -> Vec<usize> {
    let n = columns.len();
    if n <= cap || cap == 0 {
        return columns.to_vec();
    }
    (0..cap).map(|k| columns[k * n / cap]).collect()
}
