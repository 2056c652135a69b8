//! Chemical groups: sets of sequence-identical chains within a complex, and
//! their pairing between two complexes.

use crate::align::SequenceAligner;
use crate::error::{QsError, Result};
use crate::structure::Complex;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

/// Union-find over chain indices.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }

    /// Members of every set, ordered by their smallest element.
    pub fn sets(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut by_root: Vec<Option<usize>> = vec![None; n];
        let mut sets: Vec<Vec<usize>> = Vec::new();
        for x in 0..n {
            let root = self.find(x);
            match by_root[root] {
                Some(k) => sets[k].push(x),
                None => {
                    by_root[root] = Some(sets.len());
                    sets.push(vec![x]);
                }
            }
        }
        sets
    }
}

/// Chains of one complex sharing (nearly) the same sequence. The longest
/// chain comes first and represents the group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChemicalGroup {
    chains: Vec<String>,
}

impl ChemicalGroup {
    pub fn new(chains: Vec<String>) -> Self {
        Self { chains }
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    pub fn representative(&self) -> &str {
        &self.chains[0]
    }

    pub fn contains(&self, chain: &str) -> bool {
        self.chains.iter().any(|c| c == chain)
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

/// Group the chains of a complex by pairwise sequence identity.
///
/// Chains whose identity reaches `seq_id` are merged transitively. Failed
/// alignments are logged and treated as non-identical.
pub fn group_chains(
    complex: &Complex,
    aligner: &dyn SequenceAligner,
    seq_id: f64,
    parallel: bool,
) -> Vec<ChemicalGroup> {
    let chains = complex.chains();
    let pairs: Vec<(usize, usize)> = (0..chains.len())
        .flat_map(|i| (i + 1..chains.len()).map(move |j| (i, j)))
        .collect();

    let compare = |&(i, j): &(usize, usize)| match aligner.align(&chains[i], &chains[j]) {
        Ok(aln) => Some((i, j, aln.identity() >= seq_id)),
        Err(e) => {
            warn!("{}: {e}; chains kept in separate groups", complex.name());
            None
        }
    };
    let identical: Vec<(usize, usize, bool)> = if parallel {
        pairs.par_iter().filter_map(compare).collect()
    } else {
        pairs.iter().filter_map(compare).collect()
    };

    let mut sets = DisjointSet::new(chains.len());
    for (i, j, _) in identical.into_iter().filter(|x| x.2) {
        sets.union(i, j);
    }

    let groups: Vec<ChemicalGroup> = sets
        .sets()
        .into_iter()
        .map(|mut members| {
            // Stable sort keeps the original chain order among equal lengths
            members.sort_by(|&x, &y| chains[y].len().cmp(&chains[x].len()));
            ChemicalGroup::new(members.into_iter().map(|k| chains[k].name().to_string()).collect())
        })
        .collect();
    debug!(
        "{}: chemical groups {:?}",
        complex.name(),
        groups.iter().map(|g| g.chains()).collect::<Vec<_>>()
    );
    groups
}

/// A chemical group of complex A paired with one of complex B.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChemGroupPair {
    pub group_a: ChemicalGroup,
    pub group_b: ChemicalGroup,
    /// Sequence identity of the two representatives
    pub identity: f64,
}

/// One-to-one pairing of chemical groups between two complexes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChemMapping {
    pairs: Vec<ChemGroupPair>,
}

impl ChemMapping {
    pub fn new(pairs: Vec<ChemGroupPair>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[ChemGroupPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Index of the mapped group pair containing chain `name` of complex A.
    pub fn pair_of_a(&self, name: &str) -> Option<usize> {
        self.pairs.iter().position(|p| p.group_a.contains(name))
    }

    /// Index of the mapped group pair containing chain `name` of complex B.
    pub fn pair_of_b(&self, name: &str) -> Option<usize> {
        self.pairs.iter().position(|p| p.group_b.contains(name))
    }

    /// Whether chain `a` of complex A and chain `b` of complex B belong to
    /// mapped chemical groups.
    pub fn compatible(&self, a: &str, b: &str) -> bool {
        matches!((self.pair_of_a(a), self.pair_of_b(b)), (Some(x), Some(y)) if x == y)
    }
}

/// Pair the chemical groups of two complexes greedily by the sequence
/// identity of their representatives.
///
/// The pairing is forced: the most similar remaining groups are paired even
/// at low identity. Groups left over on either side are logged.
pub fn map_chem_groups(
    complex_a: &Complex,
    groups_a: &[ChemicalGroup],
    complex_b: &Complex,
    groups_b: &[ChemicalGroup],
    aligner: &dyn SequenceAligner,
) -> Result<ChemMapping> {
    // Work from the side with fewer groups
    let swapped = groups_a.len() > groups_b.len();
    let (cx_1, g_1, cx_2, g_2) = if swapped {
        (complex_b, groups_b, complex_a, groups_a)
    } else {
        (complex_a, groups_a, complex_b, groups_b)
    };

    let mut scored: Vec<(usize, usize, f64)> = Vec::new();
    for (i, g1) in g_1.iter().enumerate() {
        for (j, g2) in g_2.iter().enumerate() {
            let (Some(c1), Some(c2)) = (cx_1.chain(g1.representative()), cx_2.chain(g2.representative()))
            else {
                continue;
            };
            match aligner.align(c1, c2) {
                Ok(aln) => scored.push((i, j, aln.identity())),
                Err(e) => warn!("Groups {:?} and {:?} not comparable: {e}", g1.chains(), g2.chains()),
            }
        }
    }
    scored.sort_by(|x, y| y.2.total_cmp(&x.2));

    let mut used_1 = vec![false; g_1.len()];
    let mut used_2 = vec![false; g_2.len()];
    let mut accepted: Vec<(usize, usize, f64)> = Vec::new();
    for (i, j, identity) in scored {
        if used_1[i] || used_2[j] {
            continue;
        }
        used_1[i] = true;
        used_2[j] = true;
        accepted.push((i, j, identity));
    }

    let (used_a, used_b) = if swapped { (used_2, used_1) } else { (used_1, used_2) };
    for (k, g) in groups_a.iter().enumerate().filter(|(k, _)| !used_a[*k]) {
        warn!("{}: chemical group {k} {:?} is not mapped", complex_a.name(), g.chains());
    }
    for (k, g) in groups_b.iter().enumerate().filter(|(k, _)| !used_b[*k]) {
        warn!("{}: chemical group {k} {:?} is not mapped", complex_b.name(), g.chains());
    }

    let mut pairs: Vec<(usize, usize, f64)> = accepted
        .into_iter()
        .map(|(i, j, id)| if swapped { (j, i, id) } else { (i, j, id) })
        .collect();
    pairs.sort_by_key(|p| p.0);
    if pairs.is_empty() {
        return Err(QsError::NoChemMapping(
            complex_a.name().to_string(),
            complex_b.name().to_string(),
        ));
    }

    let mapping = ChemMapping::new(
        pairs
            .into_iter()
            .map(|(i, j, identity)| ChemGroupPair {
                group_a: groups_a[i].clone(),
                group_b: groups_b[j].clone(),
                identity,
            })
            .collect(),
    );
    debug!(
        "Chemical mapping {:?}",
        mapping
            .pairs()
            .iter()
            .map(|p| (p.group_a.chains(), p.group_b.chains(), p.identity))
            .collect::<Vec<_>>()
    );
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::GlobalAligner;
    use crate::testing::{
        helix_chain, hetero_dimer, homo_ring, moved, FailingAligner, SEQ_1, SEQ_2, SEQ_3,
    };
    use nalgebra::Vector3;

    #[test]
    fn disjoint_set_merges_transitively() {
        let mut sets = DisjointSet::new(5);
        sets.union(0, 3);
        sets.union(3, 4);
        assert_eq!(sets.sets(), vec![vec![0, 3, 4], vec![1], vec![2]]);
        assert_eq!(sets.find(4), sets.find(0));
    }

    #[test]
    fn homomer_forms_one_group() {
        let groups = group_chains(&homo_ring("hex", 6), &GlobalAligner::default(), 0.95, true);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].chains(), ["A", "B", "C", "D", "E", "F"]);
    }

    #[test]
    fn unaligned_chain_gets_its_own_group() {
        let aligner = FailingAligner {
            chain: "C",
            pairwise: true,
        };
        let groups = group_chains(&homo_ring("tet", 4), &aligner, 0.95, false);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].chains().to_vec(), vec!["A", "B", "D"]);
        assert_eq!(groups[1].chains().to_vec(), vec!["C"]);
    }

    #[test]
    fn groups_ordered_by_length() {
        let shift = Vector3::new(10.0, 0.0, 0.0);
        let chains = vec![
            helix_chain("A", &SEQ_1[2..]),
            moved(&helix_chain("B", SEQ_2), "B", 0.0, shift),
            moved(&helix_chain("C", SEQ_1), "C", 0.0, 2.0 * shift),
            moved(&helix_chain("D", SEQ_1), "D", 0.0, 3.0 * shift),
        ];
        let complex = Complex::new("x", chains, false).unwrap();
        let groups = group_chains(&complex, &GlobalAligner::default(), 0.95, false);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].chains(), ["C", "D", "A"]);
        assert_eq!(groups[0].representative(), "C");
        assert_eq!(groups[1].chains(), ["B"]);
    }

    #[test]
    fn swapped_names_map_across() {
        let a = hetero_dimer("a", "A", "B");
        let b = hetero_dimer("b", "B", "A");
        let aligner = GlobalAligner::default();
        let ga = group_chains(&a, &aligner, 0.95, false);
        let gb = group_chains(&b, &aligner, 0.95, false);
        let mapping = map_chem_groups(&a, &ga, &b, &gb, &aligner).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.pairs()[0].group_a.chains(), ["A"]);
        assert_eq!(mapping.pairs()[0].group_b.chains(), ["B"]);
        assert_eq!(mapping.pairs()[1].group_b.chains(), ["A"]);
        assert!(mapping.compatible("A", "B"));
        assert!(!mapping.compatible("A", "A"));
    }

    #[test]
    fn extra_groups_stay_unmapped() {
        let shift = Vector3::new(10.0, 0.0, 0.0);
        let a = Complex::new(
            "a",
            vec![
                helix_chain("A", SEQ_1),
                moved(&helix_chain("B", SEQ_2), "B", 0.0, shift),
                moved(&helix_chain("C", SEQ_3), "C", 0.0, 2.0 * shift),
            ],
            false,
        )
        .unwrap();
        let b = hetero_dimer("b", "X", "Y");
        let aligner = GlobalAligner::default();
        let ga = group_chains(&a, &aligner, 0.95, false);
        let gb = group_chains(&b, &aligner, 0.95, false);
        let mapping = map_chem_groups(&a, &ga, &b, &gb, &aligner).unwrap();
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.pair_of_a("A"), Some(0));
        assert_eq!(mapping.pair_of_a("C"), None);
        assert_eq!(mapping.pairs()[1].group_b.chains(), ["Y"]);
    }
}
