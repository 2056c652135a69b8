//! Chain-to-chain mapping between two complexes.
//!
//! The preferred route assumes a closed symmetry: superposing a single pair
//! of chains from the reference symmetry tuples should overlay every other
//! chain onto its partner. When no seed achieves that, all chemically
//! compatible assignments are enumerated and ranked by RMSD, provided their
//! number stays below a fixed ceiling.

use crate::entity::{ComparisonEntities, ReducedEntity};
use crate::error::{QsError, Result};
use crate::settings::{QsSettings, OVERLAP_LEVELS, RMSD_TIE_TOLERANCE};
use crate::superpose::{multi_chain_rmsd, rmsd, sum_squared_deviation, superpose, RigidTransform};
use crate::symmetry::SymmetryGrouping;
use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Injective map from chains of complex A to chains of complex B.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChainMapping {
    pairs: Vec<(String, String)>,
}

impl ChainMapping {
    /// Build a mapping from (A chain, B chain) pairs. Every chain may appear
    /// at most once on each side.
    pub fn new(pairs: Vec<(String, String)>) -> Result<Self> {
        let mut seen_a = HashSet::new();
        let mut seen_b = HashSet::new();
        for (a, b) in &pairs {
            if !seen_a.insert(a.as_str()) || !seen_b.insert(b.as_str()) {
                return Err(QsError::InvalidInput(format!(
                    "Chain mapping is not one-to-one at {a} -> {b}"
                )));
            }
        }
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Partner in B of chain `a`.
    pub fn get(&self, a: &str) -> Option<&str> {
        self.pairs.iter().find(|(x, _)| x == a).map(|(_, y)| y.as_str())
    }

    /// Partner in A of chain `b`.
    pub fn get_inverse(&self, b: &str) -> Option<&str> {
        self.pairs.iter().find(|(_, y)| y == b).map(|(x, _)| x.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Both entities seen from the one with fewer chains.
struct Oriented<'a> {
    small: &'a ReducedEntity,
    large: &'a ReducedEntity,
    swapped: bool,
}

impl<'a> Oriented<'a> {
    fn new(entities: &'a ComparisonEntities) -> Self {
        let swapped = entities.a.len() > entities.b.len();
        if swapped {
            Self {
                small: &entities.b,
                large: &entities.a,
                swapped,
            }
        } else {
            Self {
                small: &entities.a,
                large: &entities.b,
                swapped,
            }
        }
    }

    /// Put (A grouping, B grouping) into (small, large) order.
    fn order<T>(&self, a: T, b: T) -> (T, T) {
        if self.swapped {
            (b, a)
        } else {
            (a, b)
        }
    }

    fn compatible(&self, i: usize, j: usize) -> bool {
        let (x, y) = (&self.small.chains()[i], &self.large.chains()[j]);
        x.pair_idx == y.pair_idx && x.len() == y.len()
    }

    /// Turn (small, large) index pairs into an A -> B mapping ordered like
    /// the chains of A.
    fn to_mapping(&self, assignment: &[(usize, usize)]) -> Result<ChainMapping> {
        let mut pairs: Vec<(usize, usize)> = assignment
            .iter()
            .map(|&(i, j)| if self.swapped { (j, i) } else { (i, j) })
            .collect();
        pairs.sort_unstable();
        let (a, b) = self.order(self.small, self.large);
        ChainMapping::new(
            pairs
                .into_iter()
                .map(|(i, j)| (a.chains()[i].name.clone(), b.chains()[j].name.clone()))
                .collect(),
        )
    }
}

fn indices(entity: &ReducedEntity, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|n| {
            entity
                .index_of(n)
                .ok_or_else(|| QsError::InvalidInput(format!("Unknown chain {n} in symmetry group")))
        })
        .collect()
}

/// Fraction of positions within `radius` of their counterpart.
fn overlap(moved: &[nalgebra::Point3<f64>], target: &[nalgebra::Point3<f64>], radius: f64) -> f64 {
    if target.is_empty() {
        return 0.0;
    }
    let r2 = radius * radius;
    let close = moved
        .iter()
        .zip(target)
        .filter(|(p, q)| (*p - *q).norm_squared() <= r2)
        .count();
    close as f64 / target.len() as f64
}

/// Try every chemically compatible seed pair from the two reference tuples.
/// A seed succeeds if, after superposing its chains, every chain of the
/// smaller complex overlaps a distinct compatible chain by at least the
/// required fraction of positions within the radius.
///
/// Returns the mapping of the seed with the lowest multi-chain RMSD, or
/// `None` if no seed succeeds at this level.
pub fn closed_symmetry_mapping(
    entities: &ComparisonEntities,
    reference_a: &[String],
    reference_b: &[String],
    (radius, coverage): (f64, f64),
    parallel: bool,
) -> Result<Option<(ChainMapping, f64)>> {
    let view = Oriented::new(entities);
    let (ref_small, ref_large) = view.order(reference_a, reference_b);
    let ref_small = indices(view.small, ref_small)?;
    let ref_large = indices(view.large, ref_large)?;

    let seeds: Vec<(usize, usize)> = ref_small
        .iter()
        .cartesian_product(ref_large.iter())
        .map(|(&i, &j)| (i, j))
        .filter(|&(i, j)| view.compatible(i, j))
        .collect();

    let small = view.small.chains();
    let large = view.large.chains();
    let try_seed = |&(i, j): &(usize, usize)| -> Result<Option<(Vec<(usize, usize)>, f64)>> {
        let tf = superpose(&small[i].coords, &large[j].coords)?.transform;
        let mut used = vec![false; large.len()];
        let mut assignment = Vec::with_capacity(small.len());
        let mut per_chain = Vec::with_capacity(small.len());
        for (x, chain) in small.iter().enumerate() {
            let moved = tf.apply_all(&chain.coords);
            let mut best: Option<(usize, f64)> = None;
            for (y, target) in large.iter().enumerate() {
                if !view.compatible(x, y) {
                    continue;
                }
                let frac = overlap(&moved, &target.coords, radius);
                if best.map_or(true, |(_, b)| frac > b) {
                    best = Some((y, frac));
                }
            }
            match best {
                Some((y, frac)) if frac >= coverage && !used[y] => {
                    used[y] = true;
                    assignment.push((x, y));
                    per_chain.push((rmsd(&moved, &large[y].coords), chain.len()));
                }
                _ => return Ok(None),
            }
        }
        Ok(Some((assignment, multi_chain_rmsd(per_chain))))
    };

    let results: Vec<Option<(Vec<(usize, usize)>, f64)>> = if parallel {
        seeds.par_iter().map(try_seed).collect::<Result<_>>()?
    } else {
        seeds.iter().map(try_seed).collect::<Result<_>>()?
    };

    // Lowest RMSD wins, earlier seeds win ties
    let mut best: Option<(Vec<(usize, usize)>, f64)> = None;
    for (assignment, value) in results.into_iter().flatten() {
        if best
            .as_ref()
            .map_or(true, |(_, b)| value < b - RMSD_TIE_TOLERANCE)
        {
            best = Some((assignment, value));
        }
    }
    match best {
        Some((assignment, value)) => Ok(Some((view.to_mapping(&assignment)?, value))),
        None => Ok(None),
    }
}

/// Map the chains of A onto B, trying the closed-symmetry overlap at
/// decreasing strictness before falling back to enumeration.
pub fn map_chains(
    entities: &ComparisonEntities,
    symmetry_a: &SymmetryGrouping,
    symmetry_b: &SymmetryGrouping,
    settings: &QsSettings,
) -> Result<ChainMapping> {
    for (level, &(radius, coverage)) in OVERLAP_LEVELS.iter().enumerate() {
        let found = closed_symmetry_mapping(
            entities,
            symmetry_a.reference(),
            symmetry_b.reference(),
            (radius, coverage),
            settings.enable_parallel,
        )?;
        if let Some((mapping, value)) = found {
            if level > 0 {
                warn!(
                    "Closed symmetry only found with {radius} Å overlap radius and {:.0}% coverage",
                    coverage * 100.0
                );
            }
            info!("Chain mapping {:?} (RMSD {value:.3})", mapping.pairs());
            return Ok(mapping);
        }
    }

    let mapping = combinatorial_mapping(
        entities,
        symmetry_a,
        symmetry_b,
        settings.max_mapping_candidates,
    )?;
    warn!(
        "No closed symmetry found; chain mapping {:?} is a best-effort choice by RMSD",
        mapping.pairs()
    );
    Ok(mapping)
}

/// Number of ordered selections of `k` out of `n`.
fn n_permutations(n: usize, k: usize) -> u128 {
    if k > n {
        return 0;
    }
    (n - k + 1..=n).fold(1u128, |acc, x| acc.saturating_mul(x as u128))
}

/// Lazily computed superpositions and squared deviations for scoring chain
/// assignments.
struct RmsdTable<'a> {
    small: &'a ReducedEntity,
    large: &'a ReducedEntity,
    transforms: HashMap<(usize, usize), RigidTransform>,
    ssd: HashMap<((usize, usize), (usize, usize)), f64>,
}

impl<'a> RmsdTable<'a> {
    fn new(small: &'a ReducedEntity, large: &'a ReducedEntity) -> Self {
        Self {
            small,
            large,
            transforms: HashMap::new(),
            ssd: HashMap::new(),
        }
    }

    fn transform(&mut self, seed: (usize, usize)) -> Result<RigidTransform> {
        if let Some(tf) = self.transforms.get(&seed) {
            return Ok(*tf);
        }
        let tf = superpose(
            &self.small.chains()[seed.0].coords,
            &self.large.chains()[seed.1].coords,
        )?
        .transform;
        self.transforms.insert(seed, tf);
        Ok(tf)
    }

    fn ssd(&mut self, seed: (usize, usize), pair: (usize, usize)) -> Result<f64> {
        if let Some(v) = self.ssd.get(&(seed, pair)) {
            return Ok(*v);
        }
        let tf = self.transform(seed)?;
        let moved = tf.apply_all(&self.small.chains()[pair.0].coords);
        let v = sum_squared_deviation(&moved, &self.large.chains()[pair.1].coords);
        self.ssd.insert((seed, pair), v);
        Ok(v)
    }

    /// Lowest multi-chain RMSD of the assignment over all of its pairs used
    /// as superposition seed.
    fn score(&mut self, assignment: &[(usize, usize)]) -> Result<f64> {
        let n_atoms: usize = assignment
            .iter()
            .map(|&(i, _)| self.small.chains()[i].len())
            .sum();
        if n_atoms == 0 {
            return Ok(f64::INFINITY);
        }
        let mut best = f64::INFINITY;
        for &seed in assignment {
            let mut total = 0.0;
            for &pair in assignment {
                total += self.ssd(seed, pair)?;
            }
            best = best.min((total / n_atoms as f64).sqrt());
        }
        Ok(best)
    }
}

/// Keep the assignment with the lowest score; earlier ones win ties.
fn lowest<I>(table: &mut RmsdTable, assignments: I) -> Result<Option<(Vec<(usize, usize)>, f64)>>
where
    I: IntoIterator<Item = Vec<(usize, usize)>>,
{
    let mut best: Option<(Vec<(usize, usize)>, f64)> = None;
    for assignment in assignments {
        if assignment.is_empty() {
            continue;
        }
        let value = table.score(&assignment)?;
        if best
            .as_ref()
            .map_or(true, |(_, b)| value < b - RMSD_TIE_TOLERANCE)
        {
            best = Some((assignment, value));
        }
    }
    Ok(best)
}

/// Enumerate chemically compatible assignments, first within the reference
/// tuples and then across tuples, and keep the one with the lowest RMSD.
///
/// The number of candidates is computed up front; exceeding `limit` fails
/// before anything is enumerated.
pub fn combinatorial_mapping(
    entities: &ComparisonEntities,
    symmetry_a: &SymmetryGrouping,
    symmetry_b: &SymmetryGrouping,
    limit: u128,
) -> Result<ChainMapping> {
    let view = Oriented::new(entities);
    let (sym_small, sym_large) = view.order(symmetry_a, symmetry_b);
    let tuples_small = sym_small
        .tuples()
        .iter()
        .map(|t| indices(view.small, t))
        .collect::<Result<Vec<_>>>()?;
    let tuples_large = sym_large
        .tuples()
        .iter()
        .map(|t| indices(view.large, t))
        .collect::<Result<Vec<_>>>()?;
    let (Some(ref_small), Some(ref_large)) = (tuples_small.first(), tuples_large.first()) else {
        return Err(QsError::InvalidInput("Empty symmetry grouping".to_string()));
    };

    // Compatible chains of the reference tuples, per chemical group pair
    let n_pairs = view.small.n_pairs().max(view.large.n_pairs());
    let per_group: Vec<(Vec<usize>, Vec<usize>)> = (0..n_pairs)
        .map(|p| {
            let xs = ref_small
                .iter()
                .copied()
                .filter(|&i| view.small.chains()[i].pair_idx == p)
                .collect();
            let ys = ref_large
                .iter()
                .copied()
                .filter(|&j| view.large.chains()[j].pair_idx == p)
                .collect();
            (xs, ys)
        })
        .collect();

    let intra_count = per_group.iter().fold(1u128, |acc, (xs, ys)| {
        acc.saturating_mul(n_permutations(xs.len().max(ys.len()), xs.len().min(ys.len())))
    });
    let (m_small, m_large) = (tuples_small.len(), tuples_large.len());
    let inter_count = if m_small > 1 || m_large > 1 {
        n_permutations(m_small.max(m_large) - 1, m_small.min(m_large) - 1)
    } else {
        0
    };
    let candidates = intra_count.saturating_add(inter_count);
    if candidates > limit {
        return Err(QsError::CombinatorialOverflow { candidates, limit });
    }
    debug!("Enumerating {intra_count} intra and {inter_count} inter tuple mappings");

    let mut table = RmsdTable::new(view.small, view.large);

    let options: Vec<Vec<Vec<(usize, usize)>>> = per_group
        .iter()
        .map(|(xs, ys)| {
            if xs.is_empty() || ys.is_empty() {
                return vec![vec![]];
            }
            if xs.len() <= ys.len() {
                ys.iter()
                    .permutations(xs.len())
                    .map(|perm| xs.iter().copied().zip(perm.into_iter().copied()).collect())
                    .collect()
            } else {
                xs.iter()
                    .permutations(ys.len())
                    .map(|perm| perm.into_iter().copied().zip(ys.iter().copied()).collect())
                    .collect()
            }
        })
        .collect();
    let intra = options
        .into_iter()
        .multi_cartesian_product()
        .map(|parts| parts.concat());
    let Some((best_intra, intra_rmsd)) = lowest(&mut table, intra)? else {
        return Err(QsError::InvalidInput(
            "No chemically compatible chains in the reference symmetry groups".to_string(),
        ));
    };
    debug!("Best reference tuple mapping {best_intra:?} (RMSD {intra_rmsd:.3})");

    if inter_count == 0 {
        return view.to_mapping(&best_intra);
    }

    // Positions within the tuples implied by the reference mapping
    let positions: Vec<(usize, usize)> = best_intra
        .iter()
        .filter_map(|&(i, j)| {
            Some((
                ref_small.iter().position(|&x| x == i)?,
                ref_large.iter().position(|&y| y == j)?,
            ))
        })
        .collect();

    let tuple_pairings: Vec<Vec<(usize, usize)>> = if m_small <= m_large {
        (1..m_large)
            .permutations(m_small - 1)
            .map(|perm| std::iter::once((0, 0)).chain((1..m_small).zip(perm)).collect())
            .collect()
    } else {
        (1..m_small)
            .permutations(m_large - 1)
            .map(|perm| std::iter::once((0, 0)).chain(perm.into_iter().zip(1..m_large)).collect())
            .collect()
    };
    let (small_tuples, large_tuples) = (&tuples_small, &tuples_large);
    let inter = tuple_pairings.into_iter().map(|pairing| {
        pairing
            .iter()
            .flat_map(|&(ts, tl)| {
                positions.iter().filter_map(move |&(ps, pl)| {
                    Some((*small_tuples[ts].get(ps)?, *large_tuples[tl].get(pl)?))
                })
            })
            .filter(|&(i, j)| view.compatible(i, j))
            .collect::<Vec<_>>()
    });
    let best = lowest(&mut table, inter)?.map_or(best_intra, |(assignment, _)| assignment);
    view.to_mapping(&best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityChain;
    use crate::structure::Chain;
    use crate::testing::{helix_chain, moved, ring_chains, SEQ_1, SEQ_2};
    use nalgebra::Vector3;

    fn entity_of(chains: &[Chain], pairs: &[usize]) -> ReducedEntity {
        ReducedEntity::new(
            chains
                .iter()
                .zip(pairs)
                .map(|(c, &p)| EntityChain {
                    name: c.name().to_string(),
                    pair_idx: p,
                    coords: c.ca_positions(),
                })
                .collect(),
        )
    }

    fn trivial(entity: &ReducedEntity) -> SymmetryGrouping {
        SymmetryGrouping::trivial(entity.names())
    }

    fn assert_valid(mapping: &ChainMapping, entities: &ComparisonEntities) {
        for (a, b) in mapping.pairs() {
            let x = entities.a.chain(a).unwrap();
            let y = entities.b.chain(b).unwrap();
            assert_eq!(x.pair_idx, y.pair_idx, "{a} -> {b} crosses chemical groups");
        }
        let expected = entities.a.len().min(entities.b.len());
        assert_eq!(mapping.len(), expected, "Mapping {mapping:?} is incomplete");
    }

    #[test]
    fn mapping_must_be_one_to_one() {
        let bad = ChainMapping::new(vec![("A".into(), "X".into()), ("B".into(), "X".into())]);
        assert!(matches!(bad, Err(QsError::InvalidInput(_))));
        let ok = ChainMapping::new(vec![("A".into(), "X".into()), ("B".into(), "Y".into())]).unwrap();
        assert_eq!(ok.get("B"), Some("Y"));
        assert_eq!(ok.get_inverse("X"), Some("A"));
    }

    #[test]
    fn permutation_counts() {
        assert_eq!(n_permutations(9, 9), 362_880);
        assert_eq!(n_permutations(6, 2), 30);
        assert_eq!(n_permutations(3, 0), 1);
        assert_eq!(n_permutations(2, 3), 0);
    }

    #[test]
    fn closed_symmetry_maps_rotated_ring() {
        // The same tetramer, rotated by a quarter turn and relabeled
        let ring = ring_chains(4, 12.0, SEQ_1);
        let turned: Vec<Chain> = ring
            .iter()
            .zip(["W", "X", "Y", "Z"])
            .map(|(c, name)| moved(c, name, std::f64::consts::FRAC_PI_2, Vector3::new(3.0, 1.0, -2.0)))
            .collect();
        let entities = ComparisonEntities {
            a: entity_of(&ring, &[0; 4]),
            b: entity_of(&turned, &[0; 4]),
        };
        let mapping = map_chains(
            &entities,
            &trivial(&entities.a),
            &trivial(&entities.b),
            &QsSettings::default(),
        )
        .unwrap();
        assert_valid(&mapping, &entities);
        // Every chain goes onto its own rotated copy
        assert_eq!(mapping.get("A"), Some("W"));
        assert_eq!(mapping.get("D"), Some("Z"));
    }

    #[test]
    fn smaller_complex_is_fully_mapped() {
        let ring = ring_chains(6, 14.0, SEQ_1);
        let entities = ComparisonEntities {
            a: entity_of(&ring, &[0; 6]),
            b: entity_of(&ring[..2], &[0; 2]),
        };
        let (mapping, value) = closed_symmetry_mapping(
            &entities,
            &entities.a.names().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &["A".to_string(), "B".to_string()],
            OVERLAP_LEVELS[0],
            false,
        )
        .unwrap()
        .unwrap();
        assert!(value < 1e-6);
        assert_eq!(mapping.pairs().len(), 2);
        assert_eq!(mapping.get("A"), Some("A"));
        assert_eq!(mapping.get("B"), Some("B"));
    }

    #[test]
    fn fallback_keeps_chemical_groups_apart() {
        // Hetero dimer against a version with a different relative placement
        let a_chains = vec![
            helix_chain("A", SEQ_1),
            moved(&helix_chain("B", SEQ_2), "B", 0.0, Vector3::new(10.0, 0.0, 0.0)),
        ];
        let b_chains = vec![
            moved(&helix_chain("Q", SEQ_2), "Q", 1.0, Vector3::new(0.0, 25.0, 3.0)),
            helix_chain("P", SEQ_1),
        ];
        let entities = ComparisonEntities {
            a: entity_of(&a_chains, &[0, 1]),
            b: entity_of(&b_chains, &[1, 0]),
        };
        let mapping = combinatorial_mapping(
            &entities,
            &trivial(&entities.a),
            &trivial(&entities.b),
            MAX_CANDIDATES,
        )
        .unwrap();
        assert_valid(&mapping, &entities);
        assert_eq!(mapping.get("A"), Some("P"));
        assert_eq!(mapping.get("B"), Some("Q"));
    }

    const MAX_CANDIDATES: u128 = crate::settings::MAX_MAPPING_CANDIDATES;

    #[test]
    fn enumeration_ceiling() {
        let ring = ring_chains(9, 20.0, SEQ_1);
        let entities = ComparisonEntities {
            a: entity_of(&ring, &[0; 9]),
            b: entity_of(&ring, &[0; 9]),
        };
        let err = combinatorial_mapping(
            &entities,
            &trivial(&entities.a),
            &trivial(&entities.b),
            MAX_CANDIDATES,
        )
        .unwrap_err();
        assert!(
            matches!(
                err,
                QsError::CombinatorialOverflow {
                    candidates: 362_880,
                    limit: 100_000
                }
            ),
            "Got {err:?}"
        );
    }

    #[test]
    fn inter_tuple_enumeration() {
        let ring = ring_chains(4, 12.0, SEQ_1);
        let entities = ComparisonEntities {
            a: entity_of(&ring, &[0; 4]),
            b: entity_of(&ring, &[0; 4]),
        };
        let pairs = |t: [[&str; 2]; 2]| {
            SymmetryGrouping::new(
                crate::symmetry::SymmetryKind::Dihedral,
                t.iter()
                    .map(|x| x.iter().map(|s| s.to_string()).collect())
                    .collect(),
            )
        };
        let sym = pairs([["A", "C"], ["B", "D"]]);
        let mapping = combinatorial_mapping(&entities, &sym, &sym, MAX_CANDIDATES).unwrap();
        assert_valid(&mapping, &entities);
        let value = {
            let view = Oriented::new(&entities);
            let mut table = RmsdTable::new(view.small, view.large);
            let assignment: Vec<_> = mapping
                .pairs()
                .iter()
                .map(|(a, b)| {
                    (
                        entities.a.index_of(a).unwrap(),
                        entities.b.index_of(b).unwrap(),
                    )
                })
                .collect();
            table.score(&assignment).unwrap()
        };
        assert!(value < 1e-6, "Ring onto itself should superpose exactly, got {value}");
    }
}
