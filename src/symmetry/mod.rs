//! Detection of rotational symmetry within a complex.
//!
//! Every pair of chains in the same chemical group is superposed. Pairs
//! related by the same rotation form clusters, and each cluster read as the
//! edges of a graph over chains may split the complex into equal-size
//! tuples. Clustering by Euler angles finds "dihedral" candidates, clustering
//! by rotation axis finds "cyclic" ones.

pub mod cluster;

use crate::chem::DisjointSet;
use crate::entity::{ComparisonEntities, ReducedEntity};
use crate::error::Result;
use crate::mapping::closed_symmetry_mapping;
use crate::settings::{OVERLAP_LEVELS, SYMMETRY_THRESHOLDS};
use crate::structure::centroid;
use crate::superpose::{superpose, RigidTransform};
use cluster::average_linkage;
use itertools::Itertools;
use nalgebra::Vector3;
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;
use tracing::{debug, info, warn};

/// CA pairs closer than this (Å) count towards interface size
const INTERFACE_CA_DISTANCE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymmetryKind {
    /// A single tuple holding every chain
    Trivial,
    /// Found by clustering Euler angles
    Dihedral,
    /// Found by clustering rotation axes
    Cyclic,
}

/// Partition of the chains of a complex into equal-size tuples. The first
/// tuple is the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymmetryGrouping {
    kind: SymmetryKind,
    tuples: Vec<Vec<String>>,
}

impl SymmetryGrouping {
    pub fn new(kind: SymmetryKind, tuples: Vec<Vec<String>>) -> Self {
        Self { kind, tuples }
    }

    /// All chains in one tuple.
    pub fn trivial<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            SymmetryKind::Trivial,
            vec![names.into_iter().map(str::to_string).collect()],
        )
    }

    pub fn kind(&self) -> SymmetryKind {
        self.kind
    }

    pub fn tuples(&self) -> &[Vec<String>] {
        &self.tuples
    }

    pub fn reference(&self) -> &[String] {
        self.tuples.first().map_or(&[], Vec::as_slice)
    }

    pub fn is_trivial(&self) -> bool {
        self.tuples.len() <= 1
    }

    /// Whether the tuples have equal sizes and contain every name in `names`
    /// exactly once.
    pub fn partitions(&self, names: &[&str]) -> bool {
        let mut seen: Vec<&str> = self.tuples.iter().flatten().map(String::as_str).collect();
        let size = self.reference().len();
        if size == 0 || self.tuples.iter().any(|t| t.len() != size) || seen.len() != names.len() {
            return false;
        }
        seen.sort_unstable();
        let mut expected = names.to_vec();
        expected.sort_unstable();
        seen == expected
    }
}

/// Symmetry groupings chosen for a pair of complexes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SymmetryOutcome {
    /// Compatible groupings were found in both complexes
    Detected {
        a: SymmetryGrouping,
        b: SymmetryGrouping,
    },
    /// Both complexes use the trivial grouping
    TrivialFallback {
        a: SymmetryGrouping,
        b: SymmetryGrouping,
    },
}

impl SymmetryOutcome {
    pub fn a(&self) -> &SymmetryGrouping {
        match self {
            Self::Detected { a, .. } | Self::TrivialFallback { a, .. } => a,
        }
    }

    pub fn b(&self) -> &SymmetryGrouping {
        match self {
            Self::Detected { b, .. } | Self::TrivialFallback { b, .. } => b,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::TrivialFallback { .. })
    }
}

/// Mean wrapped difference of two Euler angle triplets.
fn angle_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (x - y).abs() % (2.0 * PI);
            d.min(2.0 * PI - d)
        })
        .sum::<f64>()
        / 3.0
}

/// Distance of two rotation axes, ignoring their sign.
fn axis_distance(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    (a - b).norm().min((a + b).norm())
}

fn distance_matrix<T>(items: &[T], metric: impl Fn(&T, &T) -> f64) -> Vec<Vec<f64>> {
    items
        .iter()
        .map(|x| items.iter().map(|y| metric(x, y)).collect())
        .collect()
}

/// Find every symmetry grouping consistent with the pairwise superpositions
/// of chemically identical chains. Returns an empty list when the complex has
/// no detectable symmetry.
pub fn detect_symmetries(entity: &ReducedEntity, parallel: bool) -> Result<Vec<SymmetryGrouping>> {
    let groups = entity.groups();
    let pairs: Vec<(usize, usize)> = groups
        .iter()
        .flat_map(|g| {
            g.iter()
                .enumerate()
                .flat_map(move |(k, &i)| g[k + 1..].iter().map(move |&j| (i, j)))
        })
        .collect();
    if pairs.is_empty() {
        return Ok(vec![]);
    }

    let chains = entity.chains();
    let fit = |&(i, j): &(usize, usize)| -> Result<RigidTransform> {
        Ok(superpose(&chains[i].coords, &chains[j].coords)?.transform)
    };
    let transforms: Vec<RigidTransform> = if parallel {
        pairs.par_iter().map(fit).collect::<Result<_>>()?
    } else {
        pairs.iter().map(fit).collect::<Result<_>>()?
    };

    let angles: Vec<[f64; 3]> = transforms.iter().map(RigidTransform::euler_angles).collect();
    let axes: Vec<Vector3<f64>> = transforms.iter().map(RigidTransform::axis).collect();
    let angle_dist = distance_matrix(&angles, angle_distance);
    let axis_dist = distance_matrix(&axes, axis_distance);

    let mut candidates: Vec<SymmetryGrouping> = Vec::new();
    for threshold in SYMMETRY_THRESHOLDS {
        for (kind, dist) in [
            (SymmetryKind::Dihedral, &angle_dist),
            (SymmetryKind::Cyclic, &axis_dist),
        ] {
            for cluster in average_linkage(dist, threshold) {
                let edges: Vec<(usize, usize)> = cluster.iter().map(|&p| pairs[p]).collect();
                let Some(parts) = components(entity, &groups, &edges) else {
                    continue;
                };
                for tuples in tuples_for(entity, &parts, kind) {
                    // A single tuple is the trivial grouping
                    if tuples.len() < 2 {
                        continue;
                    }
                    let grouping = SymmetryGrouping::new(kind, to_names(entity, tuples));
                    if !candidates.iter().any(|c| c.tuples == grouping.tuples) {
                        debug!(
                            "{kind:?} symmetry at threshold {threshold}: {:?}",
                            grouping.tuples
                        );
                        candidates.push(grouping);
                    }
                }
            }
        }
    }
    Ok(candidates)
}

/// Connected components per chemical group for a set of edges, or `None` if
/// they do not split every group into the same number of equal-size parts.
fn components(
    entity: &ReducedEntity,
    groups: &[Vec<usize>],
    edges: &[(usize, usize)],
) -> Option<Vec<Vec<Vec<usize>>>> {
    let mut sets = DisjointSet::new(entity.len());
    for &(i, j) in edges {
        sets.union(i, j);
    }
    let all = sets.sets();

    let per_group: Vec<Vec<Vec<usize>>> = groups
        .iter()
        .map(|g| {
            all.iter()
                .filter(|s| g.contains(&s[0]))
                .cloned()
                .collect::<Vec<_>>()
        })
        .collect();

    let size = per_group.first()?.first()?.len();
    let count = per_group[0].len();
    let consistent = size >= 2
        && per_group
            .iter()
            .all(|g| g.len() == count && g.iter().all(|c| c.len() == size));
    consistent.then_some(per_group)
}

/// Build tuples from per-group components. Homomers use the components
/// directly; hetero complexes combine the groups by proximity.
fn tuples_for(
    entity: &ReducedEntity,
    components: &[Vec<Vec<usize>>],
    kind: SymmetryKind,
) -> Vec<Vec<Vec<usize>>> {
    if components.len() == 1 {
        return vec![components[0].clone()];
    }
    match kind {
        SymmetryKind::Dihedral => vec![merge_components(entity, components)],
        SymmetryKind::Cyclic => {
            let chains: Vec<Vec<usize>> = components
                .iter()
                .map(|g| g.iter().flatten().copied().sorted().collect())
                .collect();
            if chains.iter().any(|g| g.len() != chains[0].len()) {
                return vec![];
            }
            let by_center = asymmetric_units(&chains, |r, c| {
                -(entity.chains()[r].center() - entity.chains()[c].center()).norm()
            });
            let by_interface = asymmetric_units(&chains, |r, c| {
                interface_size(&entity.chains()[r].coords, &entity.chains()[c].coords) as f64
            });
            if by_center == by_interface {
                vec![by_center]
            } else {
                vec![by_center, by_interface]
            }
        }
        SymmetryKind::Trivial => vec![],
    }
}

/// Attach to every component of the first group the closest unused component
/// of each other group.
fn merge_components(entity: &ReducedEntity, components: &[Vec<Vec<usize>>]) -> Vec<Vec<usize>> {
    let center = |c: &Vec<usize>| {
        centroid(c.iter().flat_map(|&k| entity.chains()[k].coords.iter()))
    };
    let mut tuples: Vec<Vec<usize>> = components[0].clone();
    for group in &components[1..] {
        let mut used = vec![false; group.len()];
        for tuple in tuples.iter_mut() {
            let reference = center(tuple);
            let closest = group
                .iter()
                .enumerate()
                .filter(|(k, _)| !used[*k])
                .min_by(|(_, x), (_, y)| {
                    (center(x) - reference)
                        .norm()
                        .total_cmp(&(center(y) - reference).norm())
                });
            if let Some((k, comp)) = closest {
                used[k] = true;
                tuple.extend(comp);
            }
        }
    }
    tuples
}

/// One tuple per chain of the first group, completed with the best scoring
/// unused chain of every other group.
fn asymmetric_units(chains: &[Vec<usize>], score: impl Fn(usize, usize) -> f64) -> Vec<Vec<usize>> {
    let mut used: Vec<Vec<bool>> = chains.iter().map(|g| vec![false; g.len()]).collect();
    chains[0]
        .iter()
        .map(|&r| {
            let mut tuple = vec![r];
            for (g, members) in chains.iter().enumerate().skip(1) {
                let best = members
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| !used[g][*k])
                    .max_by(|x, y| {
                        // Earlier chains win ties
                        score(r, *x.1)
                            .total_cmp(&score(r, *y.1))
                            .then(y.1.cmp(x.1))
                    });
                if let Some((k, &c)) = best {
                    used[g][k] = true;
                    tuple.push(c);
                }
            }
            tuple
        })
        .collect()
}

fn interface_size(a: &[nalgebra::Point3<f64>], b: &[nalgebra::Point3<f64>]) -> usize {
    let cutoff = INTERFACE_CA_DISTANCE * INTERFACE_CA_DISTANCE;
    a.iter()
        .flat_map(|p| b.iter().map(move |q| (p - q).norm_squared()))
        .filter(|d| *d <= cutoff)
        .count()
}

/// Sort chains within tuples and tuples by their first chain, then resolve
/// names.
fn to_names(entity: &ReducedEntity, mut tuples: Vec<Vec<usize>>) -> Vec<Vec<String>> {
    for t in tuples.iter_mut() {
        t.sort_unstable();
    }
    tuples.sort_by_key(|t| t.first().copied());
    tuples
        .into_iter()
        .map(|t| t.into_iter().map(|k| entity.chains()[k].name.clone()).collect())
        .collect()
}

/// Pick the first pair of candidate groupings whose reference tuples have the
/// same size and superpose onto each other at the strictest overlap level.
/// Only the chains of the two reference tuples take part in that check; the
/// whole complexes are left to chain mapping. Falls back to the trivial
/// grouping on both sides.
pub fn select_symmetry(
    entities: &ComparisonEntities,
    candidates_a: &[SymmetryGrouping],
    candidates_b: &[SymmetryGrouping],
    parallel: bool,
) -> Result<SymmetryOutcome> {
    for a in candidates_a {
        for b in candidates_b {
            if a.reference().len() != b.reference().len() {
                continue;
            }
            let references = ComparisonEntities {
                a: entities.a.subset(a.reference()),
                b: entities.b.subset(b.reference()),
            };
            if closed_symmetry_mapping(&references, a.reference(), b.reference(), OVERLAP_LEVELS[0], parallel)?
                .is_some()
            {
                info!("Symmetry groups {:?} and {:?}", a.tuples(), b.tuples());
                return Ok(SymmetryOutcome::Detected {
                    a: a.clone(),
                    b: b.clone(),
                });
            }
        }
    }

    if !candidates_a.is_empty() && !candidates_b.is_empty() {
        warn!("Symmetry groups of the two complexes are incompatible; using trivial groups");
    } else {
        debug!("No symmetry detected; using trivial groups");
    }
    Ok(SymmetryOutcome::TrivialFallback {
        a: SymmetryGrouping::trivial(entities.a.names()),
        b: SymmetryGrouping::trivial(entities.b.names()),
    })
}
