//! Weighted contact overlap (QS-score).

use crate::contacts::ContactMap;
use crate::mapping::ChainMapping;
use crate::structure::ResidueNumber;
use serde::Serialize;
use std::collections::BTreeMap;

/// Residue-level correspondence of mapped chains: A chain -> (A residue ->
/// B residue).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResidueCorrespondence {
    chains: BTreeMap<String, BTreeMap<ResidueNumber, ResidueNumber>>,
}

impl ResidueCorrespondence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chain: impl Into<String>, residues: BTreeMap<ResidueNumber, ResidueNumber>) {
        self.chains.insert(chain.into(), residues);
    }

    /// Residue map of one chain.
    pub fn chain(&self, chain: &str) -> Option<&BTreeMap<ResidueNumber, ResidueNumber>> {
        self.chains.get(chain)
    }

    pub fn chains(&self) -> impl Iterator<Item = (&str, &BTreeMap<ResidueNumber, ResidueNumber>)> {
        self.chains.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Partner of residue `res` of chain `chain`.
    pub fn map_residue(&self, chain: &str, res: ResidueNumber) -> Option<ResidueNumber> {
        self.chains.get(chain)?.get(&res).copied()
    }

    /// The same correspondence keyed by the chains of B.
    pub fn inverse(&self, mapping: &ChainMapping) -> Self {
        let chains = self
            .chains
            .iter()
            .filter_map(|(a, residues)| {
                let b = mapping.get(a)?;
                let inverted = residues.iter().map(|(ra, rb)| (*rb, *ra)).collect();
                Some((b.to_string(), inverted))
            })
            .collect();
        Self { chains }
    }

    /// Number of residue pairs over all chains.
    pub fn len(&self) -> usize {
        self.chains.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// QS-best and QS-global, both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QsScore {
    /// Overlap restricted to the mapped parts of both complexes
    pub best: f64,
    /// Overlap penalized by every unmatched contact
    pub global: f64,
}

/// The scores together with the weight sums they are computed from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct QsScoreDetails {
    pub best: f64,
    pub global: f64,
    pub weighted_scores: f64,
    pub weight_sum: f64,
    pub weight_extra_mapped: f64,
    pub weight_extra_all: f64,
}

impl QsScoreDetails {
    pub fn score(&self) -> QsScore {
        QsScore {
            best: self.best,
            global: self.global,
        }
    }
}

/// Contact weight: 1 up to 5 Å, then a Gaussian decay.
pub fn weight(d: f64) -> f64 {
    if d <= 5.0 {
        1.0
    } else {
        (-2.0 * ((d - 5.0) / 4.28).powi(2)).exp()
    }
}

/// Compare the contacts of A and B through the chain mapping and residue
/// correspondence.
///
/// A contact present in both maps is shared and scores by how similar the two
/// distances are. Contacts only present on one side are extra: they count
/// towards the mapped extra weight if both residues have a partner, and always
/// towards the global extra weight.
pub fn qs_score(
    contacts_a: &ContactMap,
    contacts_b: &ContactMap,
    residues: &ResidueCorrespondence,
    mapping: &ChainMapping,
    contact_distance: f64,
) -> QsScoreDetails {
    let mut details = QsScoreDetails::default();

    for (c1, c2, r1, r2, d_a) in contacts_a.iter() {
        let mapped = (|| {
            Some((
                mapping.get(c1)?,
                mapping.get(c2)?,
                residues.map_residue(c1, r1)?,
                residues.map_residue(c2, r2)?,
            ))
        })();
        match mapped {
            Some((m1, m2, s1, s2)) => match contacts_b.get(m1, m2, s1, s2) {
                Some(d_b) => {
                    let w = weight(d_a.min(d_b));
                    details.weighted_scores += w * (1.0 - (d_a - d_b).abs() / contact_distance);
                    details.weight_sum += w;
                }
                None => {
                    details.weight_extra_mapped += weight(d_a);
                    details.weight_extra_all += weight(d_a);
                }
            },
            None => details.weight_extra_all += weight(d_a),
        }
    }

    let inverse = residues.inverse(mapping);
    for (c1, c2, r1, r2, d_b) in contacts_b.iter() {
        let mapped = (|| {
            Some((
                mapping.get_inverse(c1)?,
                mapping.get_inverse(c2)?,
                inverse.map_residue(c1, r1)?,
                inverse.map_residue(c2, r2)?,
            ))
        })();
        match mapped {
            // Shared contacts were counted from A
            Some((m1, m2, s1, s2)) if contacts_a.get(m1, m2, s1, s2).is_some() => {}
            Some(_) => {
                details.weight_extra_mapped += weight(d_b);
                details.weight_extra_all += weight(d_b);
            }
            None => details.weight_extra_all += weight(d_b),
        }
    }

    let ratio = |den: f64| {
        if den > 0.0 {
            details.weighted_scores / den
        } else {
            0.0
        }
    };
    details.best = ratio(details.weight_sum + details.weight_extra_mapped);
    details.global = ratio(details.weight_sum + details.weight_extra_all);
    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Chain, Complex, Residue};
    use nalgebra::Point3;

    #[test]
    fn weight_boundary() {
        assert_eq!(weight(5.0), 1.0);
        assert_eq!(weight(0.0), 1.0);
        let samples: Vec<f64> = (0..40).map(|k| weight(5.0 + 0.25 * (k + 1) as f64)).collect();
        assert!(samples[0] < 1.0);
        assert!(samples.windows(2).all(|w| w[1] < w[0]), "{samples:?}");
    }

    fn line(name: &str, x: f64, n: usize) -> Chain {
        let residues = (0..n)
            .map(|i| {
                let p = Point3::new(x, 0.0, 3.8 * i as f64);
                Residue::new('A', ResidueNumber::new(i as isize + 1, None), p, p)
            })
            .collect();
        Chain::new(name, residues)
    }

    fn identity_correspondence(complex: &Complex) -> ResidueCorrespondence {
        let mut corr = ResidueCorrespondence::new();
        for chain in complex.chains() {
            corr.insert(
                chain.name(),
                chain.residues().iter().map(|r| (r.number, r.number)).collect(),
            );
        }
        corr
    }

    fn identity_mapping(complex: &Complex) -> ChainMapping {
        ChainMapping::new(
            complex
                .chain_names()
                .into_iter()
                .map(|c| (c.to_string(), c.to_string()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn identical_contacts_score_one() {
        let complex = Complex::new("x", vec![line("A", 0.0, 20), line("B", 6.0, 20)], false).unwrap();
        let contacts = ContactMap::build(&complex, false, 12.0);
        let details = qs_score(
            &contacts,
            &contacts,
            &identity_correspondence(&complex),
            &identity_mapping(&complex),
            12.0,
        );
        assert_eq!(details.best, 1.0);
        assert_eq!(details.global, 1.0);
        assert_eq!(details.weight_extra_all, 0.0);
    }

    #[test]
    fn shifted_distances_lower_the_score() {
        let a = Complex::new("a", vec![line("A", 0.0, 20), line("B", 6.0, 20)], false).unwrap();
        let b = Complex::new("b", vec![line("A", 0.0, 20), line("B", 7.0, 20)], false).unwrap();
        let details = qs_score(
            &ContactMap::build(&a, false, 12.0),
            &ContactMap::build(&b, false, 12.0),
            &identity_correspondence(&a),
            &identity_mapping(&a),
            12.0,
        );
        assert!(details.best < 1.0 && details.best > 0.8, "{details:?}");
        assert!(details.global <= details.best);
    }

    #[test]
    fn unmapped_residues_only_count_globally() {
        let a = Complex::new("a", vec![line("A", 0.0, 30), line("B", 6.0, 30)], false).unwrap();
        let b = Complex::new("b", vec![line("A", 0.0, 30), line("B", 6.0, 30)], false).unwrap();
        // Residues past 20 have no partner
        let mut corr = ResidueCorrespondence::new();
        for chain in ["A", "B"] {
            corr.insert(
                chain,
                (1..=20).map(|i| (ResidueNumber::new(i, None), ResidueNumber::new(i, None))).collect(),
            );
        }
        let details = qs_score(
            &ContactMap::build(&a, false, 12.0),
            &ContactMap::build(&b, false, 12.0),
            &corr,
            &identity_mapping(&a),
            12.0,
        );
        assert_eq!(details.weight_extra_mapped, 0.0);
        assert!(details.weight_extra_all > 0.0);
        assert_eq!(details.best, 1.0);
        assert!(details.global < 1.0);
    }

    #[test]
    fn no_shared_contacts_scores_zero() {
        let a = Complex::new("a", vec![line("A", 0.0, 20), line("B", 6.0, 20)], false).unwrap();
        let b = Complex::new("b", vec![line("A", 0.0, 20), line("B", 30.0, 20)], false).unwrap();
        let details = qs_score(
            &ContactMap::build(&a, false, 12.0),
            &ContactMap::build(&b, false, 12.0),
            &identity_correspondence(&a),
            &identity_mapping(&a),
            12.0,
        );
        assert_eq!(details.best, 0.0);
        assert_eq!(details.global, 0.0);

        let empty = qs_score(
            &ContactMap::default(),
            &ContactMap::default(),
            &ResidueCorrespondence::new(),
            &ChainMapping::default(),
            12.0,
        );
        assert_eq!(empty.score(), QsScore { best: 0.0, global: 0.0 });
    }

    #[test]
    fn inverse_correspondence() {
        let mut corr = ResidueCorrespondence::new();
        corr.insert(
            "A",
            BTreeMap::from([(ResidueNumber::new(1, None), ResidueNumber::new(11, None))]),
        );
        let mapping = ChainMapping::new(vec![("A".into(), "Z".into())]).unwrap();
        let inv = corr.inverse(&mapping);
        assert_eq!(
            inv.map_residue("Z", ResidueNumber::new(11, None)),
            Some(ResidueNumber::new(1, None))
        );
        assert_eq!(inv.len(), 1);
    }
}
