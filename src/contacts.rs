//! Inter-chain residue contacts.
//!
//! Every residue is reduced to one representative position (CB, CA for
//! glycine, or CA throughout when requested). Residue pairs from different
//! chains within the cutoff are stored once, keyed by the chain names in
//! lexicographic order.

use crate::structure::{Complex, ResidueNumber};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use std::collections::BTreeMap;
use tracing::debug;

/// Representative position tagged with (chain index, residue index)
type ResiduePoint = GeomWithData<[f64; 3], (usize, usize)>;

/// Contacts between residues of two chains: (residue 1, residue 2) -> distance
pub type ChainPairContacts = BTreeMap<(ResidueNumber, ResidueNumber), f64>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactMap {
    contacts: BTreeMap<(String, String), ChainPairContacts>,
}

impl ContactMap {
    /// Collect all residue pairs from different chains whose representative
    /// positions lie within `distance` Å. Distances are rounded to three
    /// decimals.
    pub fn build(complex: &Complex, calpha_only: bool, distance: f64) -> Self {
        let use_ca = calpha_only || complex.is_ca_only();
        let chains = complex.chains();
        let points: Vec<ResiduePoint> = chains
            .iter()
            .enumerate()
            .flat_map(|(c, chain)| {
                chain.residues().iter().enumerate().map(move |(r, res)| {
                    let pos = if use_ca { res.ca_pos } else { res.main_pos };
                    GeomWithData::new([pos.x, pos.y, pos.z], (c, r))
                })
            })
            .collect();
        let tree = RTree::bulk_load(points.clone());
        let max_dist_sq = distance * distance;

        let mut contacts: BTreeMap<(String, String), ChainPairContacts> = BTreeMap::new();
        for p in &points {
            let (c1, r1) = p.data;
            let name_1 = chains[c1].name();
            for q in tree.locate_within_distance(*p.geom(), max_dist_sq) {
                let (c2, r2) = q.data;
                let name_2 = chains[c2].name();
                // Each pair is seen from both ends; keep the ordered one
                if name_1 >= name_2 {
                    continue;
                }
                let (a, b) = (p.geom(), q.geom());
                let d = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();
                contacts
                    .entry((name_1.to_string(), name_2.to_string()))
                    .or_default()
                    .insert(
                        (
                            chains[c1].residues()[r1].number,
                            chains[c2].residues()[r2].number,
                        ),
                        round3(d),
                    );
            }
        }

        let map = Self { contacts };
        debug!(
            "{}: {} contacts between {} chain pairs",
            complex.name(),
            map.len(),
            map.contacts.len()
        );
        map
    }

    /// Distance of a contact; the chain order may be given either way.
    pub fn get(&self, chain_1: &str, chain_2: &str, res_1: ResidueNumber, res_2: ResidueNumber) -> Option<f64> {
        if chain_1 <= chain_2 {
            self.contacts
                .get(&(chain_1.to_string(), chain_2.to_string()))?
                .get(&(res_1, res_2))
                .copied()
        } else {
            self.get(chain_2, chain_1, res_2, res_1)
        }
    }

    /// Contacts of one chain pair, keyed in the stored chain order.
    pub fn chain_pair(&self, chain_1: &str, chain_2: &str) -> Option<&ChainPairContacts> {
        self.contacts.get(&(chain_1.to_string(), chain_2.to_string()))
    }

    /// Chain pairs with at least one contact.
    pub fn chain_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.contacts.keys().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// All contacts as (chain 1, chain 2, residue 1, residue 2, distance).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, ResidueNumber, ResidueNumber, f64)> {
        self.contacts.iter().flat_map(|((c1, c2), pairs)| {
            pairs
                .iter()
                .map(move |(&(r1, r2), &d)| (c1.as_str(), c2.as_str(), r1, r2, d))
        })
    }

    pub fn len(&self) -> usize {
        self.contacts.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Chain, Residue};
    use crate::testing::{hetero_dimer, homo_ring};
    use nalgebra::Point3;

    fn straight_chain(name: &str, x: f64) -> Chain {
        let residues = (0..25)
            .map(|i| {
                let ca = Point3::new(x, 0.0, 3.8 * i as f64);
                let cb = Point3::new(x + if x > 0.0 { -1.0 } else { 1.0 }, 0.0, 3.8 * i as f64);
                Residue::new('A', ResidueNumber::new(i + 1, None), cb, ca)
            })
            .collect();
        Chain::new(name, residues)
    }

    #[test]
    fn contacts_use_representative_atoms() {
        // CA atoms 12.5 Å apart, CB atoms 10.5 Å apart
        let complex = Complex::new(
            "pair",
            vec![straight_chain("B", 6.25), straight_chain("A", -6.25)],
            false,
        )
        .unwrap();
        let cb = ContactMap::build(&complex, false, 12.0);
        assert_eq!(cb.get("A", "B", ResidueNumber::new(1, None), ResidueNumber::new(1, None)), Some(10.5));
        // Same contact looked up from the other side
        assert_eq!(cb.get("B", "A", ResidueNumber::new(1, None), ResidueNumber::new(1, None)), Some(10.5));
        assert!(cb.chain_pair("B", "A").is_none());
        assert_eq!(cb.chain_pairs().collect::<Vec<_>>(), vec![("A", "B")]);

        let ca = ContactMap::build(&complex, true, 12.0);
        assert!(ca.is_empty());
    }

    #[test]
    fn no_duplicates_and_sorted_keys() {
        let map = ContactMap::build(&hetero_dimer("d", "B", "A"), false, 12.0);
        assert!(!map.is_empty());
        assert!(map.iter().all(|(c1, c2, _, _, d)| c1 < c2 && d <= 12.0));
        let unique: std::collections::HashSet<_> =
            map.iter().map(|(c1, c2, r1, r2, _)| (c1, c2, r1, r2)).collect();
        assert_eq!(unique.len(), map.len());
    }

    #[test]
    fn ring_neighbours_only() {
        let map = ContactMap::build(&homo_ring("hex", 6), false, 12.0);
        let pairs: Vec<_> = map.chain_pairs().collect();
        assert_eq!(
            pairs,
            vec![("A", "B"), ("A", "F"), ("B", "C"), ("C", "D"), ("D", "E"), ("E", "F")]
        );
    }

    #[test]
    fn rounding() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(7.0), 7.0);
    }
}
