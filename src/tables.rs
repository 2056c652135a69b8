//! Tabular views of the comparison results.

use crate::chem::ChemMapping;
use crate::contacts::ContactMap;
use crate::mapping::ChainMapping;
use crate::score::ResidueCorrespondence;
use polars::prelude::*;

/// One row per contact, sorted by chain pair and residues.
pub fn contacts_to_df(contacts: &ContactMap) -> PolarsResult<DataFrame> {
    let rows: Vec<_> = contacts.iter().collect();
    df!(
        "chain_1" => rows.iter().map(|x| x.0.to_string()).collect::<Vec<String>>(),
        "resi_1" => rows.iter().map(|x| x.2.num as i64).collect::<Vec<i64>>(),
        "insertion_1" => rows.iter().map(|x| x.2.ins_code.map(String::from).unwrap_or_default()).collect::<Vec<String>>(),
        "chain_2" => rows.iter().map(|x| x.1.to_string()).collect::<Vec<String>>(),
        "resi_2" => rows.iter().map(|x| x.3.num as i64).collect::<Vec<i64>>(),
        "insertion_2" => rows.iter().map(|x| x.3.ins_code.map(String::from).unwrap_or_default()).collect::<Vec<String>>(),
        "distance" => rows.iter().map(|x| x.4).collect::<Vec<f64>>(),
    )
}

pub fn chain_mapping_to_df(mapping: &ChainMapping) -> PolarsResult<DataFrame> {
    df!(
        "chain_a" => mapping.pairs().iter().map(|p| p.0.to_owned()).collect::<Vec<String>>(),
        "chain_b" => mapping.pairs().iter().map(|p| p.1.to_owned()).collect::<Vec<String>>(),
    )
}

/// Mapped chemical groups with their chains joined by commas.
pub fn chem_mapping_to_df(mapping: &ChemMapping) -> PolarsResult<DataFrame> {
    let pairs = mapping.pairs();
    df!(
        "group" => (0..pairs.len() as u32).collect::<Vec<u32>>(),
        "chains_a" => pairs.iter().map(|p| p.group_a.chains().join(",")).collect::<Vec<String>>(),
        "chains_b" => pairs.iter().map(|p| p.group_b.chains().join(",")).collect::<Vec<String>>(),
        "identity" => pairs.iter().map(|p| p.identity).collect::<Vec<f64>>(),
    )
}

pub fn residue_correspondence_to_df(corr: &ResidueCorrespondence, mapping: &ChainMapping) -> PolarsResult<DataFrame> {
    let rows: Vec<_> = corr
        .chains()
        .flat_map(|(chain_a, residues)| {
            let chain_b = mapping.get(chain_a).unwrap_or_default();
            residues.iter().map(move |(ra, rb)| (chain_a, *ra, chain_b, *rb))
        })
        .collect();
    df!(
        "chain_a" => rows.iter().map(|x| x.0.to_string()).collect::<Vec<String>>(),
        "resi_a" => rows.iter().map(|x| x.1.num as i64).collect::<Vec<i64>>(),
        "insertion_a" => rows.iter().map(|x| x.1.ins_code.map(String::from).unwrap_or_default()).collect::<Vec<String>>(),
        "chain_b" => rows.iter().map(|x| x.2.to_string()).collect::<Vec<String>>(),
        "resi_b" => rows.iter().map(|x| x.3.num as i64).collect::<Vec<i64>>(),
        "insertion_b" => rows.iter().map(|x| x.3.ins_code.map(String::from).unwrap_or_default()).collect::<Vec<String>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::GlobalAligner;
    use crate::chem::{group_chains, map_chem_groups};
    use crate::structure::ResidueNumber;
    use crate::testing::hetero_dimer;
    use std::collections::BTreeMap;

    #[test]
    fn contact_table() {
        let complex = hetero_dimer("d", "A", "B");
        let contacts = ContactMap::build(&complex, false, 12.0);
        let df = contacts_to_df(&contacts).unwrap();
        assert_eq!(df.height(), contacts.len());
        assert_eq!(
            df.get_column_names_str(),
            vec!["chain_1", "resi_1", "insertion_1", "chain_2", "resi_2", "insertion_2", "distance"]
        );
    }

    #[test]
    fn mapping_tables() {
        let a = hetero_dimer("a", "A", "B");
        let b = hetero_dimer("b", "B", "A");
        let aligner = GlobalAligner::default();
        let ga = group_chains(&a, &aligner, 0.95, false);
        let gb = group_chains(&b, &aligner, 0.95, false);
        let chem = map_chem_groups(&a, &ga, &b, &gb, &aligner).unwrap();
        let df = chem_mapping_to_df(&chem).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 4);

        let mapping = ChainMapping::new(vec![("A".into(), "B".into()), ("B".into(), "A".into())]).unwrap();
        let df = chain_mapping_to_df(&mapping).unwrap();
        assert_eq!(df.shape(), (2, 2));

        let mut corr = ResidueCorrespondence::new();
        corr.insert(
            "A",
            BTreeMap::from([
                (ResidueNumber::new(1, None), ResidueNumber::new(3, Some('A'))),
                (ResidueNumber::new(2, None), ResidueNumber::new(4, None)),
            ]),
        );
        let df = residue_correspondence_to_df(&corr, &mapping).unwrap();
        assert_eq!(df.shape(), (2, 6));
    }

    #[test]
    fn residue_numbers_keep_full_width() {
        let mapping = ChainMapping::new(vec![("A".into(), "B".into())]).unwrap();
        let mut corr = ResidueCorrespondence::new();
        corr.insert(
            "A",
            BTreeMap::from([(ResidueNumber::new(3_000_000_000, None), ResidueNumber::new(-5, None))]),
        );
        let df = residue_correspondence_to_df(&corr, &mapping).unwrap();
        let resi_a = df.column("resi_a").unwrap().i64().unwrap();
        assert_eq!(resi_a.get(0), Some(3_000_000_000));
        let resi_b = df.column("resi_b").unwrap().i64().unwrap();
        assert_eq!(resi_b.get(0), Some(-5));
    }
}
