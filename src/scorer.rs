//! Lazily evaluated comparison of two complexes.
//!
//! Every intermediate result is computed on first access and cached for the
//! lifetime of the scorer. The complexes themselves are only borrowed.

use crate::align::{GlobalAligner, ResidueNumberAligner, SequenceAligner};
use crate::chem::{group_chains, map_chem_groups, ChemMapping, ChemicalGroup};
use crate::contacts::ContactMap;
use crate::entity::ComparisonEntities;
use crate::error::{QsError, Result};
use crate::mapping::{map_chains, ChainMapping};
use crate::score::{qs_score, QsScore, QsScoreDetails, ResidueCorrespondence};
use crate::settings::QsSettings;
use crate::structure::Complex;
use crate::superpose::{superpose, Superposition};
use crate::symmetry::{detect_symmetries, select_symmetry, SymmetryGrouping, SymmetryOutcome};
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// QS-score computation between a model (A) and a reference (B).
///
/// ```no_run
/// # fn demo(model: &qscore::Complex, reference: &qscore::Complex) -> qscore::Result<()> {
/// let scorer = qscore::QsScorer::new(model, reference);
/// let score = scorer.score()?;
/// println!("QS-best {:.3}, QS-global {:.3}", score.best, score.global);
/// # Ok(())
/// # }
/// ```
pub struct QsScorer<'a> {
    complex_a: &'a Complex,
    complex_b: &'a Complex,
    settings: QsSettings,
    aligner: Box<dyn SequenceAligner>,
    symmetry_override: Option<(SymmetryGrouping, SymmetryGrouping)>,
    mapping_override: Option<ChainMapping>,

    chem_groups_a: OnceCell<Vec<ChemicalGroup>>,
    chem_groups_b: OnceCell<Vec<ChemicalGroup>>,
    chem_mapping: OnceCell<ChemMapping>,
    entities: OnceCell<ComparisonEntities>,
    symmetry: OnceCell<SymmetryOutcome>,
    chain_mapping: OnceCell<ChainMapping>,
    residue_correspondence: OnceCell<ResidueCorrespondence>,
    contacts_a: OnceCell<ContactMap>,
    contacts_b: OnceCell<ContactMap>,
    superposition: OnceCell<Superposition>,
    score_details: OnceCell<QsScoreDetails>,
}

impl<'a> QsScorer<'a> {
    pub fn new(complex_a: &'a Complex, complex_b: &'a Complex) -> Self {
        Self {
            complex_a,
            complex_b,
            settings: QsSettings::default(),
            aligner: Box::new(GlobalAligner::default()),
            symmetry_override: None,
            mapping_override: None,
            chem_groups_a: OnceCell::new(),
            chem_groups_b: OnceCell::new(),
            chem_mapping: OnceCell::new(),
            entities: OnceCell::new(),
            symmetry: OnceCell::new(),
            chain_mapping: OnceCell::new(),
            residue_correspondence: OnceCell::new(),
            contacts_a: OnceCell::new(),
            contacts_b: OnceCell::new(),
            superposition: OnceCell::new(),
            score_details: OnceCell::new(),
        }
    }

    pub fn with_settings(mut self, settings: QsSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replace the sequence aligner used for chemical grouping and residue
    /// correspondences.
    pub fn with_aligner(mut self, aligner: Box<dyn SequenceAligner>) -> Self {
        self.aligner = aligner;
        self
    }

    /// Skip symmetry detection and use the given groupings.
    pub fn with_symmetry(mut self, a: SymmetryGrouping, b: SymmetryGrouping) -> Self {
        self.symmetry_override = Some((a, b));
        self
    }

    /// Skip chain mapping and use the given one.
    pub fn with_chain_mapping(mut self, mapping: ChainMapping) -> Self {
        self.mapping_override = Some(mapping);
        self
    }

    /// Aligner for residue-level correspondences.
    fn residue_aligner(&self) -> &dyn SequenceAligner {
        if self.settings.res_num_alignment {
            &ResidueNumberAligner
        } else {
            self.aligner.as_ref()
        }
    }

    pub fn chem_groups_a(&self) -> &[ChemicalGroup] {
        self.chem_groups_a.get_or_init(|| {
            group_chains(
                self.complex_a,
                self.aligner.as_ref(),
                self.settings.chem_group_seq_id,
                self.settings.enable_parallel,
            )
        })
    }

    pub fn chem_groups_b(&self) -> &[ChemicalGroup] {
        self.chem_groups_b.get_or_init(|| {
            group_chains(
                self.complex_b,
                self.aligner.as_ref(),
                self.settings.chem_group_seq_id,
                self.settings.enable_parallel,
            )
        })
    }

    pub fn chem_mapping(&self) -> Result<&ChemMapping> {
        if let Some(mapping) = self.chem_mapping.get() {
            return Ok(mapping);
        }
        let mapping = map_chem_groups(
            self.complex_a,
            self.chem_groups_a(),
            self.complex_b,
            self.chem_groups_b(),
            self.aligner.as_ref(),
        )?;
        Ok(self.chem_mapping.get_or_init(|| mapping))
    }

    /// Reduced CA views of the chains in mapped chemical groups.
    pub fn entities(&self) -> Result<&ComparisonEntities> {
        if let Some(entities) = self.entities.get() {
            return Ok(entities);
        }
        let entities = ComparisonEntities::build(
            self.complex_a,
            self.complex_b,
            self.chem_mapping()?,
            self.residue_aligner(),
            self.settings.max_ca_per_chain,
        )?;
        Ok(self.entities.get_or_init(|| entities))
    }

    pub fn symmetry(&self) -> Result<&SymmetryOutcome> {
        if let Some(outcome) = self.symmetry.get() {
            return Ok(outcome);
        }
        let entities = self.entities()?;
        let outcome = match &self.symmetry_override {
            Some((a, b)) => {
                for (grouping, entity) in [(a, &entities.a), (b, &entities.b)] {
                    if !grouping.partitions(&entity.names()) {
                        return Err(QsError::InvalidInput(format!(
                            "Symmetry groups {:?} do not partition chains {:?}",
                            grouping.tuples(),
                            entity.names()
                        )));
                    }
                }
                SymmetryOutcome::Detected {
                    a: a.clone(),
                    b: b.clone(),
                }
            }
            None => {
                let parallel = self.settings.enable_parallel;
                let candidates_a = detect_symmetries(&entities.a, parallel)?;
                let candidates_b = detect_symmetries(&entities.b, parallel)?;
                debug!(
                    "{} symmetry candidate(s) for {}, {} for {}",
                    candidates_a.len(),
                    self.complex_a.name(),
                    candidates_b.len(),
                    self.complex_b.name()
                );
                select_symmetry(entities, &candidates_a, &candidates_b, parallel)?
            }
        };
        Ok(self.symmetry.get_or_init(|| outcome))
    }

    pub fn chain_mapping(&self) -> Result<&ChainMapping> {
        if let Some(mapping) = self.chain_mapping.get() {
            return Ok(mapping);
        }
        let mapping = match &self.mapping_override {
            Some(mapping) => {
                self.check_mapping(mapping)?;
                mapping.clone()
            }
            None => {
                let symmetry = self.symmetry()?;
                map_chains(self.entities()?, symmetry.a(), symmetry.b(), &self.settings)?
            }
        };
        Ok(self.chain_mapping.get_or_init(|| mapping))
    }

    fn check_mapping(&self, mapping: &ChainMapping) -> Result<()> {
        let chem = self.chem_mapping()?;
        for (a, b) in mapping.pairs() {
            if self.complex_a.chain(a).is_none() || self.complex_b.chain(b).is_none() {
                return Err(QsError::InvalidInput(format!("Unknown chain in mapping {a} -> {b}")));
            }
            if !chem.compatible(a, b) {
                return Err(QsError::InvalidInput(format!(
                    "Chains {a} and {b} are not in mapped chemical groups"
                )));
            }
        }
        Ok(())
    }

    /// Residue pairs of every mapped chain pair, from pairwise alignments.
    /// Chain pairs that cannot be aligned are logged and left empty.
    pub fn residue_correspondence(&self) -> Result<&ResidueCorrespondence> {
        if let Some(corr) = self.residue_correspondence.get() {
            return Ok(corr);
        }
        let aligner = self.residue_aligner();
        let mut corr = ResidueCorrespondence::new();
        for (name_a, name_b) in self.chain_mapping()?.pairs() {
            let (Some(chain_a), Some(chain_b)) = (self.complex_a.chain(name_a), self.complex_b.chain(name_b))
            else {
                continue;
            };
            match aligner.align(chain_a, chain_b) {
                Ok(aln) => {
                    let residues: BTreeMap<_, _> = aln
                        .aligned_pairs()
                        .map(|(i, j)| (chain_a.residues()[i].number, chain_b.residues()[j].number))
                        .collect();
                    debug!("Chains {name_a} -> {name_b}: {} residue pairs", residues.len());
                    corr.insert(name_a.as_str(), residues);
                }
                Err(e) => warn!("Chains {name_a} -> {name_b} have no residue correspondence: {e}"),
            }
        }
        Ok(self.residue_correspondence.get_or_init(|| corr))
    }

    pub fn contacts_a(&self) -> &ContactMap {
        self.contacts_a.get_or_init(|| {
            ContactMap::build(self.complex_a, self.settings.calpha_only, self.settings.contact_distance)
        })
    }

    pub fn contacts_b(&self) -> &ContactMap {
        self.contacts_b.get_or_init(|| {
            ContactMap::build(self.complex_b, self.settings.calpha_only, self.settings.contact_distance)
        })
    }

    /// Superposition of the reduced CA positions of every mapped chain of A
    /// onto its partner in B.
    pub fn superposition(&self) -> Result<&Superposition> {
        if let Some(sup) = self.superposition.get() {
            return Ok(sup);
        }
        let entities = self.entities()?;
        let mut mobile = Vec::new();
        let mut target = Vec::new();
        for (a, b) in self.chain_mapping()?.pairs() {
            if let (Some(ca), Some(cb)) = (entities.a.chain(a), entities.b.chain(b)) {
                if ca.len() == cb.len() {
                    mobile.extend_from_slice(&ca.coords);
                    target.extend_from_slice(&cb.coords);
                }
            }
        }
        let sup = superpose(&mobile, &target)?;
        Ok(self.superposition.get_or_init(|| sup))
    }

    pub fn score_details(&self) -> Result<&QsScoreDetails> {
        if let Some(details) = self.score_details.get() {
            return Ok(details);
        }
        let details = qs_score(
            self.contacts_a(),
            self.contacts_b(),
            self.residue_correspondence()?,
            self.chain_mapping()?,
            self.settings.contact_distance,
        );
        debug!("{details:?}");
        Ok(self.score_details.get_or_init(|| details))
    }

    pub fn score(&self) -> Result<QsScore> {
        Ok(self.score_details()?.score())
    }

    /// Chains of each complex that take part in the chain mapping.
    pub fn mapped_chains(&self) -> Result<(HashSet<&str>, HashSet<&str>)> {
        let mapping = self.chain_mapping()?;
        Ok((
            mapping.pairs().iter().map(|(a, _)| a.as_str()).collect(),
            mapping.pairs().iter().map(|(_, b)| b.as_str()).collect(),
        ))
    }
}
