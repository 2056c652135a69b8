use crate::error::{QsError, Result};
use crate::residues::ResidueExt;
use crate::settings::MIN_CHAIN_LENGTH;
use crate::structure::{Chain as QsChain, Complex};
use pdbtbx::*;
use tracing::{debug, warn};

pub trait ChainExt {
    fn pdb_seq(&self) -> Vec<&str>;

    /// The amino acid residues of the chain that have a CA atom.
    fn to_qs_chain(&self) -> QsChain;
}

impl ChainExt for Chain {
    fn pdb_seq(&self) -> Vec<&str> {
        // Load the amino acid sequence for each chain
        self.residues().filter_map(|res| res.resn()).collect()
    }

    fn to_qs_chain(&self) -> QsChain {
        QsChain::new(
            self.id(),
            self.residues().filter_map(|res| res.to_qs_residue()).collect(),
        )
    }
}

impl Complex {
    /// Build a complex from the first model of a structure.
    ///
    /// Chains shorter than [`MIN_CHAIN_LENGTH`] residues are dropped. The
    /// complex is flagged as CA-only when no atom other than CA is present.
    pub fn from_pdb(name: impl Into<String>, pdb: &PDB) -> Result<Self> {
        let name = name.into();
        let model = pdb
            .models()
            .next()
            .ok_or_else(|| QsError::Structure(format!("{name} contains no models")))?;

        let mut chains = Vec::new();
        for chain in model.chains() {
            let qs_chain = chain.to_qs_chain();
            if qs_chain.len() < MIN_CHAIN_LENGTH {
                warn!(
                    "{name}: chain {} has {} residues and is dropped",
                    chain.id(),
                    qs_chain.len()
                );
                continue;
            }
            chains.push(qs_chain);
        }

        let ca_only = model.atoms().all(|atom| atom.name() == "CA");
        debug!(
            "{name}: {} chains{}",
            chains.len(),
            if ca_only { " (CA only)" } else { "" }
        );
        Complex::new(name, chains, ca_only)
    }
}
