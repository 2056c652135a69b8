//! # QS-score Library
//!
//! This library compares the quaternary structure of two protein complexes.
//! Chemically identical chains are grouped and paired between the complexes,
//! internal rotational symmetry is used to find the chain-to-chain mapping,
//! and the inter-chain contacts of both complexes are compared with a
//! distance-weighted overlap score (QS-best and QS-global).
//!
//! Intermediate results (chemical mapping, symmetry groups, chain mapping,
//! residue correspondences and contact maps) are available through
//! [`QsScorer`], and can be exported as Polars DataFrames.

pub mod align;
mod chains;
pub mod chem;
pub mod contacts;
pub mod entity;
mod error;
pub mod mapping;
mod residues;
pub mod score;
mod scorer;
pub mod settings;
mod structure;
pub mod superpose;
pub mod symmetry;
pub mod tables;
mod utils;

#[cfg(test)]
mod testing;

// Re-export key public types
pub use chains::ChainExt;
pub use error::{QsError, Result};
pub use mapping::ChainMapping;
pub use residues::ResidueExt;
pub use score::{QsScore, QsScoreDetails, ResidueCorrespondence};
pub use scorer::QsScorer;
pub use settings::QsSettings;
pub use structure::{Chain, Complex, Residue, ResidueNumber};
pub use utils::{load_model, run_with_threads, write_df_to_file, DataFrameFileType};

use pdbtbx::PDB;
use tracing::debug;

/// Calculate the QS-score between two structures.
///
/// The first model of each structure is used. `model` is complex A and
/// `reference` complex B in all intermediate results.
///
/// # Example
///
/// ```no_run
/// use qscore::{get_qs_score, load_model, QsSettings};
///
/// let (model, _) = load_model("path/to/model.pdb")?;
/// let (reference, _) = load_model("path/to/reference.pdb")?;
/// let score = get_qs_score(&model, &reference, QsSettings::default())?;
/// println!("QS-best {:.3}, QS-global {:.3}", score.best, score.global);
/// # Ok::<(), qscore::QsError>(())
/// ```
pub fn get_qs_score(model: &PDB, reference: &PDB, settings: QsSettings) -> Result<QsScore> {
    let complex_a = Complex::from_pdb("model", model)?;
    let complex_b = Complex::from_pdb("reference", reference)?;
    let scorer = QsScorer::new(&complex_a, &complex_b).with_settings(settings);
    let score = scorer.score()?;
    debug!("Chain mapping {:?}", scorer.chain_mapping()?.pairs());
    Ok(score)
}
