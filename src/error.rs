//! Error type shared by all scoring stages.

use thiserror::Error;

/// Errors raised while comparing two complexes.
///
/// Only [`QsError::InvalidInput`], [`QsError::NoChemMapping`] and
/// [`QsError::CombinatorialOverflow`] abort a score computation. Alignment
/// failures are logged and the affected chain or group is left unmapped.
#[derive(Debug, Error)]
pub enum QsError {
    /// The complex violates the structural invariants of the scorer
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A pairwise or multiple sequence alignment could not be produced
    #[error("Alignment failed: {0}")]
    AlignmentFailure(String),

    /// Coordinate sets that cannot be superposed
    #[error("Superposition failed: {0}")]
    Superposition(String),

    /// Too many chain mappings to enumerate
    #[error("Too many possible chain mappings ({candidates} > {limit})")]
    CombinatorialOverflow {
        /// Number of candidate mappings that would have been enumerated
        candidates: u128,
        /// The configured ceiling
        limit: u128,
    },

    /// None of the chemical groups could be paired between the complexes
    #[error("No chemical group could be mapped between {0} and {1}")]
    NoChemMapping(String, String),

    /// The structure provider rejected the input file
    #[error("Failed to load structure: {0}")]
    Structure(String),
}

/// Shorthand used across the crate.
pub type Result<T> = std::result::Result<T, QsError>;
