//! Scoring settings.

/// Residue pairs closer than this (Å) form a contact
pub const CONTACT_DISTANCE: f64 = 12.0;
/// Minimum sequence identity for two chains to share a chemical group
pub const CHEM_GROUP_SEQ_ID: f64 = 0.95;
/// Cap on aligned CA positions per chain in the reduced comparison entity
pub const MAX_CA_PER_CHAIN: usize = 100;
/// A rigid-body fit needs at least this many aligned positions
pub const MIN_ALIGNED_POSITIONS: usize = 5;
/// Chains shorter than this are removed during cleanup
pub const MIN_CHAIN_LENGTH: usize = 20;
/// Ceiling on enumerated chain mappings in the combinatorial fallback
pub const MAX_MAPPING_CANDIDATES: u128 = 100_000;
/// (radius in Å, required coverage) for the closed-symmetry check, strictest first
pub const OVERLAP_LEVELS: [(f64, f64); 3] = [(4.0, 0.8), (6.0, 0.4), (8.0, 0.2)];
/// Clustering distance cutoffs tried while looking for symmetry groups
pub const SYMMETRY_THRESHOLDS: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];
/// RMSD differences below this are ties; the first candidate found wins
pub const RMSD_TIE_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct QsSettings {
    /// Contact distance cutoff in Å
    pub contact_distance: f64,
    /// Use CA instead of CB for contacts
    pub calpha_only: bool,
    /// Derive residue correspondences from residue numbers instead of alignments
    pub res_num_alignment: bool,
    /// Cap on aligned CA positions per chain used for superpositions
    pub max_ca_per_chain: usize,
    /// Ceiling on enumerated chain mappings
    pub max_mapping_candidates: u128,
    /// Sequence identity (0-1) above which chains are chemically identical
    pub chem_group_seq_id: f64,
    /// Enable parallel superpositions over chain pairs
    pub enable_parallel: bool,
}

impl Default for QsSettings {
    fn default() -> Self {
        Self {
            contact_distance: CONTACT_DISTANCE,
            calpha_only: false,
            res_num_alignment: false,
            max_ca_per_chain: MAX_CA_PER_CHAIN,
            max_mapping_candidates: MAX_MAPPING_CANDIDATES,
            chem_group_seq_id: CHEM_GROUP_SEQ_ID,
            enable_parallel: true,
        }
    }
}
