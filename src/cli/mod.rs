pub(crate) mod chains;
pub(crate) mod contacts;
pub(crate) mod qs;

use qscore::{load_model, Complex};
use std::path::Path;
use tracing::{error, warn};

/// Load a structure file and reduce its first model to a [`Complex`] named
/// after the file. Problems are logged; `None` means the file is unusable.
pub(crate) fn load_complex(path: &Path) -> Option<(Complex, pdbtbx::PDB)> {
    // Make sure `input` exists
    let input_path = match path.canonicalize() {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to retrieve input file {}: {e}", path.display());
            return None;
        }
    };
    let input_file = input_path.to_string_lossy().to_string();

    let (pdb, pdb_warnings) = match load_model(&input_file) {
        Ok(res) => res,
        Err(e) => {
            error!("{e}");
            return None;
        }
    };
    pdb_warnings.iter().for_each(|e| match e.level() {
        pdbtbx::ErrorLevel::BreakingError => error!("{e}"),
        pdbtbx::ErrorLevel::InvalidatingError => error!("{e}"),
        _ => warn!("{e}"),
    });

    let name = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| input_file.clone());
    match Complex::from_pdb(name, &pdb) {
        Ok(complex) => Some((complex, pdb)),
        Err(e) => {
            error!("{input_file}: {e}");
            None
        }
    }
}
