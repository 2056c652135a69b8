use super::load_complex;
use clap::Parser;
use qscore::contacts::ContactMap;
use qscore::{tables, write_df_to_file, DataFrameFileType};
use std::path::PathBuf;
use tracing::{debug, error, info, trace};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Path to the PDB or mmCIF file to be analyzed
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Name of the output file
    #[arg(short = 'f', long = "filename", default_value_t = String::from("contacts"))]
    filename: String,

    /// Output file type
    #[arg(short = 't', long, default_value_t = DataFrameFileType::Csv)]
    output_format: DataFrameFileType,

    /// Distance cutoff for residue-residue contacts (Å)
    #[arg(short, long, default_value_t = 12.0)]
    dist_cutoff: f64,

    /// Use CA instead of CB atoms
    #[arg(long = "calpha-only", default_value_t = false)]
    calpha_only: bool,
}

pub(crate) fn run(args: &Args) {
    trace!("{args:?}");

    let output_path = match std::path::absolute(&args.output) {
        Ok(path) => path,
        Err(e) => {
            error!("Failed to resolve the output directory: {}", e);
            return;
        }
    };
    let Some((complex, _)) = load_complex(&args.input) else {
        return;
    };

    let contacts = ContactMap::build(&complex, args.calpha_only, args.dist_cutoff);
    for (c1, c2) in contacts.chain_pairs() {
        debug!(
            "Chains {c1}-{c2}: {} contacts",
            contacts.chain_pair(c1, c2).map_or(0, |pairs| pairs.len())
        );
    }
    let mut df_contacts = match tables::contacts_to_df(&contacts) {
        Ok(df) => df,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    // Prepare output directory
    let _ = std::fs::create_dir_all(output_path.clone());
    let output_file = output_path.join(args.filename.clone());
    match write_df_to_file(&mut df_contacts, &output_file, args.output_format) {
        Ok(()) => info!(
            "Results saved to {}",
            output_file
                .with_extension(args.output_format.to_string())
                .display()
        ),
        Err(e) => error!("Failed to save results: {e}"),
    }
}
