use super::load_complex;
use clap::Parser;
use qscore::align::GlobalAligner;
use qscore::chem::group_chains;
use qscore::ChainExt;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Path to the PDB or mmCIF file to be analyzed
    input: Vec<PathBuf>,

    /// Sequence identity (0-1) above which chains are chemically identical
    #[arg(long = "seq-id", default_value_t = 0.95)]
    seq_id: f64,
}

pub(crate) fn run(args: &Args) {
    let aligner = GlobalAligner::default();
    for f in &args.input {
        let Some((complex, pdb)) = load_complex(f) else {
            continue;
        };

        // Print sequences and chemical groups
        println!("File: {}", f.display());
        for chain in pdb.chains() {
            println!("{}: {}", chain.id(), chain.pdb_seq().join(""));
        }
        for (k, group) in group_chains(&complex, &aligner, args.seq_id, true)
            .iter()
            .enumerate()
        {
            println!("Group {k}: {}", group.chains().join(","));
        }
        println!();
    }
}
