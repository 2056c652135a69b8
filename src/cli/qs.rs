use super::load_complex;
use clap::Parser;
use qscore::chem::ChemMapping;
use qscore::superpose::Superposition;
use qscore::symmetry::SymmetryOutcome;
use qscore::{
    run_with_threads, tables, write_df_to_file, ChainMapping, DataFrameFileType, QsScoreDetails,
    Complex, QsScorer, QsSettings,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, error, info, trace, warn};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Path to the model PDB or mmCIF file
    #[arg(short, long)]
    model: PathBuf,

    /// Path to the reference PDB or mmCIF file
    #[arg(short, long)]
    reference: PathBuf,

    /// Output directory for the mapping and contact tables
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output file type of the tables
    #[arg(short = 't', long, default_value_t = DataFrameFileType::Csv)]
    output_format: DataFrameFileType,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Distance cutoff for residue-residue contacts (Å)
    #[arg(short = 'd', long = "contact-distance", default_value_t = 12.0)]
    contact_distance: f64,

    /// Use CA instead of CB atoms for contacts
    #[arg(long = "calpha-only", default_value_t = false)]
    calpha_only: bool,

    /// Match residues by residue number instead of sequence alignment
    #[arg(long = "res-num-alignment", default_value_t = false)]
    res_num_alignment: bool,

    /// Maximum number of aligned CA atoms per chain used for superpositions
    #[arg(long = "max-ca-per-chain", default_value_t = 100)]
    max_ca_per_chain: usize,

    /// Maximum number of chain mappings to enumerate before giving up
    #[arg(long = "max-mappings", default_value_t = 100_000)]
    max_mapping_candidates: u64,

    /// Sequence identity (0-1) above which chains are chemically identical
    #[arg(long = "seq-id", default_value_t = 0.95)]
    chem_group_seq_id: f64,

    /// Number of threads to use for parallel processing (0 for all cores)
    #[arg(short = 'j', long = "num-threads", default_value_t = 0)]
    num_threads: usize,
}

impl Args {
    fn settings(&self) -> QsSettings {
        QsSettings {
            contact_distance: self.contact_distance,
            calpha_only: self.calpha_only,
            res_num_alignment: self.res_num_alignment,
            max_ca_per_chain: self.max_ca_per_chain,
            max_mapping_candidates: u128::from(self.max_mapping_candidates),
            chem_group_seq_id: self.chem_group_seq_id,
            enable_parallel: self.num_threads != 1,
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    model: &'a str,
    reference: &'a str,
    qs_best: f64,
    qs_global: f64,
    details: &'a QsScoreDetails,
    chem_mapping: &'a ChemMapping,
    symmetry: Option<&'a SymmetryOutcome>,
    chain_mapping: &'a ChainMapping,
    superposition: Option<&'a Superposition>,
}

pub(crate) fn run(args: &Args) {
    trace!("{args:?}");

    let Some((model, _)) = load_complex(&args.model) else {
        return;
    };
    let Some((reference, _)) = load_complex(&args.reference) else {
        return;
    };
    debug!(
        "Model chains {:?}; reference chains {:?}",
        model.chain_names(),
        reference.chain_names()
    );

    run_with_threads(args.num_threads, || {
        debug!("Using {} thread(s)", rayon::current_num_threads());
        report(args, &model, &reference)
    });
}

/// Score the two complexes, then print and save the results.
fn report(args: &Args, model: &Complex, reference: &Complex) {
    let scorer = QsScorer::new(model, reference).with_settings(args.settings());
    let details = match scorer.score_details() {
        Ok(details) => details,
        Err(e) => {
            error!("{e}");
            return;
        }
    };
    // Everything below is cached by the scorer
    let (Ok(chem_mapping), Ok(chain_mapping)) = (scorer.chem_mapping(), scorer.chain_mapping()) else {
        return;
    };
    let symmetry = scorer.symmetry().ok();
    let superposition = match scorer.superposition() {
        Ok(sup) => Some(sup),
        Err(e) => {
            warn!("{e}");
            None
        }
    };

    if let Ok((mapped_a, mapped_b)) = scorer.mapped_chains() {
        for name in model.chain_names().iter().filter(|c| !mapped_a.contains(*c)) {
            info!("Model chain {name} is not mapped");
        }
        for name in reference.chain_names().iter().filter(|c| !mapped_b.contains(*c)) {
            info!("Reference chain {name} is not mapped");
        }
    }

    if args.json {
        let summary = Summary {
            model: model.name(),
            reference: reference.name(),
            qs_best: details.best,
            qs_global: details.global,
            details,
            chem_mapping,
            symmetry,
            chain_mapping,
            superposition,
        };
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Failed to serialize the results: {e}"),
        }
    } else {
        println!("Model: {}", model.name());
        println!("Reference: {}", reference.name());
        for pair in chem_mapping.pairs() {
            println!(
                "Chemical groups: {} -> {} (identity {:.3})",
                pair.group_a.chains().join(","),
                pair.group_b.chains().join(","),
                pair.identity
            );
        }
        if let Some(symmetry) = symmetry {
            println!("Symmetry (model): {:?}", symmetry.a().tuples());
            println!("Symmetry (reference): {:?}", symmetry.b().tuples());
        }
        let pairs: Vec<String> = chain_mapping
            .pairs()
            .iter()
            .map(|(a, b)| format!("{a}->{b}"))
            .collect();
        println!("Chain mapping: {}", pairs.join(" "));
        if let Some(sup) = superposition {
            println!("RMSD: {:.3} ({} CA atoms)", sup.rmsd, sup.n_atoms);
        }
        println!("QS-best: {:.4}", details.best);
        println!("QS-global: {:.4}", details.global);
    }

    if let Some(output) = &args.output {
        let _ = std::fs::create_dir_all(output);
        let mut frames = vec![
            ("chem_mapping", tables::chem_mapping_to_df(chem_mapping)),
            ("chain_mapping", tables::chain_mapping_to_df(chain_mapping)),
            ("contacts_model", tables::contacts_to_df(scorer.contacts_a())),
            ("contacts_reference", tables::contacts_to_df(scorer.contacts_b())),
        ];
        if let Ok(corr) = scorer.residue_correspondence() {
            frames.push((
                "residue_mapping",
                tables::residue_correspondence_to_df(corr, chain_mapping),
            ));
        }
        for (name, df) in frames {
            let output_file = output.join(name);
            let res = df.and_then(|mut df| write_df_to_file(&mut df, &output_file, args.output_format));
            match res {
                Ok(()) => info!(
                    "Results saved to {}",
                    output_file.with_extension(args.output_format.to_string()).display()
                ),
                Err(e) => error!("Failed to write {name}: {e}"),
            }
        }
    }
}
