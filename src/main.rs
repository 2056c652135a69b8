mod cli;

use clap::{Parser, Subcommand};
use tracing::Level;

/// Quaternary structure similarity of protein complexes
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity of the program:
    /// -v for info, -vv for debug, and -vvv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the QS-score between a model and a reference complex
    Qs(cli::qs::Args),
    /// Write the inter-chain residue contacts of a complex
    Contacts(cli::contacts::Args),
    /// Print chain sequences and chemical groups
    Chains(cli::chains::Args),
}

fn main() {
    let args = Cli::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match &args.command {
        Commands::Qs(args) => cli::qs::run(args),
        Commands::Contacts(args) => cli::contacts::run(args),
        Commands::Chains(args) => cli::chains::run(args),
    }
}
