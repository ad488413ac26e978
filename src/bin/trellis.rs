//! Trellis CLI — offline topology validation and analysis.
//!
//! Usage:
//!   trellis check <file>
//!   trellis analyse <file>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use trellis::analysis;
use trellis::config::{StubResolver, TopologyConfig};

#[derive(Parser)]
#[command(
    name = "trellis",
    version,
    about = "Message-routing core for pipeline data integration"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a topology file: parse, build, cycle check, node self-checks
    Check {
        /// Path to a YAML or JSON topology file
        file: PathBuf,
    },
    /// Classify nodes and report suspicious configurations
    Analyse {
        /// Path to a YAML or JSON topology file
        file: PathBuf,
    },
}

fn load_and_build(file: &PathBuf) -> Result<trellis::config::BuiltTopology, String> {
    let config = TopologyConfig::load(file).map_err(|e| format!("Failed to load topology: {e}"))?;
    let resolver = StubResolver::from_config(&config);
    config
        .build(&resolver)
        .map_err(|e| format!("Failed to build topology: {e}"))
}

fn cmd_check(file: &PathBuf) -> i32 {
    let built = match load_and_build(file) {
        Ok(built) => built,
        Err(message) => {
            eprintln!("Error: {message}");
            return 1;
        }
    };

    if let Err(e) = built.map.ensure_acyclic() {
        eprintln!("Error: {e}");
        return 1;
    }

    let issues = built.map.validate_nodes();
    for issue in &issues {
        eprintln!("Issue: {issue}");
    }
    if !issues.is_empty() {
        return 1;
    }

    println!(
        "topology OK: {} nodes, {} fault kinds",
        built.map.known_nodes().len(),
        built.catalog.len()
    );
    0
}

fn cmd_analyse(file: &PathBuf) -> i32 {
    let built = match load_and_build(file) {
        Ok(built) => built,
        Err(message) => {
            eprintln!("Error: {message}");
            return 1;
        }
    };

    let report = analysis::analyse(&built.map, &built.registry);
    print!("{report}");
    if report.is_clean() {
        0
    } else {
        1
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Check { file } => cmd_check(&file),
        Commands::Analyse { file } => cmd_analyse(&file),
    };
    std::process::exit(code);
}
