//! compare-impls: check a candidate off-target search tool against a reference.
//!
//! Usage: compare-impls [OPTIONS] <INPUT_FILE> <DEVICE_SELECTOR>
//!
//! Exit status: 0 when the outputs agree, 1 when they differ, 2 when the
//! comparison could not be run.

use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process;

use offtarget_oracle::commands::{CompareCommand, DeviceSelector, Report, TieBreak};
use offtarget_oracle::config::OracleConfig;
use offtarget_oracle::error::OracleError;

#[derive(Parser)]
#[command(name = "compare-impls")]
#[command(version)]
#[command(about = "Compare a candidate off-target search implementation against a trusted reference", long_about = None)]
struct Cli {
    /// Search specification file passed to both programs
    input_file: PathBuf,

    /// Backend selector passed to the candidate (e.g. C, G, A)
    device_selector: String,

    /// Candidate executable [env: COMPARE_IMPLS_CANDIDATE]
    #[arg(long)]
    candidate: Option<PathBuf>,

    /// Reference executable used to generate gold output [env: COMPARE_IMPLS_REFERENCE]
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Run the candidate and gold generation concurrently
    #[arg(long)]
    parallel: bool,

    /// Order records with equal sort keys by their full line instead of
    /// input order
    #[arg(long)]
    full_line_ties: bool,

    /// Maximum unified-diff lines printed when outputs differ
    #[arg(long, default_value_t = offtarget_oracle::commands::DEFAULT_MAX_DIFF_LINES)]
    max_diff_lines: usize,

    /// Print canonicalization statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Number of threads to use (default: number of CPUs)
    #[arg(long, short = 't')]
    threads: Option<usize>,
}

fn run(cli: Cli) -> Result<Report, OracleError> {
    // Flags take precedence over the environment
    let mut config = OracleConfig::from_env();
    if let Some(path) = cli.candidate {
        config = config.with_candidate(path);
    }
    if let Some(path) = cli.reference {
        config = config.with_reference(path);
    }

    let device = DeviceSelector::new(cli.device_selector)?;

    let mut cmd = CompareCommand::new(config);
    cmd.parallel = cli.parallel;
    cmd.max_diff_lines = cli.max_diff_lines;
    cmd.stats = cli.stats;
    if cli.full_line_ties {
        cmd.sorter = cmd.sorter.with_tie_break(TieBreak::FullLine);
    }

    let stderr = io::stderr();
    let mut diag = stderr.lock();
    cmd.run(&cli.input_file, &device, &mut diag)
}

fn main() {
    let cli = Cli::parse();

    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
        {
            eprintln!("Error: failed to initialize thread pool: {}", e);
            process::exit(offtarget_oracle::error::EXIT_HARNESS_FAILURE);
        }
    }

    match run(cli) {
        Ok(report) => process::exit(report.exit_code()),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}
