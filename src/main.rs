use clap::{Parser, ValueEnum};
use lineage_solver::io::{read_character_matrix, write_newick};
use lineage_solver::{LineageTree, Solver, SolverConfig, SplitStrategy};
use std::path::PathBuf;
use std::time::Instant;

/// Reconstruct a lineage tree from a character matrix (TSV) and write it as
/// Newick.
#[derive(Parser, Debug)]
#[command(name = "lineage-solver", version, about = "Top-down lineage tree reconstruction")]
struct Args {
    /// Path to the character matrix TSV (optionally .gz)
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path for the Newick tree (.gz compresses)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Split strategy: greedy | spectral | spectral-greedy
    #[arg(long = "solver", value_enum, default_value_t = SolverArg::Greedy)]
    solver: SolverArg,

    /// Integer used for missing states in the matrix
    #[arg(short = 'm', long = "missing", default_value_t = -1, allow_hyphen_values = true)]
    missing: i32,

    /// Similarity threshold below which samples share no graph edge
    #[arg(short = 't', long = "threshold", default_value_t = 0.0)]
    threshold: f64,

    /// Maximum improving moves per hill-climbing refinement
    #[arg(long = "max-moves")]
    max_moves: Option<usize>,

    /// Solve both halves of every split in parallel
    #[arg(long = "parallel", default_value_t = false)]
    parallel: bool,

    /// Quiet mode: suppresses progress messages on stdout
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SolverArg { Greedy, Spectral, SpectralGreedy }

impl From<SolverArg> for SplitStrategy {
    fn from(arg: SolverArg) -> Self {
        match arg {
            SolverArg::Greedy => SplitStrategy::Greedy,
            SolverArg::Spectral => SplitStrategy::Spectral,
            SolverArg::SpectralGreedy => SplitStrategy::SpectralGreedy,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let t0 = Instant::now();
    let matrix = match read_character_matrix(&args.input, args.missing) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to read {:?}: {e}", args.input);
            std::process::exit(2);
        }
    };
    let read_s = t0.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Reading character matrix {read_s:.3}s"));
    log_if(!args.quiet, format!("Read in {} samples over {} characters", matrix.n_samples(), matrix.n_characters()));

    let mut config = SolverConfig::default()
        .with_threshold(args.threshold)
        .with_parallel(args.parallel);
    if let Some(moves) = args.max_moves {
        config = config.with_max_hill_climb_moves(moves);
    }
    let solver = Solver::with_config(args.solver.into(), config);

    let t1 = Instant::now();
    let mut tree = LineageTree::new(matrix);
    if let Err(e) = solver.solve(&mut tree) {
        eprintln!("Failed to reconstruct tree: {e}");
        std::process::exit(3);
    }
    let solve_s = t1.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Solving with {:?} {solve_s:.3}s", args.solver));

    let t2 = Instant::now();
    let written = tree
        .to_newick()
        .map_err(|e| e.to_string())
        .and_then(|newick| write_newick(&args.output, &newick).map_err(|e| e.to_string()));
    if let Err(e) = written {
        eprintln!("Failed to write output {:?}: {e}", args.output);
        std::process::exit(4);
    }
    let write_s = t2.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Writing to output {write_s:.3}s"));
}

fn log_if(show: bool, msg: String) {
    if show { println!("{}", msg); }
}
