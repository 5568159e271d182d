use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "neurofb",
    version,
    about = "Motor-imagery neurofeedback session runner",
    long_about = "Runs scripted motor-imagery trials, writes phase markers to the \
                  marker stream and routes classifier output to the feedback display."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one feedback session
    Run(RunArgs),
    /// Write shuffled trial scripts, one file per run
    GenerateSequence(GenerateArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSON configuration file
    #[arg(long, default_value = "bci-config.json")]
    pub config: PathBuf,

    /// Run number; selects <sequence-dir>/<prefix>_run_<N>.txt
    #[arg(long, default_value_t = 1)]
    pub run: u32,

    /// Directory holding the per-run trial scripts
    #[arg(long, default_value = "sequences")]
    pub sequence_dir: PathBuf,

    /// File name prefix of the per-run trial scripts
    #[arg(long, default_value = "MI")]
    pub prefix: String,

    /// Trial script to use instead of the per-run file
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Seed for break sampling and the simulator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Start immediately instead of waiting for START on stdin
    #[arg(long)]
    pub autostart: bool,

    /// Write a per-trial feedback report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Probability that a simulated prediction matches the cued hand
    #[arg(long, default_value_t = 0.8)]
    pub hit_rate: f64,

    /// Simulated classifier output rate in Hz
    #[arg(long, default_value_t = 32.0)]
    pub sample_rate: f64,

    /// Number of simulated regions of interest
    #[arg(long, default_value_t = 2)]
    pub regions: usize,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Condition tokens to repeat
    #[arg(long, num_args = 1.., default_values_t = vec!["MI_r".to_string(), "MI_l".to_string()])]
    pub tasks: Vec<String>,

    /// Repetitions of every task per run
    #[arg(long, default_value_t = 10)]
    pub trials: usize,

    /// Number of run files to write
    #[arg(long, default_value_t = 3)]
    pub runs: u32,

    /// File name prefix
    #[arg(long, default_value = "MI")]
    pub prefix: String,

    /// Output directory
    #[arg(long, default_value = "sequences")]
    pub out_dir: PathBuf,

    /// Seed for shuffling
    #[arg(long)]
    pub seed: Option<u64>,
}
