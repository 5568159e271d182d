use anyhow::{Context, Result, bail};
use neurofb_experiment::{TrialScript, generate_sequence};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::PathBuf;

use crate::cli::GenerateArgs;

/// Writes one shuffled script per run and returns the written paths.
pub fn generate(args: &GenerateArgs) -> Result<Vec<PathBuf>> {
    if args.tasks.is_empty() || args.trials == 0 {
        bail!("need at least one task and one trial per task");
    }
    // Reject tokens the session could not run.
    TrialScript::parse(&args.tasks.join("\n")).context("invalid task token")?;

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("Generating {} run(s) with seed {}", args.runs, seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let mut written = Vec::new();
    for run in 1..=args.runs {
        let sequence = generate_sequence(&args.tasks, args.trials, &mut rng);
        let path = TrialScript::run_path(&args.out_dir, &args.prefix, run);
        let mut text = sequence.join("\n");
        text.push('\n');
        fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
        println!("{}: {} trials", path.display(), sequence.len());
        written.push(path);
    }
    Ok(written)
}
