mod app;
mod cli;
mod control;
mod renderer;
mod sequence;
mod simulate;

use clap::Parser;

use app::App;
use cli::{Cli, Command};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    match cli.command {
        Command::Run(args) => App::new(args)?.run(),
        Command::GenerateSequence(args) => sequence::generate(&args).map(drop),
    }
}
