use anyhow::Result;
use clap::{Parser, Subcommand};

mod inspect;
mod parse;
mod run;

#[derive(Parser)]
#[command(name = "ftgs", about = "Exercise and inspect the FTGS aggregation engine")]
struct Opt {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Builds a synthetic packed table, runs a TGS pass over it, and prints
  /// the resulting per-group sums.
  Run(run::RunOpt),
  /// Builds a synthetic packed table and prints its derived layout
  /// (lanes per row, boolean columns, byte offsets) without running a pass.
  Inspect(inspect::InspectOpt),
}

fn main() -> Result<()> {
  let opt = Opt::parse();
  match opt.command {
    Command::Run(o) => run::run(o),
    Command::Inspect(o) => inspect::inspect(o),
  }
}
