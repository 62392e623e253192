//! # rewdist
//!
//! Command line front-end. Every subcommand prints a distance table to
//! stdout, or JSON with `--json`.

mod app;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rewdist", version, about = "Compare reward models up to potential shaping")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Distances and closest-reward divergences between the 3x3 gridworld rewards.
    Gridworld {
        #[command(flatten)]
        common: CommonArgs,
        /// Comma-separated subset of reward names.
        #[arg(long, value_delimiter = ',')]
        rewards: Vec<String>,
    },
    /// Distances between the point-mass rewards, using the continuous solver.
    PointMass {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Distance between two tabular rewards loaded from disk.
    Compare {
        first: PathBuf,
        second: PathBuf,
        /// Loader registered for the reward files.
        #[arg(long, default_value = "tabular-json")]
        format: String,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Debug, Args)]
pub(crate) struct CommonArgs {
    /// JSON file with a canonicalization config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the discount of the config.
    #[arg(long)]
    discount: Option<f64>,
    /// Overrides the seed of the config.
    #[arg(long)]
    seed: Option<u64>,
    /// Print JSON instead of tables.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Gridworld { common, rewards } => app::gridworld(&common, &rewards),
        Command::PointMass { common } => app::point_mass(&common),
        Command::Compare {
            first,
            second,
            format,
            common,
        } => app::compare_files(&common, &format, &first, &second),
    }
}
