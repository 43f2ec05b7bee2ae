// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Run the manycore traffic-generator regressions.
//!
//! See `lib.rs` for details.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use manycore_regression::config::{Overrides, RegressionConfig};
use manycore_regression::report::Report;
use manycore_regression::{linear_inorder, test_dram};
use manycore_sim::sim_error;
use manycore_sim::types::SimError;
use manycore_track::entity::toplevel;
use manycore_track::{Track, error, info};

/// Command-line arguments.
#[derive(Parser)]
#[command(about = "Manycore DPI tile regression tests")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML file to read configuration from.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Clone, Copy, Subcommand)]
enum Command {
    /// Strided divide over every tile, synchronised by barriers.
    LinearInorder,
    /// Sum a DRAM buffer on the last tile.
    TestDram,
    /// Run every regression.
    All,
}

fn main() -> Result<(), SimError> {
    let cli = Cli::parse();

    let mut config = RegressionConfig::load(cli.config.as_deref())?;
    config.apply_overrides(&cli.overrides);

    let tracker = config.log.setup_trackers()?;
    let top = toplevel(&tracker, "top");

    let mut reports: Vec<Report> = Vec::new();
    if matches!(cli.command, Command::LinearInorder | Command::All) {
        reports.push(linear_inorder::host::run(&top, &config)?);
    }
    if matches!(cli.command, Command::TestDram | Command::All) {
        reports.push(test_dram::host::run(&top, &config)?);
    }

    let failed: Vec<&str> = reports
        .iter()
        .filter(|r| !r.passed())
        .map(|r| r.program)
        .collect();
    if failed.is_empty() {
        info!(top ; "all {} regressions passed", reports.len());
    } else {
        error!(top ; "failed: {}", failed.join(", "));
    }

    tracker.shutdown();

    if failed.is_empty() {
        Ok(())
    } else {
        sim_error!(format!("{} regressions failed", failed.len()))
    }
}
