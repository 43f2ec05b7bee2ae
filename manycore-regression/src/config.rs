// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Run configuration for the regressions.
//!
//! Values are layered, later sources overriding earlier ones:
//!  1. built-in defaults,
//!  2. an optional TOML file,
//!  3. environment variables prefixed with [`ENV_PREFIX`] (nested keys are
//!     separated by `__`, e.g. `MANYCORE_LINEAR_INORDER__NELS=64`),
//!  4. command-line [`Overrides`].

use std::path::Path;

use clap::Args;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use manycore_sim::config::ManycoreConfig;
use manycore_sim::sim_error;
use manycore_sim::types::{Coordinate, SimError};
use manycore_track::builder::{TrackerConfig, TrackersConfig, setup_trackers};
use manycore_track::Tracker;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "MANYCORE_";

/// Parameters of the strided divide regression.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct LinearInorderParams {
    /// Number of elements in the DRAM buffer.
    pub nels: u32,
    /// Number of reads issued by each tile.
    pub niters: u32,
    /// Per-tile start offset multiplier: tile `idx` starts at `pto * idx`.
    pub pto: u32,
    /// Element stride between consecutive reads.
    pub stride: u32,
    /// Seed value every tile's result starts from.
    pub initial: f32,
    /// Seed for the random input buffer.
    pub data_seed: u64,
}

impl Default for LinearInorderParams {
    fn default() -> Self {
        Self {
            nels: 1024,
            niters: 1024,
            pto: 0,
            stride: 1,
            initial: 10000.0,
            data_seed: 42,
        }
    }
}

/// Parameters of the DRAM sum regression.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct TestDramParams {
    /// Number of words (holding `0..len`) to sum.
    pub len: u32,
}

impl Default for TestDramParams {
    fn default() -> Self {
        Self { len: 32 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// Enable logging to the console.
    pub stdout: bool,
    pub stdout_level: log::Level,
    /// Entities matching this regular expression log at the configured
    /// levels; all others only log errors.
    pub filter_regex: String,
    pub log_file: Option<String>,
    pub log_file_level: log::Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stdout_level: log::Level::Info,
            filter_regex: String::new(),
            log_file: None,
            log_file_level: log::Level::Debug,
        }
    }
}

impl LogConfig {
    pub fn setup_trackers(&self) -> Result<Tracker, SimError> {
        let config = TrackersConfig {
            stdout: TrackerConfig {
                enable: self.stdout,
                level: self.stdout_level,
                filter_regex: &self.filter_regex,
                file: None,
            },
            log_file: TrackerConfig {
                enable: self.log_file.is_some(),
                level: self.log_file_level,
                filter_regex: &self.filter_regex,
                file: self.log_file.as_deref(),
            },
        };
        setup_trackers(&config).map_err(|e| SimError(e.to_string()))
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RegressionConfig {
    pub manycore: ManycoreConfig,
    pub linear_inorder: LinearInorderParams,
    pub test_dram: TestDramParams,
    pub log: LogConfig,
    /// Give up waiting on the machine after this many cycles.
    pub timeout_cycles: Option<u64>,
}

impl RegressionConfig {
    fn figment_with_defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(RegressionConfig::default()))
    }

    /// Defaults, then `conf_file` if given, then the environment.
    pub fn figment(conf_file: Option<&Path>) -> Result<Figment, SimError> {
        let mut figment = Self::figment_with_defaults();
        if let Some(conf_file) = conf_file {
            if !conf_file.is_file() {
                return sim_error!(format!("{} is not a file", conf_file.display()));
            }
            figment = figment.merge(Toml::file(conf_file));
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn load(conf_file: Option<&Path>) -> Result<Self, SimError> {
        Self::figment(conf_file)?
            .extract()
            .map_err(|e| SimError(format!("invalid configuration: {e}")))
    }

    pub fn apply_overrides(&mut self, cli: &Overrides) {
        if let Some(x) = cli.dim_x {
            self.manycore.dimension_vcore.x = x;
        }
        if let Some(y) = cli.dim_y {
            self.manycore.dimension_vcore.y = y;
        }
        if let Some(nels) = cli.nels {
            self.linear_inorder.nels = nels;
        }
        if let Some(niters) = cli.niters {
            self.linear_inorder.niters = niters;
        }
        if let Some(pto) = cli.pto {
            self.linear_inorder.pto = pto;
        }
        if let Some(stride) = cli.stride {
            self.linear_inorder.stride = stride;
        }
        if let Some(seed) = cli.data_seed {
            self.linear_inorder.data_seed = seed;
        }
        if let Some(len) = cli.dram_len {
            self.test_dram.len = len;
        }
        if cli.timeout_cycles.is_some() {
            self.timeout_cycles = cli.timeout_cycles;
        }
        if cli.quiet {
            self.log.stdout = false;
        }
        if let Some(level) = cli.stdout_level {
            self.log.stdout_level = level;
        }
        if let Some(filter) = &cli.filter_regex {
            self.log.filter_regex.clone_from(filter);
        }
        if cli.log_file.is_some() {
            self.log.log_file.clone_from(&cli.log_file);
        }
    }

    /// The tile-group every regression runs over: the whole array.
    #[must_use]
    pub fn tile_group(&self) -> (Coordinate, Coordinate) {
        (self.manycore.origin_vcore, self.manycore.dimension_vcore)
    }
}

/// Command-line overrides, applied on top of file and environment values.
#[derive(Args, Clone, Debug, Default)]
pub struct Overrides {
    /// Number of tile columns.
    #[arg(long)]
    pub dim_x: Option<u32>,

    /// Number of tile rows.
    #[arg(long)]
    pub dim_y: Option<u32>,

    /// Elements in the linear_inorder buffer.
    #[arg(long)]
    pub nels: Option<u32>,

    /// Reads issued by each linear_inorder tile.
    #[arg(long)]
    pub niters: Option<u32>,

    /// Per-tile offset multiplier for linear_inorder.
    #[arg(long)]
    pub pto: Option<u32>,

    /// Element stride for linear_inorder.
    #[arg(long)]
    pub stride: Option<u32>,

    /// Seed for the linear_inorder input data.
    #[arg(long)]
    pub data_seed: Option<u64>,

    /// Words summed by test_dram.
    #[arg(long)]
    pub dram_len: Option<u32>,

    /// Cycle limit for each wait on the machine.
    #[arg(long)]
    pub timeout_cycles: Option<u64>,

    /// Disable logging to the console.
    #[arg(long)]
    pub quiet: bool,

    /// Level of log message to display.
    #[arg(long)]
    pub stdout_level: Option<log::Level>,

    /// Set a regular expression for which entities should log at the
    /// configured levels. Others will have level set to `Error`.
    #[arg(long)]
    pub filter_regex: Option<String>,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<String>,
}
