//! Argument parsing and the merge of flags over `rowfarm.toml`.

use crate::config::FarmConfig;
use crate::CliError;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use rowfarm_runtime::{RunConfig, Strategy};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "rowfarm",
    version,
    about = "Row-parallel matrix multiplication with on-demand scheduling"
)]
pub struct Cli {
    /// Increase log detail on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    pub log_level: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Multiply two generated N×N matrices and print the checksum of C
    Run(RunArgs),
    /// Create a rowfarm.toml config file in the current directory
    Init,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Matrix side N
    #[arg(long, short = 'n')]
    pub size: Option<usize>,

    /// Seed for the deterministic fill of A and B
    #[arg(long, short = 's')]
    pub seed: Option<u32>,

    /// Worker threads, excluding the coordinator (0 = one per CPU)
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Scheduling strategy: dynamic or static
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Abort when no worker replies within this many milliseconds (0 = wait forever)
    #[arg(long = "timeout-ms")]
    pub timeout_ms: Option<u64>,

    /// Print A, B and C (only when N <= 10)
    #[arg(long)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    pub format: Format,
}

/// Everything a run needs once flags and file have been reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub run: RunConfig,
    pub verbose: bool,
    pub format: Format,
}

pub const DEFAULT_SEED: u32 = 42;

impl RunArgs {
    /// Overlay these flags on `file`. The matrix size must come from one
    /// of the two.
    pub fn resolve(&self, file: &FarmConfig) -> Result<Settings, CliError> {
        let size = self.size.or(file.size).ok_or(CliError::MissingSize)?;
        if size == 0 {
            return Err(CliError::InvalidArgument(
                "matrix size must be at least 1".into(),
            ));
        }
        let seed = self.seed.or(file.seed).unwrap_or(DEFAULT_SEED);
        let workers = self.workers.or(file.workers).unwrap_or(0);
        let strategy = self.strategy.or(file.strategy).unwrap_or_default();
        let recv_timeout = self
            .timeout_ms
            .or(file.recv_timeout_ms)
            .filter(|&ms| ms > 0)
            .map(Duration::from_millis);

        Ok(Settings {
            run: RunConfig::new(size, seed, workers)
                .with_strategy(strategy)
                .with_recv_timeout(recv_timeout),
            verbose: self.verbose || file.verbose.unwrap_or(false),
            format: self.format,
        })
    }
}
