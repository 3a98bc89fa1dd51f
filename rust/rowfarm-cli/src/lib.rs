//! Rowfarm CLI library: argument handling, config discovery and output,
//! kept out of the binary so they can be tested directly.

pub mod cli;
pub mod config;
pub mod output;

use cli::{Command, Format, Settings};
use config::FarmConfig;
use rowfarm_core::{Matrix, MatrixTag};
use rowfarm_runtime::RunError;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("matrix size is required (pass --size or set `size` in rowfarm.toml)")]
    MissingSize,
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{} already exists, not overwriting", .0.display())]
    AlreadyInitialized(PathBuf),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("cannot encode report: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Dispatch a parsed command line, writing results to `out`.
pub fn execute(command: Command, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Command::Run(args) => {
            let file = FarmConfig::load()?.map(|(_, cfg)| cfg).unwrap_or_default();
            let settings = args.resolve(&file)?;
            run(&settings, out)
        }
        Command::Init => {
            let path = init(&std::env::current_dir()?)?;
            writeln!(out, "Created {}", path.display())?;
            Ok(())
        }
    }
}

/// Perform one run and print it in the requested format.
pub fn run(settings: &Settings, out: &mut impl Write) -> Result<(), CliError> {
    let report = rowfarm_runtime::run(&settings.run)?;
    match settings.format {
        Format::Json => writeln!(out, "{}", output::render_json(&report)?)?,
        Format::Text => {
            // A and B are regenerated here rather than carried in the report.
            let operands = if settings.verbose && report.size <= output::PRINT_LIMIT {
                let seed = settings.run.seed;
                Some((
                    Matrix::filled(report.size, seed, MatrixTag::A).map_err(RunError::from)?,
                    Matrix::filled(report.size, seed, MatrixTag::B).map_err(RunError::from)?,
                ))
            } else {
                None
            };
            let text = output::render_text(&report, operands.as_ref().map(|(a, b)| (a, b)));
            write!(out, "{text}")?;
        }
    }
    Ok(())
}

/// Write the default `rowfarm.toml` into `dir`, refusing to overwrite.
pub fn init(dir: &Path) -> Result<PathBuf, CliError> {
    let path = dir.join(config::FILE_NAME);
    if path.exists() {
        return Err(CliError::AlreadyInitialized(path));
    }
    std::fs::write(&path, FarmConfig::default_template())?;
    tracing::info!(path = %path.display(), "wrote config template");
    Ok(path)
}
