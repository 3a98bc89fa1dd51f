//! Configuration file parsing for `rowfarm.toml`.
//!
//! Searches current directory then ancestors, falling back to
//! `~/.config/rowfarm/rowfarm.toml` if no project-level file is found.
//! Every key is optional; command-line flags take precedence.

use rowfarm_runtime::Strategy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const FILE_NAME: &str = "rowfarm.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FarmConfig {
    /// Matrix side N.
    pub size: Option<usize>,
    pub seed: Option<u32>,
    /// Worker participants; `0` means one per CPU.
    pub workers: Option<usize>,
    pub strategy: Option<Strategy>,
    /// Give up when no worker replies for this many milliseconds.
    pub recv_timeout_ms: Option<u64>,
    /// Print A, B and C for small runs.
    pub verbose: Option<bool>,
}

impl FarmConfig {
    /// Load the nearest `rowfarm.toml`, if any, along with where it was found.
    ///
    /// A file that exists but cannot be read or parsed is an error rather
    /// than silently ignored.
    pub fn load() -> Result<Option<(PathBuf, Self)>, ConfigError> {
        let cwd = match std::env::current_dir() {
            Ok(dir) => dir,
            Err(_) => return Ok(None),
        };
        match discover(&cwd, dirs::home_dir().as_deref()) {
            Some(path) => {
                let cfg = Self::load_from(&path)?;
                tracing::debug!(path = %path.display(), "loaded config");
                Ok(Some((path, cfg)))
            }
            None => Ok(None),
        }
    }

    /// Load config from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a TOML string directly.
    pub fn parse(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Contents written by `rowfarm init`.
    pub fn default_template() -> &'static str {
        r#"# Rowfarm configuration
# Command-line flags override anything set here.

# Matrix side N (required here or via --size)
size = 512

# Seed for the deterministic fill of A and B
seed = 42

# Worker threads, excluding the coordinator (0 = one per CPU)
workers = 0

# "dynamic" hands rows out on demand; "static" splits them up front
strategy = "dynamic"

# Abort if no worker replies for this long (omit to wait forever)
# recv_timeout_ms = 30000

# Print A, B and C when N <= 10
verbose = false
"#
    }
}

/// Find the config file that applies to `start`: the first `rowfarm.toml`
/// in `start` or its ancestors, else the one under `home/.config/rowfarm`.
pub fn discover(start: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    let global = home?.join(".config").join("rowfarm").join(FILE_NAME);
    global.is_file().then_some(global)
}
