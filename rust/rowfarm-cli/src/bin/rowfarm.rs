//! `rowfarm` command-line entry point.

use clap::Parser;
use rowfarm_cli::cli::Cli;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

fn red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

/// Logs go to stderr. `RUST_LOG` wins over `-v` when set.
fn init_logging(level: u8) {
    let default = match level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let mut stdout = std::io::stdout().lock();
    if let Err(e) = rowfarm_cli::execute(cli.command, &mut stdout) {
        let label = if std::io::stderr().is_terminal() {
            red("error:")
        } else {
            "error:".to_string()
        };
        eprintln!("{} {}", label, e);
        std::process::exit(1);
    }
}
