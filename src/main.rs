//! Runbook command line entry point.

use anyhow::Result;
use runbook::cli::{self, Cli};
use runbook::config::{self, CommonConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // The config file can raise verbosity; -v flags can only raise it
    // further.
    let mut common = CommonConfig::default();
    config::read_config_file(&mut common, cli.cfg.as_deref())?;
    init_logging(cli.verbose.max(common.verbosity));

    let exit_code = match cli::run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    };

    std::process::exit(exit_code);
}

/// Maps -v counts onto the tracing filter, overridable via RUST_LOG.
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
