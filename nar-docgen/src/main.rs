//! # nar-docgen
//!
//! Generates extension documentation for a NAR module.
//!
//! The generator:
//! - Builds the module's chain of loading contexts from a dependency lockfile
//!   and a local Maven-layout repository
//! - Discovers the processors, controller services and reporting tasks the
//!   chain registers
//! - Writes `META-INF/extension-docs.xml` and, on request, per-extension
//!   `.properties` documents and a JSON summary
//!
//! ## Configuration
//!
//! Settings are read from `$XDG_CONFIG_HOME/nar-docgen/config.toml` unless
//! `--config` names another file. Command-line options override the file.
//!
//! ## Running
//!
//! ```bash
//! nar-docgen org.example:example-nar:nar:1.0 --lockfile nar-deps.lock
//!
//! # With debug logging
//! RUST_LOG=debug nar-docgen org.example:example-nar:nar:1.0 --lockfile nar-deps.lock
//! ```

use anyhow::Result;
use clap::Parser;
use nar_docgen::config::Config;
use nar_docgen::generate::generate;
use nar_extension::{Coordinate, OutputFormat};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Generate extension documentation for a NAR module
#[derive(Parser, Debug)]
#[command(name = "nar-docgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Module coordinate, e.g. org.example:example-nar:nar:1.0
    module: Coordinate,

    /// Configuration file (default: $XDG_CONFIG_HOME/nar-docgen/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dependency lockfile listing each module's dependency closure
    #[arg(short, long)]
    lockfile: Option<PathBuf>,

    /// Root of the local Maven-layout repository
    #[arg(short, long)]
    repository: Option<PathBuf>,

    /// Directory below which META-INF/ is written
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format; may be repeated (xml, properties, json)
    #[arg(short, long = "format")]
    formats: Vec<OutputFormat>,

    /// Artifact never exposed to the module, e.g. this tool's own coordinate
    #[arg(long)]
    exclude: Vec<Coordinate>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    if let Some(lockfile) = &cli.lockfile {
        config.repository.lockfile = Some(lockfile.clone());
    }
    if let Some(repository) = &cli.repository {
        config.repository.local = Some(repository.clone());
    }
    if let Some(output) = &cli.output {
        config.output.directory = output.clone();
    }
    if !cli.formats.is_empty() {
        config.output.formats = cli.formats.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = load_config(&cli);
    let level = match (&config, cli.verbose) {
        (_, true) => "debug",
        (Ok(config), false) => config.log_level.as_str(),
        (Err(_), false) => "info",
    };
    init_logging(level);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting nar-docgen v{}", env!("CARGO_PKG_VERSION"));

    let outcome = match generate(&config, &cli.module, &cli.exclude) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    for path in &outcome.written {
        println!("{}", path.display());
    }

    if !outcome.report.is_documented() {
        warn!("No extensions of {} were documented", cli.module);
    }

    if outcome.report.is_success() {
        ExitCode::SUCCESS
    } else {
        for failure in &outcome.report.failures {
            error!(
                "{} discovery failed: {}",
                failure.extension_type, failure.error
            );
        }
        ExitCode::FAILURE
    }
}
