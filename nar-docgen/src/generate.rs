//! Glue between the configuration and the documentation generator.

use crate::config::Config;
use anyhow::{Context, Result};
use nar_extension::{
    Coordinate, DependencyLockfile, DocumentationGenerator, DocumentationReport, LocalRepository,
    ModuleContextBuilder,
};
use std::path::PathBuf;
use tracing::info;

/// Result of one generator run.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub report: DocumentationReport,
    pub written: Vec<PathBuf>,
}

/// Document `module` as described by `config`, never exposing `excluded`.
pub fn generate(
    config: &Config,
    module: &Coordinate,
    excluded: &[Coordinate],
) -> Result<GenerationOutcome> {
    let lockfile_path = config
        .repository
        .lockfile
        .as_ref()
        .context("No dependency lockfile configured (set repository.lockfile or pass --lockfile)")?;
    let lockfile = DependencyLockfile::from_file(lockfile_path).with_context(|| {
        format!("Failed to load dependency lockfile: {}", lockfile_path.display())
    })?;

    let repository = LocalRepository::new(config.local_repository()?);
    info!(
        "Using {} locked artifacts and repository {}",
        lockfile.len(),
        repository.root().display()
    );

    let mut builder =
        ModuleContextBuilder::new(lockfile, repository).with_config(config.foundation.clone());
    for coordinate in excluded {
        builder = builder.exclude(coordinate.clone());
    }

    let generator = DocumentationGenerator::new(builder, config.discovery.clone());
    let report = generator.generate(module);

    let written = report
        .write(&config.output.directory, &config.output.formats)
        .with_context(|| {
            format!(
                "Failed to write documentation to {}",
                config.output.directory.display()
            )
        })?;

    Ok(GenerationOutcome { report, written })
}
