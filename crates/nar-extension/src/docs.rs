//! Documentation generation for a module.
//!
//! Builds the module's loading context, discovers every documented
//! extension type and writes the requested output formats. Failing to build
//! the context is not an error here: the module may simply contain no
//! extensions, so the report comes back empty.

use crate::artifact::Coordinate;
use crate::builder::ModuleContextBuilder;
use crate::config::DiscoveryConfig;
use crate::definition::{DefinitionMap, ExtensionType};
use crate::discovery::ExtensionDiscovery;
use crate::error::{ExtensionError, ExtensionResult};
use crate::provider::{ArtifactResolver, DependencyGraphProvider};
use crate::writer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

/// Output format for generated documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `META-INF/extension-docs.xml`
    Xml,
    /// `META-INF/docs/<class>.properties`, one per extension
    Properties,
    /// `META-INF/extension-docs.json`
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(OutputFormat::Xml),
            "properties" => Ok(OutputFormat::Properties),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!(
                "unknown output format '{}' (expected xml, properties or json)",
                other
            )),
        }
    }
}

/// Discovery of one extension type that failed.
#[derive(Debug)]
pub struct DiscoveryFailure {
    pub extension_type: ExtensionType,
    pub error: ExtensionError,
}

/// Outcome of documenting one module.
#[derive(Debug)]
pub struct DocumentationReport {
    pub module: Coordinate,

    /// Version of the framework API in the module's foundation context.
    pub api_version: Option<String>,

    /// Definitions of every type whose discovery succeeded.
    pub definitions: DefinitionMap,

    pub failures: Vec<DiscoveryFailure>,
}

impl DocumentationReport {
    fn empty(module: &Coordinate) -> Self {
        Self {
            module: module.clone(),
            api_version: None,
            definitions: DefinitionMap::new(),
            failures: Vec::new(),
        }
    }

    /// Whether the loading context was built and discovery ran.
    pub fn is_documented(&self) -> bool {
        !self.definitions.is_empty() || !self.failures.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of definitions across all types.
    pub fn definition_count(&self) -> usize {
        self.definitions.values().map(|set| set.len()).sum()
    }

    /// Write the requested formats below `output_dir` and return the files
    /// written.
    pub fn write(&self, output_dir: &Path, formats: &[OutputFormat]) -> ExtensionResult<Vec<PathBuf>> {
        if self.definitions.is_empty() {
            debug!("Nothing to document for {}", self.module);
            return Ok(Vec::new());
        }

        let meta_inf = output_dir.join("META-INF");
        fs::create_dir_all(&meta_inf)?;

        let mut written = Vec::new();
        for format in formats {
            match format {
                OutputFormat::Xml => {
                    let path = meta_inf.join("extension-docs.xml");
                    if writer::write_xml(&self.definitions, self.api_version.as_deref(), &path)? {
                        written.push(path);
                    }
                }
                OutputFormat::Json => {
                    let path = meta_inf.join("extension-docs.json");
                    if writer::write_json(&self.definitions, &path)? {
                        written.push(path);
                    }
                }
                OutputFormat::Properties => {
                    let docs = meta_inf.join("docs");
                    fs::create_dir_all(&docs)?;
                    for definition in self.definitions.values().flatten() {
                        let path = docs.join(format!("{}.properties", definition.name));
                        writer::write_properties(definition, &path)?;
                        written.push(path);
                    }
                }
            }
        }

        info!("Wrote {} documentation files for {}", written.len(), self.module);
        Ok(written)
    }
}

/// Documents the extensions of modules.
pub struct DocumentationGenerator<G, R> {
    builder: ModuleContextBuilder<G, R>,
    discovery: DiscoveryConfig,
}

impl<G, R> DocumentationGenerator<G, R>
where
    G: DependencyGraphProvider,
    R: ArtifactResolver,
{
    pub fn new(builder: ModuleContextBuilder<G, R>, discovery: DiscoveryConfig) -> Self {
        Self { builder, discovery }
    }

    /// Discover and describe every documented extension of `module`.
    pub fn generate(&self, module: &Coordinate) -> DocumentationReport {
        let context = match self.builder.build(module) {
            Ok(context) => context,
            Err(e) => {
                warn!(
                    "Unable to create a loading context for documenting extensions of {}. \
                     If this module contains any extensions, they will not be documented.",
                    module
                );
                debug!("Loading context failure for {}: {}", module, e);
                return DocumentationReport::empty(module);
            }
        };

        let api = &self.builder.config().api;
        let api_version = context
            .foundation()
            .artifacts()
            .keys()
            .find(|c| c.matches(&api.group, &api.artifact))
            .map(|c| c.version().to_string());

        let mut report = DocumentationReport::empty(module);
        report.api_version = api_version;

        let discovery = ExtensionDiscovery::new(&context, &self.discovery);
        for extension_type in ExtensionType::DOCUMENTED {
            match discovery.discover(extension_type) {
                Ok(definitions) => {
                    report.definitions.insert(extension_type, definitions);
                }
                Err(e) => {
                    error!("Failed to discover {} extensions of {}: {}", extension_type, module, e);
                    report.failures.push(DiscoveryFailure {
                        extension_type,
                        error: e,
                    });
                }
            }
        }

        info!(
            "Documented {} extensions of {}",
            report.definition_count(),
            module
        );
        report
    }
}
