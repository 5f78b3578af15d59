//! Configuration file loading and management
//!
//! This module handles loading and parsing the generator configuration from
//! `$XDG_CONFIG_HOME/nar-docgen/config.toml`. If the configuration file
//! doesn't exist, a default configuration is created with documented
//! comments.

use anyhow::{Context, Result};
use nar_extension::{DiscoveryConfig, ExtensionType, FoundationConfig, OutputFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Main generator configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Where artifacts and their dependency graphs come from
    #[serde(default)]
    pub repository: RepositoryConfig,
    /// Artifacts that make up the shared foundation context
    #[serde(default)]
    pub foundation: FoundationConfig,
    /// Extension contracts and metadata markers
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Generated documentation
    #[serde(default)]
    pub output: OutputConfig,
}

/// Artifact source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RepositoryConfig {
    /// Root of the local Maven-layout repository
    /// If None, uses ~/.m2/repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<PathBuf>,
    /// Dependency lockfile describing each module's dependency closure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lockfile: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory below which `META-INF/` is written
    /// Default: "target"
    pub directory: PathBuf,
    /// Formats to write
    /// Default: ["xml"]
    pub formats: Vec<OutputFormat>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            repository: RepositoryConfig::default(),
            foundation: FoundationConfig::default(),
            discovery: DiscoveryConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("target"),
            formats: vec![OutputFormat::Xml],
        }
    }
}

impl Config {
    /// Load configuration from the specified path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default XDG config location
    ///
    /// If the configuration file doesn't exist, creates a default configuration
    /// file with documented comments.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// Get the default configuration file path
    ///
    /// Returns `$XDG_CONFIG_HOME/nar-docgen/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("", "", "nar-docgen")
            .context("Failed to determine project directories")?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    /// Generate the default configuration file content with comments
    pub fn default_config_content() -> String {
        r#"# nar-docgen Configuration
# This file configures how module loading contexts are built and how
# extension documentation is generated.

# Log level: trace, debug, info, warn, error
# Default: "info"
log_level = "info"

[repository]
# Root of the local Maven-layout repository used to resolve artifacts
# If not specified, defaults to ~/.m2/repository
# local = "/path/to/repository"

# Dependency lockfile listing the dependency closure of each module
# lockfile = "/path/to/nar-deps.lock"

[foundation]
# Artifact type that marks a module
module_type = "nar"

# Companion artifact resolved at the framework API's version
framework_api_artifact = "nifi-framework-api"

[foundation.api]
group = "org.apache.nifi"
artifact = "nifi-api"

[foundation.logging]
group = "org.slf4j"
artifact = "slf4j-api"

[discovery]
# Directory holding registration resources
services_directory = "META-INF/services/"

# Permission identifiers by enum constant; unlisted constants map to their
# lower-case, dash-separated form
# [discovery.permissions]
# READ_FILESYSTEM = "read-filesystem"

[output]
# Directory below which META-INF/ is written
directory = "target"

# Formats to write: xml, properties, json
formats = ["xml"]
"#
        .to_string()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: {}",
                self.log_level,
                valid_log_levels.join(", ")
            );
        }

        if self.foundation.module_type.trim().is_empty() {
            anyhow::bail!("foundation.module_type must not be empty");
        }
        for (name, value) in [
            ("foundation.api.group", &self.foundation.api.group),
            ("foundation.api.artifact", &self.foundation.api.artifact),
            ("foundation.framework_api_artifact", &self.foundation.framework_api_artifact),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }

        let mut mapped = BTreeSet::new();
        for contract in &self.discovery.contracts {
            if !mapped.insert(contract.extension_type) {
                anyhow::bail!(
                    "Extension type {} is mapped to more than one contract",
                    contract.extension_type
                );
            }
            if contract.interface.trim().is_empty() {
                anyhow::bail!(
                    "Extension type {}: contract interface must not be empty",
                    contract.extension_type
                );
            }
        }

        for extension_type in ExtensionType::DOCUMENTED {
            if !mapped.contains(&extension_type) {
                anyhow::bail!("Extension type {} has no contract interface", extension_type);
            }
        }

        if self.output.formats.is_empty() {
            anyhow::bail!("output.formats must name at least one format");
        }

        Ok(())
    }

    /// Get the local repository root
    ///
    /// Returns the configured path or `~/.m2/repository`
    pub fn local_repository(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.repository.local {
            return Ok(path.clone());
        }

        let dirs = directories::BaseDirs::new().context("Failed to determine home directory")?;
        Ok(dirs.home_dir().join(".m2").join("repository"))
    }
}
