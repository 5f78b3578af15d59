//! Configuration values for the hierarchy builder and discovery engine.
//!
//! Every value is immutable once handed to the builder or discovery engine.
//! The defaults describe Apache NiFi bundles.

use crate::definition::ExtensionType;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// `group:artifact` pair, version-less.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub group: String,
    pub artifact: String,
}

impl ArtifactKey {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

/// Which artifacts make up the shared foundation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoundationConfig {
    /// Artifact type that marks a module.
    pub module_type: String,

    /// Companion artifact in the API's group, resolved at the API's version.
    pub framework_api_artifact: String,

    /// The framework API every module compiles against.
    pub api: ArtifactKey,

    /// Logging contract shared by all modules.
    pub logging: ArtifactKey,
}

impl Default for FoundationConfig {
    fn default() -> Self {
        Self {
            module_type: "nar".to_string(),
            api: ArtifactKey::new("org.apache.nifi", "nifi-api"),
            framework_api_artifact: "nifi-framework-api".to_string(),
            logging: ArtifactKey::new("org.slf4j", "slf4j-api"),
        }
    }
}

/// Maps an extension type to the interface its implementations register
/// under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMapping {
    pub extension_type: ExtensionType,
    pub interface: String,
}

/// Names of the declarative metadata markers read from extension classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerNames {
    pub capability_description: String,
    pub tags: String,
    pub restricted: String,
    pub restriction: String,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            capability_description: "org.apache.nifi.annotation.documentation.CapabilityDescription"
                .to_string(),
            tags: "org.apache.nifi.annotation.documentation.Tags".to_string(),
            restricted: "org.apache.nifi.annotation.behavior.Restricted".to_string(),
            restriction: "org.apache.nifi.annotation.behavior.Restriction".to_string(),
        }
    }
}

/// Everything the discovery engine needs to know about contracts and
/// markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Directory holding registration resources, with trailing slash.
    pub services_directory: String,

    /// Contract interface per extension type. Configured entries replace
    /// the default mapping of the same type and keep the others.
    #[serde(deserialize_with = "merge_contracts")]
    pub contracts: Vec<ContractMapping>,

    pub markers: MarkerNames,

    /// Permission identifiers by enum constant name. Constants not listed
    /// map to their lower-case, dash-separated form.
    pub permissions: BTreeMap<String, String>,
}

fn default_contracts() -> Vec<ContractMapping> {
    [
        (ExtensionType::Processor, "org.apache.nifi.processor.Processor"),
        (
            ExtensionType::ControllerService,
            "org.apache.nifi.controller.ControllerService",
        ),
        (ExtensionType::ReportingTask, "org.apache.nifi.reporting.ReportingTask"),
    ]
    .into_iter()
    .map(|(extension_type, interface)| ContractMapping {
        extension_type,
        interface: interface.to_string(),
    })
    .collect()
}

fn merge_contracts<'de, D>(deserializer: D) -> Result<Vec<ContractMapping>, D::Error>
where
    D: Deserializer<'de>,
{
    let configured = Vec::<ContractMapping>::deserialize(deserializer)?;
    let mut contracts = default_contracts();
    for mapping in configured {
        match contracts
            .iter_mut()
            .find(|c| c.extension_type == mapping.extension_type)
        {
            Some(existing) => *existing = mapping,
            None => contracts.push(mapping),
        }
    }
    Ok(contracts)
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            services_directory: "META-INF/services/".to_string(),
            contracts: default_contracts(),
            markers: MarkerNames::default(),
            permissions: BTreeMap::new(),
        }
    }
}

impl DiscoveryConfig {
    /// The contract interface for `extension_type`, if one is mapped.
    pub fn contract(&self, extension_type: ExtensionType) -> Option<&str> {
        self.contracts
            .iter()
            .find(|c| c.extension_type == extension_type)
            .map(|c| c.interface.as_str())
    }

    /// Path of the registration resource for `interface`.
    pub fn registration_path(&self, interface: &str) -> String {
        let mut dir = self.services_directory.clone();
        if !dir.is_empty() && !dir.ends_with('/') {
            dir.push('/');
        }
        dir.push_str(interface);
        dir
    }

    /// Permission identifier for an enum constant name.
    pub fn permission_identifier(&self, constant: &str) -> String {
        self.permissions
            .get(constant)
            .cloned()
            .unwrap_or_else(|| constant.to_ascii_lowercase().replace('_', "-"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_contracts() {
        let config = DiscoveryConfig::default();
        assert_eq!(
            config.contract(ExtensionType::Processor),
            Some("org.apache.nifi.processor.Processor")
        );
        assert_eq!(
            config.contract(ExtensionType::ControllerService),
            Some("org.apache.nifi.controller.ControllerService")
        );
        assert_eq!(
            config.contract(ExtensionType::ReportingTask),
            Some("org.apache.nifi.reporting.ReportingTask")
        );
        assert_eq!(config.contract(ExtensionType::Connector), None);
    }

    #[test]
    fn test_registration_path() {
        let mut config = DiscoveryConfig::default();
        assert_eq!(
            config.registration_path("org.example.Api"),
            "META-INF/services/org.example.Api"
        );

        config.services_directory = "META-INF/extensions".to_string();
        assert_eq!(
            config.registration_path("org.example.Api"),
            "META-INF/extensions/org.example.Api"
        );
    }

    #[test]
    fn test_permission_identifiers() {
        let mut config = DiscoveryConfig::default();
        assert_eq!(config.permission_identifier("READ_FILESYSTEM"), "read-filesystem");
        assert_eq!(
            config.permission_identifier("ACCESS_ENVIRONMENT_CREDENTIALS"),
            "access-environment-credentials"
        );

        config
            .permissions
            .insert("EXECUTE_CODE".to_string(), "run-anything".to_string());
        assert_eq!(config.permission_identifier("EXECUTE_CODE"), "run-anything");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DiscoveryConfig = toml::from_str(
            r#"
[[contracts]]
extension_type = "connector"
interface = "org.example.Connector"
"#,
        )
        .unwrap();

        assert_eq!(config.services_directory, "META-INF/services/");
        assert_eq!(config.contract(ExtensionType::Connector), Some("org.example.Connector"));
        assert_eq!(
            config.contract(ExtensionType::Processor),
            Some("org.apache.nifi.processor.Processor")
        );
        assert_eq!(config.contracts.len(), 4);
        assert_eq!(config.markers, MarkerNames::default());
    }

    #[test]
    fn test_configured_contract_replaces_default() {
        let config: DiscoveryConfig = toml::from_str(
            r#"
[[contracts]]
extension_type = "processor"
interface = "org.example.Processor"
"#,
        )
        .unwrap();

        assert_eq!(config.contract(ExtensionType::Processor), Some("org.example.Processor"));
        assert_eq!(
            config.contract(ExtensionType::ReportingTask),
            Some("org.apache.nifi.reporting.ReportingTask")
        );
        assert_eq!(config.contracts.len(), 3);
    }

    #[test]
    fn test_foundation_defaults() {
        let config = FoundationConfig::default();
        assert_eq!(config.api.to_string(), "org.apache.nifi:nifi-api");
        assert_eq!(config.framework_api_artifact, "nifi-framework-api");
        assert_eq!(config.logging.to_string(), "org.slf4j:slf4j-api");
    }
}
