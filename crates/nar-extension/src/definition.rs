//! In-memory extension definitions produced by discovery.

use crate::artifact::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of extension contract a class implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionType {
    /// A flow processor.
    Processor,
    /// A shared service used by other components.
    ControllerService,
    /// A background reporting task.
    ReportingTask,
    /// Declared, but has no contract mapping unless configured.
    Connector,
}

impl ExtensionType {
    /// The types covered by generated documentation.
    pub const DOCUMENTED: [ExtensionType; 3] = [
        ExtensionType::Processor,
        ExtensionType::ControllerService,
        ExtensionType::ReportingTask,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtensionType::Processor => "processor",
            ExtensionType::ControllerService => "controller_service",
            ExtensionType::ReportingTask => "reporting_task",
            ExtensionType::Connector => "connector",
        }
    }
}

impl fmt::Display for ExtensionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single permission-scoped restriction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Restriction {
    /// Permission identifier, e.g. `read-filesystem`.
    pub identifier: String,
    pub explanation: String,
}

/// Restrictions placed on an extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Restrictions {
    /// Why the extension is restricted as a whole, if stated.
    pub general_explanation: Option<String>,

    /// Specific restrictions keyed by permission.
    pub restrictions: BTreeSet<Restriction>,
}

impl Restrictions {
    /// Build restrictions, or `None` when there is neither a general
    /// explanation nor any specific restriction.
    pub fn new(
        general_explanation: Option<String>,
        specific: BTreeMap<String, String>,
    ) -> Option<Self> {
        if general_explanation.is_none() && specific.is_empty() {
            return None;
        }

        let restrictions = specific
            .into_iter()
            .map(|(identifier, explanation)| Restriction {
                identifier,
                explanation,
            })
            .collect();

        Some(Self {
            general_explanation,
            restrictions,
        })
    }
}

/// A service contract interface provided by a controller service, together
/// with the module that defines it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceApiDefinition {
    pub class_name: String,
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl ServiceApiDefinition {
    /// Attribute `class_name` to the module identified by `module`.
    pub fn new(class_name: impl Into<String>, module: &Coordinate) -> Self {
        Self {
            class_name: class_name.into(),
            group_id: module.group().to_string(),
            artifact_id: module.artifact().to_string(),
            version: module.version().to_string(),
        }
    }
}

/// Shape-level metadata of one discovered extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExtensionDefinition {
    pub extension_type: ExtensionType,

    /// Fully-qualified implementation class name.
    pub name: String,

    pub capability_description: Option<String>,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default)]
    pub restrictions: Option<Restrictions>,

    /// Always empty unless `extension_type` is a controller service.
    #[serde(default)]
    pub provided_service_apis: BTreeSet<ServiceApiDefinition>,
}

impl ExtensionDefinition {
    /// Create a definition with no metadata.
    pub fn new(extension_type: ExtensionType, name: impl Into<String>) -> Self {
        Self {
            extension_type,
            name: name.into(),
            capability_description: None,
            tags: BTreeSet::new(),
            restrictions: None,
            provided_service_apis: BTreeSet::new(),
        }
    }
}

/// Discovered definitions grouped by extension type.
pub type DefinitionMap = BTreeMap<ExtensionType, BTreeSet<ExtensionDefinition>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restrictions_absent_without_content() {
        assert!(Restrictions::new(None, BTreeMap::new()).is_none());
    }

    #[test]
    fn test_restrictions_with_general_explanation_only() {
        let r = Restrictions::new(Some("dangerous".to_string()), BTreeMap::new()).unwrap();
        assert_eq!(r.general_explanation.as_deref(), Some("dangerous"));
        assert!(r.restrictions.is_empty());
    }

    #[test]
    fn test_restrictions_with_specific_only() {
        let mut specific = BTreeMap::new();
        specific.insert("read-filesystem".to_string(), "reads files".to_string());

        let r = Restrictions::new(None, specific).unwrap();
        assert_eq!(r.general_explanation, None);
        assert_eq!(r.restrictions.len(), 1);
        assert_eq!(
            r.restrictions.iter().next().unwrap().identifier,
            "read-filesystem"
        );
    }

    #[test]
    fn test_service_api_definition_takes_module_coordinate() {
        let module = Coordinate::new("org.example", "services-nar", "1.4.0", "nar");
        let api = ServiceApiDefinition::new("org.example.CacheService", &module);
        assert_eq!(api.group_id, "org.example");
        assert_eq!(api.artifact_id, "services-nar");
        assert_eq!(api.version, "1.4.0");
    }

    #[test]
    fn test_extension_type_serde_names() {
        let json = serde_json::to_string(&ExtensionType::ControllerService).unwrap();
        assert_eq!(json, "\"controller_service\"");
        assert_eq!(ExtensionType::ReportingTask.to_string(), "reporting_task");
    }
}
