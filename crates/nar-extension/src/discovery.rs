//! Extension discovery through registration resources.
//!
//! Implementations of a contract are listed in a plain-text resource named
//! after the contract interface, e.g.
//! `META-INF/services/org.apache.nifi.processor.Processor`. Every level of
//! the chain may carry such a resource; all of them are merged.
//!
//! Discovery is fail-fast per extension type: one class that cannot be
//! loaded or described fails the whole call for that type.

use crate::config::DiscoveryConfig;
use crate::context::LoadingContext;
use crate::definition::{ExtensionDefinition, ExtensionType};
use crate::error::{ExtensionError, ExtensionResult};
use crate::extract::MetadataExtractor;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Enumerates and describes the extensions visible from a leaf context.
pub struct ExtensionDiscovery<'a> {
    context: &'a LoadingContext,
    config: &'a DiscoveryConfig,
}

impl<'a> ExtensionDiscovery<'a> {
    pub fn new(context: &'a LoadingContext, config: &'a DiscoveryConfig) -> Self {
        Self { context, config }
    }

    /// Discover and describe every registered implementation of
    /// `extension_type`.
    pub fn discover(
        &self,
        extension_type: ExtensionType,
    ) -> ExtensionResult<BTreeSet<ExtensionDefinition>> {
        let class_names = self.class_names(extension_type)?;
        if class_names.is_empty() {
            debug!("No {} implementations registered", extension_type);
            return Ok(BTreeSet::new());
        }

        let extractor = MetadataExtractor::new(self.context, self.config);
        let mut definitions = BTreeSet::new();

        for class_name in &class_names {
            debug!("Describing {} {}", extension_type, class_name);

            let definition = self
                .context
                .load_class(class_name)
                .and_then(|class| extractor.extract(&class, extension_type))
                .map_err(|e| ExtensionError::ExtensionDefinition {
                    extension_type,
                    class_name: class_name.clone(),
                    source: Box::new(e),
                })?;

            definitions.insert(definition);
        }

        info!(
            "Discovered {} {} extensions",
            definitions.len(),
            extension_type
        );
        Ok(definitions)
    }

    /// Names of the classes registered for `extension_type` at any level of
    /// the chain.
    pub fn class_names(&self, extension_type: ExtensionType) -> ExtensionResult<BTreeSet<String>> {
        let interface = self
            .config
            .contract(extension_type)
            .ok_or(ExtensionError::UnmappedExtensionType(extension_type))?;
        let path = self.config.registration_path(interface);

        let mut names = BTreeSet::new();
        for resource in self.context.find_resources(&path)? {
            let listed = parse_registration(&String::from_utf8_lossy(&resource.bytes));
            debug!(
                "{:?} registers {} {} implementations",
                resource.origin,
                listed.len(),
                extension_type
            );
            names.extend(listed);
        }

        Ok(names)
    }
}

/// Parse a registration resource: one class name per line, blank lines and
/// `#` comments ignored.
pub fn parse_registration(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
