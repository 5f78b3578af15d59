//! Metadata extraction from loaded extension classes.
//!
//! Marker values are read from class-file annotations. Elements a use site
//! omits fall back to the defaults declared by the marker type, which is
//! loaded through the annotated class's own defining level. No class code is
//! ever run.

use crate::artifact::Coordinate;
use crate::classfile::{Annotation, ElementValue};
use crate::config::DiscoveryConfig;
use crate::context::{ContextId, LoadedClass, LoadingContext};
use crate::definition::{ExtensionDefinition, ExtensionType, Restrictions, ServiceApiDefinition};
use crate::error::{ExtensionError, ExtensionResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// An annotation together with its type's element defaults.
struct Marker<'c> {
    type_name: &'c str,
    class_name: &'c str,
    annotation: &'c Annotation,
    defaults: BTreeMap<String, ElementValue>,
}

impl Marker<'_> {
    fn value(&self, element: &str) -> Option<&ElementValue> {
        self.annotation
            .get(element)
            .or_else(|| self.defaults.get(element))
    }

    fn string(&self, element: &str) -> ExtensionResult<Option<String>> {
        match self.value(element) {
            None => Ok(None),
            Some(ElementValue::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(format!(
                "element '{}' is a {}, expected a string",
                element,
                other.kind()
            ))),
        }
    }

    fn array(&self, element: &str) -> ExtensionResult<&[ElementValue]> {
        match self.value(element) {
            None => Ok(&[]),
            Some(ElementValue::Array(values)) => Ok(values),
            Some(other) => Err(self.invalid(format!(
                "element '{}' is a {}, expected an array",
                element,
                other.kind()
            ))),
        }
    }

    fn invalid(&self, reason: String) -> ExtensionError {
        ExtensionError::InvalidMarker {
            marker: self.type_name.to_string(),
            class: self.class_name.to_string(),
            reason,
        }
    }
}

/// Extracts an [`ExtensionDefinition`] from a class loaded in a leaf
/// context.
pub struct MetadataExtractor<'a> {
    context: &'a LoadingContext,
    config: &'a DiscoveryConfig,
}

impl<'a> MetadataExtractor<'a> {
    pub fn new(context: &'a LoadingContext, config: &'a DiscoveryConfig) -> Self {
        Self { context, config }
    }

    /// Describe `class` as an extension of `extension_type`.
    pub fn extract(
        &self,
        class: &LoadedClass,
        extension_type: ExtensionType,
    ) -> ExtensionResult<ExtensionDefinition> {
        let mut definition = ExtensionDefinition::new(extension_type, class.name());
        definition.capability_description = self.capability_description(class)?;
        definition.tags = self.tags(class)?;
        definition.restrictions = self.restrictions(class)?;

        if extension_type == ExtensionType::ControllerService {
            definition.provided_service_apis = self.provided_service_apis(class)?;
        }

        debug!(
            "Extracted {} {}: {} tags, restricted: {}, {} service APIs",
            extension_type,
            definition.name,
            definition.tags.len(),
            definition.restrictions.is_some(),
            definition.provided_service_apis.len()
        );
        Ok(definition)
    }

    fn marker<'c>(
        &self,
        class: &'c LoadedClass,
        type_name: &'c str,
    ) -> ExtensionResult<Option<Marker<'c>>> {
        match class.class.annotation(type_name) {
            Some(annotation) => self.view(class.defined_by, class.name(), annotation).map(Some),
            None => Ok(None),
        }
    }

    fn view<'c>(
        &self,
        requester: ContextId,
        class_name: &'c str,
        annotation: &'c Annotation,
    ) -> ExtensionResult<Marker<'c>> {
        let marker_type = self
            .context
            .load_class_from(requester, &annotation.type_name)?;
        if !marker_type.class.is_annotation() {
            return Err(ExtensionError::InvalidMarker {
                marker: annotation.type_name.clone(),
                class: class_name.to_string(),
                reason: "marker type is not an annotation type".to_string(),
            });
        }

        Ok(Marker {
            type_name: &annotation.type_name,
            class_name,
            annotation,
            defaults: marker_type.class.annotation_defaults.clone(),
        })
    }

    fn capability_description(&self, class: &LoadedClass) -> ExtensionResult<Option<String>> {
        match self.marker(class, &self.config.markers.capability_description)? {
            Some(marker) => marker.string("value"),
            None => Ok(None),
        }
    }

    fn tags(&self, class: &LoadedClass) -> ExtensionResult<BTreeSet<String>> {
        let marker = match self.marker(class, &self.config.markers.tags)? {
            Some(marker) => marker,
            None => return Ok(BTreeSet::new()),
        };

        marker
            .array("value")?
            .iter()
            .map(|value| match value {
                ElementValue::String(tag) => Ok(tag.clone()),
                other => Err(marker.invalid(format!("tag is a {}, expected a string", other.kind()))),
            })
            .collect()
    }

    fn restrictions(&self, class: &LoadedClass) -> ExtensionResult<Option<Restrictions>> {
        let restricted = match self.marker(class, &self.config.markers.restricted)? {
            Some(marker) => marker,
            None => return Ok(None),
        };

        // A present marker always carries an explanation, even an empty one.
        let general = Some(restricted.string("value")?.unwrap_or_default());

        let mut specific = BTreeMap::new();
        for entry in restricted.array("restrictions")? {
            let nested = entry.as_annotation().ok_or_else(|| {
                restricted.invalid(format!(
                    "restriction entry is a {}, expected an annotation",
                    entry.kind()
                ))
            })?;
            if nested.type_name != self.config.markers.restriction {
                return Err(restricted.invalid(format!(
                    "restriction entry has type {}",
                    nested.type_name
                )));
            }

            let restriction = self.view(class.defined_by, class.name(), nested)?;
            let explanation = restriction.string("explanation")?.unwrap_or_default();
            let identifier = match restriction.value("requiredPermission") {
                Some(ElementValue::Enum { const_name, .. }) => {
                    self.config.permission_identifier(const_name)
                }
                Some(ElementValue::String(id)) => id.clone(),
                Some(other) => {
                    return Err(restriction.invalid(format!(
                        "requiredPermission is a {}, expected an enum constant",
                        other.kind()
                    )))
                }
                None => {
                    return Err(restriction.invalid("requiredPermission is missing".to_string()))
                }
            };

            specific.insert(identifier, explanation);
        }

        Ok(Restrictions::new(general, specific))
    }

    /// Service contracts `class` implements directly, each attributed to the
    /// module level that defines it.
    fn provided_service_apis(
        &self,
        class: &LoadedClass,
    ) -> ExtensionResult<BTreeSet<ServiceApiDefinition>> {
        let contract_name = self
            .config
            .contract(ExtensionType::ControllerService)
            .ok_or(ExtensionError::UnmappedExtensionType(
                ExtensionType::ControllerService,
            ))?;
        let contract = self.context.load_class(contract_name)?;

        let mut apis = BTreeSet::new();
        for interface_name in &class.class.interfaces {
            let interface = match self.context.load_class_from(class.defined_by, interface_name) {
                Ok(interface) => interface,
                Err(ExtensionError::ClassNotFound(_)) => {
                    debug!(
                        "{} implements {}, which no level defines; skipping",
                        class.name(),
                        interface_name
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !self.context.is_assignable(&contract, &interface)? {
                continue;
            }

            match self.defining_module(&interface) {
                Some(module) => {
                    debug!("{} provides {} from {}", class.name(), interface_name, module);
                    apis.insert(ServiceApiDefinition::new(interface_name.as_str(), module));
                }
                None => debug!(
                    "{} is not defined by any module level; not listing it as a service API of {}",
                    interface_name,
                    class.name()
                ),
            }
        }

        Ok(apis)
    }

    /// Module tag of the level that defined `class`, searching leaf to root.
    fn defining_module(&self, class: &LoadedClass) -> Option<&'a Coordinate> {
        self.context
            .ancestry()
            .find(|level| level.id() == class.defined_by)
            .and_then(|level| level.module())
    }
}
