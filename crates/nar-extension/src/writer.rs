//! Output formats for extension definitions.
//!
//! - Per-extension `.properties` documents, plus a reader for them.
//! - One XML document grouping every definition by extension type.
//! - A JSON rendering of the definition map.

use crate::definition::{
    DefinitionMap, ExtensionDefinition, ExtensionType, Restrictions, ServiceApiDefinition,
};
use crate::error::{ExtensionError, ExtensionResult};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::debug;

const CAPABILITY_DESCRIPTION: &str = "capability.description";
const TAGS_PREFIX: &str = "tags.";
const RESTRICTED_DESCRIPTION: &str = "restricted.description";
const RESTRICTION_PREFIX: &str = "restriction.";
const SERVICE_PREFIX: &str = "service.definition.";

// ============================================================================
// Properties
// ============================================================================

/// Flatten a definition into ordered key/value pairs.
pub fn to_properties(definition: &ExtensionDefinition) -> Vec<(String, String)> {
    let mut properties = Vec::new();

    if let Some(description) = &definition.capability_description {
        properties.push((CAPABILITY_DESCRIPTION.to_string(), description.clone()));
    }

    for (i, tag) in definition.tags.iter().enumerate() {
        properties.push((format!("{}{}", TAGS_PREFIX, i), tag.clone()));
    }

    if let Some(restrictions) = &definition.restrictions {
        if let Some(general) = &restrictions.general_explanation {
            properties.push((RESTRICTED_DESCRIPTION.to_string(), general.clone()));
        }
        for restriction in &restrictions.restrictions {
            properties.push((
                format!("{}{}", RESTRICTION_PREFIX, restriction.identifier),
                restriction.explanation.clone(),
            ));
        }
    }

    for (i, api) in definition.provided_service_apis.iter().enumerate() {
        let prefix = format!("{}{}", SERVICE_PREFIX, i);
        properties.push((format!("{}.class", prefix), api.class_name.clone()));
        properties.push((format!("{}.groupId", prefix), api.group_id.clone()));
        properties.push((format!("{}.artifactId", prefix), api.artifact_id.clone()));
        properties.push((format!("{}.version", prefix), api.version.clone()));
    }

    properties
}

/// Render a definition as a `.properties` document.
pub fn render_properties(definition: &ExtensionDefinition) -> String {
    let mut out = String::new();
    for (key, value) in to_properties(definition) {
        out.push_str(&escape_property(&key, true));
        out.push('=');
        out.push_str(&escape_property(&value, false));
        out.push('\n');
    }
    out
}

/// Write a definition's `.properties` document to `path`.
pub fn write_properties(definition: &ExtensionDefinition, path: &Path) -> ExtensionResult<()> {
    debug!("Writing properties of {} to {:?}", definition.name, path);
    fs::write(path, render_properties(definition))?;
    Ok(())
}

fn escape_property(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c if (' '..='~').contains(&c) => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{:04X}", unit);
                }
            }
        }
    }
    out
}

/// Parse a `.properties` document into a key/value map.
///
/// Supports comments, line continuations, the `=`, `:` and whitespace
/// separators, and backslash escapes including `\uXXXX`.
pub fn parse_properties(content: &str) -> ExtensionResult<BTreeMap<String, String>> {
    let mut properties = BTreeMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::from(trimmed);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_property(&logical);
        properties.insert(unescape_property(key)?, unescape_property(value)?);
    }

    Ok(properties)
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_property(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..i], line[i + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[i..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..i], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape_property(text: &str) -> ExtensionResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_units(&mut units, &mut out)?;
            out.push(c);
            continue;
        }

        let escaped = match chars.next() {
            Some(e) => e,
            None => break,
        };
        if escaped == 'u' {
            let hex: String = chars.by_ref().take(4).collect();
            let unit = u16::from_str_radix(&hex, 16).map_err(|_| {
                ExtensionError::InvalidProperties(format!("malformed \\u escape '\\u{}'", hex))
            })?;
            units.push(unit);
            continue;
        }

        flush_units(&mut units, &mut out)?;
        out.push(match escaped {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'f' => '\u{c}',
            other => other,
        });
    }

    flush_units(&mut units, &mut out)?;
    Ok(out)
}

fn flush_units(units: &mut Vec<u16>, out: &mut String) -> ExtensionResult<()> {
    if units.is_empty() {
        return Ok(());
    }
    let decoded = String::from_utf16(units).map_err(|_| {
        ExtensionError::InvalidProperties("unpaired surrogate in \\u escape".to_string())
    })?;
    out.push_str(&decoded);
    units.clear();
    Ok(())
}

impl ExtensionDefinition {
    /// Rebuild a definition from its properties document.
    ///
    /// The document does not carry the type or class name, so both are
    /// supplied by the caller. Unknown keys are ignored.
    pub fn from_properties(
        extension_type: ExtensionType,
        name: impl Into<String>,
        properties: &BTreeMap<String, String>,
    ) -> ExtensionResult<Self> {
        let mut definition = ExtensionDefinition::new(extension_type, name);
        definition.capability_description = properties.get(CAPABILITY_DESCRIPTION).cloned();

        let mut general = None;
        let mut specific = BTreeMap::new();
        let mut services: BTreeMap<usize, BTreeMap<&str, &str>> = BTreeMap::new();

        for (key, value) in properties {
            if key.strip_prefix(TAGS_PREFIX).is_some() {
                definition.tags.insert(value.clone());
            } else if key == RESTRICTED_DESCRIPTION {
                general = Some(value.clone());
            } else if let Some(identifier) = key.strip_prefix(RESTRICTION_PREFIX) {
                specific.insert(identifier.to_string(), value.clone());
            } else if let Some(rest) = key.strip_prefix(SERVICE_PREFIX) {
                let (index, field) = rest.split_once('.').ok_or_else(|| {
                    ExtensionError::InvalidProperties(format!("malformed key '{}'", key))
                })?;
                let index: usize = index.parse().map_err(|_| {
                    ExtensionError::InvalidProperties(format!("malformed key '{}'", key))
                })?;
                services.entry(index).or_default().insert(field, value.as_str());
            }
        }

        definition.restrictions = Restrictions::new(general, specific);

        for (index, fields) in services {
            let field = |name: &str| -> ExtensionResult<String> {
                fields.get(name).map(|v| v.to_string()).ok_or_else(|| {
                    ExtensionError::InvalidProperties(format!(
                        "{}{}.{} is missing",
                        SERVICE_PREFIX, index, name
                    ))
                })
            };
            definition.provided_service_apis.insert(ServiceApiDefinition {
                class_name: field("class")?,
                group_id: field("groupId")?,
                artifact_id: field("artifactId")?,
                version: field("version")?,
            });
        }

        Ok(definition)
    }
}

// ============================================================================
// XML
// ============================================================================

/// Element names for the documented extension types.
fn xml_names(extension_type: ExtensionType) -> Option<(&'static str, &'static str)> {
    match extension_type {
        ExtensionType::Processor => Some(("processors", "processor")),
        ExtensionType::ControllerService => Some(("controllerServices", "controllerService")),
        ExtensionType::ReportingTask => Some(("reportingTasks", "reportingTask")),
        ExtensionType::Connector => None,
    }
}

struct XmlBuilder {
    out: String,
    depth: usize,
}

impl XmlBuilder {
    fn new() -> Self {
        Self {
            out: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"),
            depth: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("    ");
        }
    }

    fn start(&mut self, name: &str) {
        self.indent();
        let _ = writeln!(self.out, "<{}>", name);
        self.depth += 1;
    }

    fn end(&mut self, name: &str) {
        self.depth -= 1;
        self.indent();
        let _ = writeln!(self.out, "</{}>", name);
    }

    fn empty(&mut self, name: &str) {
        self.indent();
        let _ = writeln!(self.out, "<{}/>", name);
    }

    fn text(&mut self, name: &str, text: Option<&str>) {
        match text {
            Some(text) => {
                self.indent();
                let _ = writeln!(self.out, "<{0}>{1}</{0}>", name, escape_xml(text));
            }
            None => self.empty(name),
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\r' => out.push_str("&#13;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the whole definition map as one XML document, led by the
/// framework API version when it is known.
pub fn render_xml(definitions: &DefinitionMap, api_version: Option<&str>) -> String {
    let empty = BTreeSet::new();
    let mut xml = XmlBuilder::new();
    xml.start("extensions");
    if let Some(version) = api_version {
        xml.text("nifiApiVersion", Some(version));
    }

    for extension_type in ExtensionType::DOCUMENTED {
        let (section, element) = match xml_names(extension_type) {
            Some(names) => names,
            None => continue,
        };

        xml.start(section);
        for definition in definitions.get(&extension_type).unwrap_or(&empty) {
            write_xml_definition(&mut xml, element, definition);
        }
        xml.end(section);
    }

    xml.end("extensions");
    xml.out
}

fn write_xml_definition(xml: &mut XmlBuilder, element: &str, definition: &ExtensionDefinition) {
    xml.start(element);
    xml.text("name", Some(&definition.name));
    xml.text("description", definition.capability_description.as_deref());

    if definition.tags.is_empty() {
        xml.empty("tags");
    } else {
        xml.start("tags");
        for tag in &definition.tags {
            xml.text("tag", Some(tag));
        }
        xml.end("tags");
    }

    match &definition.restrictions {
        None => xml.empty("restrictions"),
        Some(restrictions) => {
            xml.start("restrictions");
            xml.text("explanation", restrictions.general_explanation.as_deref());
            for restriction in &restrictions.restrictions {
                xml.start("restriction");
                xml.text("identifier", Some(&restriction.identifier));
                xml.text("explanation", Some(&restriction.explanation));
                xml.end("restriction");
            }
            xml.end("restrictions");
        }
    }

    if definition.extension_type == ExtensionType::ControllerService {
        if definition.provided_service_apis.is_empty() {
            xml.empty("providedServiceAPIs");
        } else {
            xml.start("providedServiceAPIs");
            for api in &definition.provided_service_apis {
                xml.start("service");
                xml.text("className", Some(&api.class_name));
                xml.text("groupId", Some(&api.group_id));
                xml.text("artifactId", Some(&api.artifact_id));
                xml.text("version", Some(&api.version));
                xml.end("service");
            }
            xml.end("providedServiceAPIs");
        }
    }

    xml.end(element);
}

/// Write the XML document to `path`. Nothing is written for an empty map.
///
/// Returns whether a file was written.
pub fn write_xml(
    definitions: &DefinitionMap,
    api_version: Option<&str>,
    path: &Path,
) -> ExtensionResult<bool> {
    if definitions.is_empty() {
        debug!("No definitions; not writing {:?}", path);
        return Ok(false);
    }
    fs::write(path, render_xml(definitions, api_version))?;
    Ok(true)
}

// ============================================================================
// JSON
// ============================================================================

/// Render the definition map as pretty-printed JSON.
pub fn render_json(definitions: &DefinitionMap) -> ExtensionResult<String> {
    Ok(serde_json::to_string_pretty(definitions)?)
}

/// Write the JSON rendering to `path`. Nothing is written for an empty map.
pub fn write_json(definitions: &DefinitionMap, path: &Path) -> ExtensionResult<bool> {
    if definitions.is_empty() {
        return Ok(false);
    }
    fs::write(path, render_json(definitions)?)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Coordinate;

    fn restricted_service() -> ExtensionDefinition {
        let mut definition =
            ExtensionDefinition::new(ExtensionType::ControllerService, "org.example.Pool");
        definition.capability_description = Some("Pools connections: a=b".to_string());
        definition.tags.insert("database".to_string());
        definition.tags.insert("pool".to_string());
        definition.restrictions = Restrictions::new(
            Some("Touches the host".to_string()),
            BTreeMap::from([(
                "read-filesystem".to_string(),
                "Reads driver jars".to_string(),
            )]),
        );
        definition.provided_service_apis.insert(ServiceApiDefinition::new(
            "org.example.api.PoolService",
            &Coordinate::new("org.example", "example-api-nar", "2.1", "nar"),
        ));
        definition
    }

    #[test]
    fn test_property_keys() {
        let properties: BTreeMap<_, _> = to_properties(&restricted_service()).into_iter().collect();

        assert_eq!(
            properties["capability.description"],
            "Pools connections: a=b"
        );
        assert_eq!(properties["tags.0"], "database");
        assert_eq!(properties["tags.1"], "pool");
        assert_eq!(properties["restricted.description"], "Touches the host");
        assert_eq!(properties["restriction.read-filesystem"], "Reads driver jars");
        assert_eq!(
            properties["service.definition.0.class"],
            "org.example.api.PoolService"
        );
        assert_eq!(properties["service.definition.0.groupId"], "org.example");
        assert_eq!(properties["service.definition.0.artifactId"], "example-api-nar");
        assert_eq!(properties["service.definition.0.version"], "2.1");
    }

    #[test]
    fn test_properties_escaping() {
        let mut definition = ExtensionDefinition::new(ExtensionType::Processor, "org.example.P");
        definition.capability_description = Some(" lead\\ing\nnext: caf\u{e9} \u{1F600}".to_string());

        let rendered = render_properties(&definition);
        assert_eq!(
            rendered,
            "capability.description=\\ lead\\\\ing\\nnext\\: caf\\u00E9 \\uD83D\\uDE00\n"
        );

        let parsed = parse_properties(&rendered).unwrap();
        assert_eq!(
            parsed["capability.description"],
            " lead\\ing\nnext: caf\u{e9} \u{1F600}"
        );
    }

    #[test]
    fn test_parse_properties_syntax() {
        let parsed = parse_properties(
            "# comment\n! also comment\n\nplain=value\ncolon : spaced\nwhite space\nmulti=one \\\n    two\nempty=\n",
        )
        .unwrap();

        assert_eq!(parsed["plain"], "value");
        assert_eq!(parsed["colon"], "spaced");
        assert_eq!(parsed["white"], "space");
        assert_eq!(parsed["multi"], "one two");
        assert_eq!(parsed["empty"], "");
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn test_properties_round_trip() {
        let definition = restricted_service();
        let parsed = parse_properties(&render_properties(&definition)).unwrap();
        let rebuilt =
            ExtensionDefinition::from_properties(definition.extension_type, &definition.name, &parsed)
                .unwrap();

        assert_eq!(rebuilt, definition);
    }

    #[test]
    fn test_incomplete_service_definition() {
        let parsed = parse_properties("service.definition.0.class=org.example.Api\n").unwrap();
        let result =
            ExtensionDefinition::from_properties(ExtensionType::ControllerService, "org.example.S", &parsed);
        assert!(matches!(result, Err(ExtensionError::InvalidProperties(_))));
    }

    #[test]
    fn test_xml_layout() {
        let mut processor = ExtensionDefinition::new(ExtensionType::Processor, "org.example.Fetch");
        processor.tags.insert("a<b".to_string());

        let mut definitions = DefinitionMap::new();
        definitions.insert(ExtensionType::Processor, BTreeSet::from([processor]));
        definitions.insert(
            ExtensionType::ControllerService,
            BTreeSet::from([restricted_service()]),
        );

        let xml = render_xml(&definitions, Some("1.20.0"));
        assert!(xml.starts_with(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<extensions>\n    <nifiApiVersion>1.20.0</nifiApiVersion>\n"
        ));
        assert!(xml.contains("<name>org.example.Fetch</name>"));
        assert!(xml.contains("<description/>"));
        assert!(xml.contains("<tag>a&lt;b</tag>"));
        assert!(xml.contains("<restrictions/>"));
        assert!(xml.contains("<identifier>read-filesystem</identifier>"));
        assert!(xml.contains("<className>org.example.api.PoolService</className>"));
        assert!(xml.contains("<reportingTasks>\n    </reportingTasks>"));

        let processors = xml.find("<processors>").unwrap();
        let services = xml.find("<controllerServices>").unwrap();
        let tasks = xml.find("<reportingTasks>").unwrap();
        assert!(processors < services && services < tasks);

        // Only controller services carry the service API list.
        let fetch = &xml[processors..services];
        assert!(!fetch.contains("providedServiceAPIs"));
    }

    #[test]
    fn test_xml_without_api_version() {
        let xml = render_xml(&DefinitionMap::new(), None);
        assert!(!xml.contains("nifiApiVersion"));
        assert!(xml.contains("<processors>"));
    }

    #[test]
    fn test_empty_map_writes_nothing() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let xml_path = temp_dir.path().join("extension-docs.xml");
        let json_path = temp_dir.path().join("extension-docs.json");

        assert!(!write_xml(&DefinitionMap::new(), None, &xml_path).unwrap());
        assert!(!write_json(&DefinitionMap::new(), &json_path).unwrap());
        assert!(!xml_path.exists());
        assert!(!json_path.exists());
    }

    #[test]
    fn test_json_rendering() {
        let mut definitions = DefinitionMap::new();
        definitions.insert(
            ExtensionType::ControllerService,
            BTreeSet::from([restricted_service()]),
        );

        let json = render_json(&definitions).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let service = &value["controller_service"][0];
        assert_eq!(service["name"], "org.example.Pool");
        assert_eq!(service["provided_service_apis"][0]["artifact_id"], "example-api-nar");
    }
}
