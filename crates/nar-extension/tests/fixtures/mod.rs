//! Shared fixtures: a minimal class file writer, jar and directory builders,
//! and a temp-dir repository with an in-memory dependency graph.

#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};
use nar_extension::{Coordinate, DependencyLockfile, DependencySet, LocalRepository};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

pub const PROCESSOR: &str = "org.apache.nifi.processor.Processor";
pub const CONTROLLER_SERVICE: &str = "org.apache.nifi.controller.ControllerService";
pub const REPORTING_TASK: &str = "org.apache.nifi.reporting.ReportingTask";
pub const CAPABILITY_DESCRIPTION: &str =
    "org.apache.nifi.annotation.documentation.CapabilityDescription";
pub const TAGS: &str = "org.apache.nifi.annotation.documentation.Tags";
pub const RESTRICTED: &str = "org.apache.nifi.annotation.behavior.Restricted";
pub const RESTRICTION: &str = "org.apache.nifi.annotation.behavior.Restriction";
pub const REQUIRED_PERMISSION: &str = "org.apache.nifi.components.RequiredPermission";

const ACC_PUBLIC: u16 = 0x0001;
const ACC_INTERFACE: u16 = 0x0200;
const ACC_ABSTRACT: u16 = 0x0400;
const ACC_ANNOTATION: u16 = 0x2000;

// ==============================================================================
// Class Files
// ==============================================================================

/// An annotation element value to encode.
#[derive(Debug, Clone)]
pub enum Value {
    Str(String),
    Int(i32),
    Bool(bool),
    Enum(String, String),
    Annotation(Ann),
    Array(Vec<Value>),
}

pub fn s(text: &str) -> Value {
    Value::Str(text.to_string())
}

pub fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|i| s(i)).collect())
}

/// An annotation to encode.
#[derive(Debug, Clone)]
pub struct Ann {
    pub type_name: String,
    pub elements: Vec<(String, Value)>,
}

impl Ann {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, value: Value) -> Self {
        self.elements.push((name.to_string(), value));
        self
    }
}

/// Restriction marker entry requiring `permission`.
pub fn restriction(permission: &str, explanation: &str) -> Value {
    Value::Annotation(
        Ann::new(RESTRICTION)
            .with("requiredPermission", Value::Enum(REQUIRED_PERMISSION.to_string(), permission.to_string()))
            .with("explanation", s(explanation)),
    )
}

/// Describes one class to encode.
#[derive(Debug, Clone)]
pub struct ClassBuilder {
    name: String,
    access: u16,
    super_name: Option<String>,
    interfaces: Vec<String>,
    annotations: Vec<Ann>,
    elements: Vec<(String, Option<Value>)>,
}

impl ClassBuilder {
    pub fn class(name: &str) -> Self {
        Self {
            name: name.to_string(),
            access: ACC_PUBLIC,
            super_name: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            annotations: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn interface(name: &str) -> Self {
        let mut builder = Self::class(name);
        builder.access = ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT;
        builder
    }

    pub fn annotation_type(name: &str) -> Self {
        let mut builder = Self::interface(name);
        builder.access |= ACC_ANNOTATION;
        builder.interfaces.push("java.lang.annotation.Annotation".to_string());
        builder
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = Some(super_name.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn annotated(mut self, annotation: Ann) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Declare an annotation element, with its default if any.
    pub fn element(mut self, name: &str, default: Option<Value>) -> Self {
        self.elements.push((name.to_string(), default));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_name(&self) -> String {
        format!("{}.class", self.name.replace('.', "/"))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut pool = ConstantPool::default();

        let this_index = pool.class(&self.name);
        let super_index = self.super_name.as_ref().map(|n| pool.class(n)).unwrap_or(0);
        let interface_indices: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();

        let mut methods = Vec::new();
        methods.write_u16::<BigEndian>(self.elements.len() as u16).unwrap();
        for (name, default) in &self.elements {
            methods.write_u16::<BigEndian>(ACC_PUBLIC | ACC_ABSTRACT).unwrap();
            methods.write_u16::<BigEndian>(pool.utf8(name)).unwrap();
            methods.write_u16::<BigEndian>(pool.utf8("()Ljava/lang/Object;")).unwrap();
            match default {
                Some(value) => {
                    let mut body = Vec::new();
                    write_value(&mut body, &mut pool, value);
                    methods.write_u16::<BigEndian>(1).unwrap();
                    methods.write_u16::<BigEndian>(pool.utf8("AnnotationDefault")).unwrap();
                    methods.write_u32::<BigEndian>(body.len() as u32).unwrap();
                    methods.extend_from_slice(&body);
                }
                None => methods.write_u16::<BigEndian>(0).unwrap(),
            }
        }

        let mut attributes = Vec::new();
        if self.annotations.is_empty() {
            attributes.write_u16::<BigEndian>(0).unwrap();
        } else {
            let mut body = Vec::new();
            body.write_u16::<BigEndian>(self.annotations.len() as u16).unwrap();
            for annotation in &self.annotations {
                write_annotation(&mut body, &mut pool, annotation);
            }
            attributes.write_u16::<BigEndian>(1).unwrap();
            attributes
                .write_u16::<BigEndian>(pool.utf8("RuntimeVisibleAnnotations"))
                .unwrap();
            attributes.write_u32::<BigEndian>(body.len() as u32).unwrap();
            attributes.extend_from_slice(&body);
        }

        let mut out = Vec::new();
        out.write_u32::<BigEndian>(0xCAFE_BABE).unwrap();
        out.write_u16::<BigEndian>(0).unwrap();
        out.write_u16::<BigEndian>(52).unwrap();
        pool.write(&mut out);
        out.write_u16::<BigEndian>(self.access).unwrap();
        out.write_u16::<BigEndian>(this_index).unwrap();
        out.write_u16::<BigEndian>(super_index).unwrap();
        out.write_u16::<BigEndian>(interface_indices.len() as u16).unwrap();
        for index in interface_indices {
            out.write_u16::<BigEndian>(index).unwrap();
        }
        out.write_u16::<BigEndian>(0).unwrap(); // fields
        out.extend_from_slice(&methods);
        out.extend_from_slice(&attributes);
        out
    }
}

#[derive(Default)]
struct ConstantPool {
    entries: Vec<Vec<u8>>,
    utf8: HashMap<String, u16>,
    ints: HashMap<i32, u16>,
    classes: HashMap<String, u16>,
}

impl ConstantPool {
    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.entries.push(entry);
        self.entries.len() as u16
    }

    fn utf8(&mut self, text: &str) -> u16 {
        if let Some(index) = self.utf8.get(text) {
            return *index;
        }
        let mut entry = vec![1u8];
        entry.write_u16::<BigEndian>(text.len() as u16).unwrap();
        entry.extend_from_slice(text.as_bytes());
        let index = self.push(entry);
        self.utf8.insert(text.to_string(), index);
        index
    }

    fn int(&mut self, value: i32) -> u16 {
        if let Some(index) = self.ints.get(&value) {
            return *index;
        }
        let mut entry = vec![3u8];
        entry.write_i32::<BigEndian>(value).unwrap();
        let index = self.push(entry);
        self.ints.insert(value, index);
        index
    }

    fn class(&mut self, binary_name: &str) -> u16 {
        if let Some(index) = self.classes.get(binary_name) {
            return *index;
        }
        let name_index = self.utf8(&binary_name.replace('.', "/"));
        let mut entry = vec![7u8];
        entry.write_u16::<BigEndian>(name_index).unwrap();
        let index = self.push(entry);
        self.classes.insert(binary_name.to_string(), index);
        index
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.write_u16::<BigEndian>(self.entries.len() as u16 + 1).unwrap();
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
    }
}

fn descriptor(binary_name: &str) -> String {
    format!("L{};", binary_name.replace('.', "/"))
}

fn write_annotation(out: &mut Vec<u8>, pool: &mut ConstantPool, annotation: &Ann) {
    out.write_u16::<BigEndian>(pool.utf8(&descriptor(&annotation.type_name)))
        .unwrap();
    out.write_u16::<BigEndian>(annotation.elements.len() as u16).unwrap();
    for (name, value) in &annotation.elements {
        out.write_u16::<BigEndian>(pool.utf8(name)).unwrap();
        write_value(out, pool, value);
    }
}

fn write_value(out: &mut Vec<u8>, pool: &mut ConstantPool, value: &Value) {
    match value {
        Value::Str(text) => {
            out.write_u8(b's').unwrap();
            out.write_u16::<BigEndian>(pool.utf8(text)).unwrap();
        }
        Value::Int(v) => {
            out.write_u8(b'I').unwrap();
            out.write_u16::<BigEndian>(pool.int(*v)).unwrap();
        }
        Value::Bool(v) => {
            out.write_u8(b'Z').unwrap();
            out.write_u16::<BigEndian>(pool.int(*v as i32)).unwrap();
        }
        Value::Enum(type_name, const_name) => {
            out.write_u8(b'e').unwrap();
            out.write_u16::<BigEndian>(pool.utf8(&descriptor(type_name)))
                .unwrap();
            out.write_u16::<BigEndian>(pool.utf8(const_name)).unwrap();
        }
        Value::Annotation(annotation) => {
            out.write_u8(b'@').unwrap();
            write_annotation(out, pool, annotation);
        }
        Value::Array(values) => {
            out.write_u8(b'[').unwrap();
            out.write_u16::<BigEndian>(values.len() as u16).unwrap();
            for value in values {
                write_value(out, pool, value);
            }
        }
    }
}

// ==============================================================================
// Archives and Directories
// ==============================================================================

/// Contents of one artifact: classes plus registration resources.
#[derive(Debug, Clone, Default)]
pub struct ArtifactContents {
    pub classes: Vec<ClassBuilder>,
    pub resources: Vec<(String, String)>,
}

impl ArtifactContents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(mut self, class: ClassBuilder) -> Self {
        self.classes.push(class);
        self
    }

    /// Register `implementations` under the contract `interface`.
    pub fn service(mut self, interface: &str, content: &str) -> Self {
        self.resources
            .push((format!("META-INF/services/{}", interface), content.to_string()));
        self
    }

    pub fn write_jar(&self, path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = std::fs::File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();

        for class in &self.classes {
            zip.start_file(class.resource_name(), options).unwrap();
            zip.write_all(&class.to_bytes()).unwrap();
        }
        for (name, content) in &self.resources {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    pub fn write_dir(&self, root: &Path) {
        for class in &self.classes {
            let path = root.join(class.resource_name());
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, class.to_bytes()).unwrap();
        }
        for (name, content) in &self.resources {
            let path = root.join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
    }
}

/// The framework API: contracts, markers and the permission enum.
pub fn nifi_api_contents() -> ArtifactContents {
    ArtifactContents::new()
        .class(ClassBuilder::interface(PROCESSOR))
        .class(ClassBuilder::interface(CONTROLLER_SERVICE))
        .class(ClassBuilder::interface(REPORTING_TASK))
        .class(ClassBuilder::annotation_type(CAPABILITY_DESCRIPTION).element("value", None))
        .class(ClassBuilder::annotation_type(TAGS).element("value", None))
        .class(
            ClassBuilder::annotation_type(RESTRICTED)
                .element("value", Some(s("")))
                .element("restrictions", Some(Value::Array(Vec::new()))),
        )
        .class(
            ClassBuilder::annotation_type(RESTRICTION)
                .element("requiredPermission", None)
                .element("explanation", None),
        )
        .class(ClassBuilder::class(REQUIRED_PERMISSION).extends("java.lang.Enum"))
}

// ==============================================================================
// Repository World
// ==============================================================================

pub const API_VERSION: &str = "1.20.0";

pub fn nar(artifact: &str, version: &str) -> Coordinate {
    Coordinate::new("org.example", artifact, version, "nar")
}

pub fn jar(artifact: &str) -> Coordinate {
    Coordinate::jar("org.example", artifact, "1.0")
}

pub fn nifi_api() -> Coordinate {
    Coordinate::jar("org.apache.nifi", "nifi-api", API_VERSION)
}

pub fn framework_api() -> Coordinate {
    Coordinate::jar("org.apache.nifi", "nifi-framework-api", API_VERSION)
}

pub fn slf4j_api() -> Coordinate {
    Coordinate::jar("org.slf4j", "slf4j-api", "1.7.36")
}

/// A temp-dir repository plus the dependency graphs of its artifacts.
pub struct World {
    pub temp_dir: TempDir,
    pub repository: LocalRepository,
    pub graph: DependencyLockfile,
}

impl World {
    /// A repository holding the framework API, its companion and the
    /// logging contract.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let repository = LocalRepository::new(temp_dir.path().join("repository"));
        let world = Self {
            temp_dir,
            repository,
            graph: DependencyLockfile::new(),
        };

        world.install(&nifi_api(), &nifi_api_contents());
        world.install(&framework_api(), &ArtifactContents::new());
        world.install(&slf4j_api(), &ArtifactContents::new());
        world
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `contents` as the jar for `coordinate` in the repository.
    pub fn install(&self, coordinate: &Coordinate, contents: &ArtifactContents) -> PathBuf {
        let path = self.repository.path_of(coordinate);
        contents.write_jar(&path);
        path
    }

    /// Record the dependency closure of `coordinate`. Entries carry no file
    /// and are resolved through the repository.
    pub fn depends(&mut self, coordinate: &Coordinate, dependencies: &[Coordinate]) {
        let set: DependencySet = dependencies
            .iter()
            .map(|c| nar_extension::ResolvedArtifact::new(c.clone(), None))
            .collect();
        self.graph.insert(coordinate.clone(), set);
    }
}
