//! Isolated loading contexts.
//!
//! A [`LoadingContext`] exposes the class path entries of a set of artifacts
//! and optionally delegates to a single parent, forming a strict chain from a
//! module's leaf context up to the shared foundation. Lookups are
//! parent-first: a class is defined by the outermost context that contains
//! it, so a type reachable from several levels is loaded exactly once and
//! keeps a single identity across module boundaries.
//!
//! Contexts are immutable once built and can be shared across threads.

use crate::artifact::Coordinate;
use crate::classfile::{class_resource_name, ClassFile};
use crate::classpath::ClassPathEntry;
use crate::error::{ExtensionError, ExtensionResult};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Opaque identity of one loading context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Uuid);

impl ContextId {
    fn generate() -> Self {
        ContextId(Uuid::new_v4())
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A class loaded through a context: its metadata plus the identity of the
/// context that defined it.
#[derive(Debug, Clone)]
pub struct LoadedClass {
    pub class: Arc<ClassFile>,
    pub defined_by: ContextId,
}

impl LoadedClass {
    pub fn name(&self) -> &str {
        &self.class.name
    }

    /// Two loaded classes are the same type only when both the name and the
    /// defining context match.
    pub fn is_same_type(&self, other: &LoadedClass) -> bool {
        self.defined_by == other.defined_by && self.class.name == other.class.name
    }
}

/// A resource found while enumerating the chain.
#[derive(Debug, Clone)]
pub struct Resource {
    /// The class path entry the resource was read from.
    pub origin: PathBuf,
    pub context: ContextId,
    pub bytes: Vec<u8>,
}

/// One isolation boundary in the module hierarchy.
#[derive(Debug)]
pub struct LoadingContext {
    id: ContextId,
    module: Option<Coordinate>,
    artifacts: BTreeMap<Coordinate, PathBuf>,
    entries: Vec<ClassPathEntry>,
    parent: Option<Arc<LoadingContext>>,
}

impl LoadingContext {
    /// Create a context exposing `artifacts`, chained to `parent` and tagged
    /// with the module it was built for.
    pub fn new(
        artifacts: BTreeMap<Coordinate, PathBuf>,
        parent: Option<Arc<LoadingContext>>,
        module: Option<Coordinate>,
    ) -> Self {
        let entries = artifacts
            .values()
            .map(|path| ClassPathEntry::from_path(path.as_path()))
            .collect();

        Self {
            id: ContextId::generate(),
            module,
            artifacts,
            entries,
            parent,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The module this context was built for; `None` for the shared
    /// foundation.
    pub fn module(&self) -> Option<&Coordinate> {
        self.module.as_ref()
    }

    pub fn parent(&self) -> Option<&Arc<LoadingContext>> {
        self.parent.as_ref()
    }

    /// Artifacts exposed by this level alone.
    pub fn artifacts(&self) -> &BTreeMap<Coordinate, PathBuf> {
        &self.artifacts
    }

    /// This context followed by each ancestor, leaf to root.
    pub fn ancestry(&self) -> impl Iterator<Item = &LoadingContext> {
        std::iter::successors(Some(self), |ctx| ctx.parent.as_deref())
    }

    /// Number of levels in the chain, this one included.
    pub fn depth(&self) -> usize {
        self.ancestry().count()
    }

    /// The root of the chain.
    pub fn foundation(&self) -> &LoadingContext {
        self.ancestry().last().unwrap_or(self)
    }

    /// Check whether `coordinate` is exposed here or by any ancestor.
    pub fn exposes(&self, coordinate: &Coordinate) -> bool {
        self.ancestry().any(|ctx| ctx.artifacts.contains_key(coordinate))
    }

    /// The level in this chain with identity `id`.
    pub fn level(&self, id: ContextId) -> Option<&LoadingContext> {
        self.ancestry().find(|ctx| ctx.id == id)
    }

    fn root_first(&self) -> Vec<&LoadingContext> {
        let mut chain: Vec<&LoadingContext> = self.ancestry().collect();
        chain.reverse();
        chain
    }

    /// Read every resource named `name` visible from this context, root
    /// level first.
    pub fn find_resources(&self, name: &str) -> ExtensionResult<Vec<Resource>> {
        let mut resources = Vec::new();
        for ctx in self.root_first() {
            for entry in &ctx.entries {
                if let Some(bytes) = entry.read(name)? {
                    debug!("Found resource {} in {:?}", name, entry.path());
                    resources.push(Resource {
                        origin: entry.path().to_path_buf(),
                        context: ctx.id,
                        bytes,
                    });
                }
            }
        }
        Ok(resources)
    }

    /// Load the class with binary name `name` without initializing it.
    ///
    /// The outermost level that contains the class file defines it.
    pub fn load_class(&self, name: &str) -> ExtensionResult<LoadedClass> {
        let resource = class_resource_name(name);
        for ctx in self.root_first() {
            for entry in &ctx.entries {
                if let Some(bytes) = entry.read(&resource)? {
                    let class = ClassFile::parse(&bytes, name)?;
                    if class.name != name {
                        return Err(ExtensionError::InvalidClassFile {
                            class: name.to_string(),
                            reason: format!("{:?} declares class {}", entry.path(), class.name),
                        });
                    }
                    return Ok(LoadedClass {
                        class: Arc::new(class),
                        defined_by: ctx.id,
                    });
                }
            }
        }
        Err(ExtensionError::ClassNotFound(name.to_string()))
    }

    /// Load `name` the way the class identified by `requester` would see
    /// it: through the requester's defining level.
    pub fn load_class_from(&self, requester: ContextId, name: &str) -> ExtensionResult<LoadedClass> {
        match self.level(requester) {
            Some(level) => level.load_class(name),
            None => self.load_class(name),
        }
    }

    /// Check whether `candidate` is `target` or has it among its transitive
    /// super-interfaces and super-classes.
    pub fn is_assignable(&self, target: &LoadedClass, candidate: &LoadedClass) -> ExtensionResult<bool> {
        let mut queue = VecDeque::from([candidate.clone()]);
        let mut seen = HashSet::new();

        while let Some(current) = queue.pop_front() {
            if current.is_same_type(target) {
                return Ok(true);
            }
            if !seen.insert((current.defined_by, current.class.name.clone())) {
                continue;
            }

            let supertypes = current
                .class
                .interfaces
                .iter()
                .chain(current.class.super_name.iter());
            for supertype in supertypes {
                match self.load_class_from(current.defined_by, supertype) {
                    Ok(loaded) => queue.push_back(loaded),
                    // Supertypes outside every level (e.g. java.lang.Object)
                    // cannot be the target.
                    Err(ExtensionError::ClassNotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(false)
    }

    /// Render the chain from the root down, one level per line group.
    pub fn to_tree(&self) -> String {
        let mut out = String::new();
        for (depth, ctx) in self.root_first().into_iter().enumerate() {
            let indent = "  ".repeat(depth);
            let label = ctx
                .module
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "<foundation>".to_string());
            out.push_str(&format!("{}{} [{}]\n", indent, label, ctx.id));
            for (coordinate, path) in &ctx.artifacts {
                out.push_str(&format!("{}  - {} ({})\n", indent, coordinate, path.display()));
            }
        }
        out
    }
}
