//! File-backed implementations of the dependency collaborators.
//!
//! - [`LocalRepository`] maps coordinates onto a Maven-layout directory.
//! - [`DependencyLockfile`] serves pre-resolved dependency graphs from a
//!   `deps.toml` file.
//!
//! ## Lockfile format
//!
//! ```toml
//! [[artifact]]
//! coordinate = "org.example:example-nar:nar:1.0.0"
//!
//! [[artifact.dependencies]]
//! coordinate = "org.example:example-processors:1.0.0"
//! file = "example-processors/target/classes"
//!
//! [[artifact.dependencies]]
//! coordinate = "org.apache.nifi:nifi-standard-services-api-nar:nar:1.0.0"
//! ```
//!
//! Relative `file` paths are resolved against the lockfile's directory.

use crate::artifact::Coordinate;
use crate::error::{ExtensionError, ExtensionResult};
use crate::provider::{ArtifactResolver, DependencyGraphProvider, DependencySet};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A Maven-layout repository on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path at which `coordinate` is stored, whether or not it exists.
    pub fn path_of(&self, coordinate: &Coordinate) -> PathBuf {
        let mut path = self.root.clone();
        for segment in coordinate.group().split('.') {
            path.push(segment);
        }
        path.push(coordinate.artifact());
        path.push(coordinate.version());

        let mut file_name = format!("{}-{}", coordinate.artifact(), coordinate.version());
        if let Some(classifier) = coordinate.classifier() {
            file_name.push('-');
            file_name.push_str(classifier);
        }
        file_name.push('.');
        file_name.push_str(&coordinate.kind().to_ascii_lowercase());

        path.push(file_name);
        path
    }
}

impl ArtifactResolver for LocalRepository {
    fn resolve(&self, coordinate: &Coordinate) -> ExtensionResult<PathBuf> {
        let path = self.path_of(coordinate);
        if path.exists() {
            debug!("Resolved {} to {:?}", coordinate, path);
            Ok(path)
        } else {
            debug!("{} is not present at {:?}", coordinate, path);
            Err(ExtensionError::UnresolvableArtifact(coordinate.clone()))
        }
    }
}

/// Raw lockfile document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LockfileDocument {
    #[serde(default)]
    artifact: Vec<LockedArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockedArtifact {
    coordinate: String,

    #[serde(default)]
    dependencies: Vec<LockedDependency>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockedDependency {
    coordinate: String,

    #[serde(default)]
    file: Option<PathBuf>,
}

/// Pre-resolved dependency graphs keyed by artifact.
#[derive(Debug, Clone, Default)]
pub struct DependencyLockfile {
    graphs: HashMap<Coordinate, DependencySet>,
}

impl DependencyLockfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a lockfile from disk.
    pub fn from_file(path: &Path) -> ExtensionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base)
    }

    /// Parse a lockfile, resolving relative files against `base`.
    pub fn parse(content: &str, base: &Path) -> ExtensionResult<Self> {
        let document: LockfileDocument = toml::from_str(content)?;
        let mut lockfile = Self::new();

        for locked in document.artifact {
            let coordinate: Coordinate = locked.coordinate.parse()?;
            if lockfile.graphs.contains_key(&coordinate) {
                return Err(ExtensionError::InvalidLockfile(format!(
                    "artifact {} is listed more than once",
                    coordinate
                )));
            }

            let mut dependencies = DependencySet::new();
            for dependency in locked.dependencies {
                let file = dependency.file.map(|f| {
                    if f.is_absolute() {
                        f
                    } else {
                        base.join(f)
                    }
                });
                dependencies.insert(dependency.coordinate.parse()?, file);
            }

            lockfile.graphs.insert(coordinate, dependencies);
        }

        Ok(lockfile)
    }

    /// Record the dependency set of `coordinate`, replacing any earlier one.
    pub fn insert(&mut self, coordinate: Coordinate, dependencies: DependencySet) {
        self.graphs.insert(coordinate, dependencies);
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}

impl DependencyGraphProvider for DependencyLockfile {
    fn dependencies(&self, coordinate: &Coordinate) -> ExtensionResult<DependencySet> {
        self.graphs
            .get(coordinate)
            .cloned()
            .ok_or_else(|| ExtensionError::DependencyGraphBuildFailed {
                coordinate: coordinate.clone(),
                reason: "artifact is not listed in the lockfile".to_string(),
            })
    }
}
